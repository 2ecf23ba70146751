//! # Mosaic Core
//!
//! The shared vocabulary of the mosaic matcher: what a sequence element
//! looks like, how it is quantized for indexing, and how it is written to
//! and read from the line-oriented corpus format.
//!
//! ```text
//! ┌──────────────┐   encode    ┌──────────┐
//! │  DataPoint   │ ──────────► │  Symbol  │  high byte: category × gap
//! │ kind, beats, │             │  (u16)   │  low byte:  spacing bucket
//! │ spacing, ... │             └──────────┘
//! └──────┬───────┘
//!        │ to_line / from_line
//!        ▼
//!   "0 1.0000 100 1.5708 1   "
//! ```
//!
//! Everything here is pure data. Indexing lives in `mosaic-index`,
//! searching in `mosaic-match`, replay in `mosaic-construct`.

pub mod encoder;
pub mod line;
pub mod point;

pub use encoder::{EncoderSettings, Symbol, TokenEncoder, CATEGORY_COUNT};
pub use line::{parse_entries, write_entries};
pub use point::{CurveType, DataKind, DataPoint};

/// Result type for mosaic-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Data point invariant violated: {0}")]
    InvalidDataPoint(String),

    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
}
