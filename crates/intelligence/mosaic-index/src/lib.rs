//! # Mosaic Index
//!
//! Every corpus entry is quantized into symbols and every suffix of every
//! entry becomes a path in one shared trie.
//!
//! ```text
//!   entry 0: a b c        root
//!   entry 1: b c d         ├─ a ─ b ─ c          (0,0)
//!                          ├─ b ─ c ─┬─ d        (1,0)
//!                          │         └─          (0,1)
//!                          ├─ c ─┬─ d            (1,1)
//!                          │     └─              (0,2)
//!                          └─ d                  (1,2)
//! ```
//!
//! Queries walk the trie (exactly, or through a per-position symbol range)
//! and lazily enumerate the `(entry, offset)` occurrences below the match.
//! Callers only ever see [`CorpusLocator`]s, never trie nodes.

pub mod corpus;
pub mod locator;
pub mod trie;

pub use corpus::{Corpus, CorpusStats};
pub use locator::{CorpusLocator, EntryId};
pub use trie::{Occurrences, SuffixTrie};

/// Result type for mosaic-index operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-index
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Saved index was built from a different corpus (expected {expected}, found {found})")]
    CorpusMismatch { expected: String, found: String },

    #[error("Saved index was built with different encoder settings")]
    EncoderMismatch,

    #[error("Saved index depth is {found}, expected {expected}")]
    DepthMismatch { expected: usize, found: usize },

    #[error("Unsupported index version: {0}")]
    UnsupportedVersion(u32),
}
