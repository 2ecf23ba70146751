//! # Mosaic Construct
//!
//! Turns chosen data points back into concrete objects. Each element
//! advances a running state - time, heading, position - and either places
//! a new object or finishes the one placed before it.
//!
//! ```text
//!   Continuation { pos, angle, time }
//!        │
//!        │  time  += walk_beats(original.beats_since)
//!        │  angle += point.angle
//!        │  pos   += spacing × multiplier × (cos angle, sin angle)
//!        │  pos    = clamp(pos, 0, bounds)
//!        ▼
//!   Hit / Spin ──► new circle / spinner at pos
//!   Release    ──► spinner end time, or the last object becomes a slider
//!                  whose tail is rotated and scaled onto pos
//! ```
//!
//! The continuation returned by one call seeds the next, so successive
//! matches join into one seamless object list.

pub mod constructor;
pub mod object;
pub mod path;
pub mod pipeline;
pub mod predicate;
pub mod timing;

pub use constructor::{Constructor, Continuation, PLAYFIELD_CENTRE};
pub use object::{HitObject, Hitsounds, ObjectKind, SliderShape};
pub use pipeline::{assemble_stream, assemble_windows, WindowStats};
pub use predicate::PlayfieldPredicate;
pub use timing::{Timing, UniformTiming, VelocityChange};

/// Result type for mosaic-construct operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-construct
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot decode object token {token:?}: {reason}")]
    Decode { token: String, reason: String },
}

impl Error {
    pub(crate) fn decode(token: &str, reason: impl Into<String>) -> Self {
        Error::Decode {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}
