//! Mosaic Match - greedy approximate sequence matching
//!
//! Walks a query pattern left to right and, for every position, picks the
//! corpus element whose surrounding window best resembles the pattern there.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       find_similar                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  position i                                                  │
//! │    ├─ continuation: previous match + 1, shrunk window, bonus │
//! │    └─ windowed search: longest window first, shrinking       │
//! │         ├─ suffix trie query (exact or tolerance ladder)     │
//! │         ├─ run replay through the validity predicate         │
//! │         └─ Judge score, stop once >= half the upper bound    │
//! │  commit best → pattern[i] (later windows see the choice)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `candidates` and `BestScoreOrderFilter` form the second pipeline: a lazy
//! stream of whole windows, re-ordered so high scores surface first.

pub mod candidates;
pub mod filter;
pub mod judge;
pub mod matcher;

pub use candidates::{Candidates, Match, MinLengthHint};
pub use filter::{score_match, BestScoreOrderFilter, Ordered, ScoredMatches};
pub use judge::{Judge, ShapeJudge};
pub use matcher::{MatchStats, MatchStream, Matcher, SearchContext};
