//! Pattern to objects, end to end
//!
//! Two drivers share the same constructor:
//!
//! ```text
//! assemble_stream   find_similar ──► one point at a time ──► construct
//! assemble_windows  candidates ──► filter_matches ──► best window ──► construct_match
//! ```
//!
//! Both keep a `PlayfieldPredicate` anchored at the end of the output so
//! candidates that would leave the playfield are skipped.

use crate::constructor::{Constructor, Continuation};
use crate::object::HitObject;
use crate::predicate::PlayfieldPredicate;
use crate::timing::VelocityChange;
use mosaic_core::DataPoint;
use mosaic_match::{BestScoreOrderFilter, Judge, MatchStats, Matcher, MinLengthHint};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Counters for `assemble_windows`
#[derive(Debug, Clone, Default)]
pub struct WindowStats {
    /// Windows placed, fallbacks included
    pub windows: usize,

    /// Pattern elements covered by corpus windows
    pub matched: usize,

    /// Pattern elements copied through unmodified
    pub fallbacks: usize,
}

impl fmt::Display for WindowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Windows: {} | Matched: {} | Fallbacks: {}",
            self.windows, self.matched, self.fallbacks
        )
    }
}

/// Stream the pattern through the matcher and construct every output point.
///
/// Velocity changes for finished sliders are appended to `velocities`.
pub fn assemble_stream<J: Judge>(
    matcher: &Matcher<'_, J>,
    pattern: &[DataPoint],
    constructor: &Constructor,
    objects: &mut Vec<HitObject>,
    velocities: &mut Vec<VelocityChange>,
) -> MatchStats {
    let anchor = Rc::new(Cell::new(Continuation::from_objects(objects)));
    let predicate = PlayfieldPredicate::new(Rc::clone(&anchor), constructor.bounds());

    let mut stream = matcher.find_similar(pattern, |point: &DataPoint| predicate.check(point));
    for (index, point) in stream.by_ref().enumerate() {
        let continuation = constructor.construct_recording(
            objects,
            std::slice::from_ref(&point),
            1.0,
            &pattern[index..=index],
            Some(anchor.get()),
            velocities,
        );
        anchor.set(continuation);
    }

    stream.stats().clone()
}

/// Place the best-scoring whole window at each position, then skip past it
pub fn assemble_windows<J: Judge>(
    matcher: &Matcher<'_, J>,
    pattern: &[DataPoint],
    constructor: &Constructor,
    buffer_size: usize,
    objects: &mut Vec<HitObject>,
    velocities: &mut Vec<VelocityChange>,
) -> WindowStats {
    let corpus = matcher.corpus();
    let anchor = Rc::new(Cell::new(Continuation::from_objects(objects)));
    let predicate = PlayfieldPredicate::new(Rc::clone(&anchor), constructor.bounds());
    let is_valid = |point: &DataPoint| predicate.check(point);

    let mut stats = WindowStats::default();
    let mut index = 0;
    while index < pattern.len() {
        let hint = MinLengthHint::new();
        let filter = BestScoreOrderFilter::new(matcher.judge(), buffer_size).with_min_length(&hint);
        let candidates = matcher.candidates(pattern, index, &hint, &is_valid);
        let best = filter
            .filter_matches(corpus, pattern, index, candidates)
            .next();

        let placed = best.and_then(|found| {
            let input = pattern.get(index..index + found.length)?;
            constructor
                .construct_match(objects, corpus, &found, input, Some(anchor.get()), Some(&mut *velocities))
                .map(|continuation| (continuation, found.length))
        });

        let (continuation, consumed) = match placed {
            Some(placed) => {
                stats.matched += placed.1;
                placed
            }
            None => {
                tracing::debug!("No window at {}, copying the input element", index);
                stats.fallbacks += 1;
                let element = &pattern[index..=index];
                let continuation =
                    constructor.construct_recording(objects, element, 1.0, element, Some(anchor.get()), velocities);
                (continuation, 1)
            }
        };

        anchor.set(continuation);
        stats.windows += 1;
        index += consumed.max(1);
    }

    tracing::info!("Assembled {} elements: {}", pattern.len(), stats);
    stats
}
