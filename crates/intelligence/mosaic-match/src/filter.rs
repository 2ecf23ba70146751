//! Best-Score Order Filter - bounded look-ahead re-ordering
//!
//! Holds up to `buffer_size` scored items in a heap. Once the buffer is full,
//! every new arrival first releases the best buffered item. The output is a
//! permutation of the input; with a buffer of one it is the input order.

use crate::candidates::{Match, MinLengthHint};
use crate::Judge;
use mosaic_core::DataPoint;
use mosaic_index::Corpus;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Re-orders a lazy stream so higher scores tend to come first
pub struct BestScoreOrderFilter<'a, J> {
    judge: &'a J,
    buffer_size: usize,
    min_length: Option<&'a MinLengthHint>,
}

impl<'a, J: Judge> BestScoreOrderFilter<'a, J> {
    pub fn new(judge: &'a J, buffer_size: usize) -> Self {
        Self {
            judge,
            buffer_size: buffer_size.max(1),
            min_length: None,
        }
    }

    /// Raise `hint` whenever a new best score is seen
    pub fn with_min_length(mut self, hint: &'a MinLengthHint) -> Self {
        self.min_length = Some(hint);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Re-order items that already carry a score
    pub fn order<T, I>(&self, scored: I) -> Ordered<'_, J, T, I::IntoIter>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        Ordered {
            judge: self.judge,
            min_length: self.min_length,
            buffer_size: self.buffer_size,
            input: scored.into_iter(),
            exhausted: false,
            heap: BinaryHeap::with_capacity(self.buffer_size),
            arrivals: 0,
            best: f64::NEG_INFINITY,
        }
    }

    /// Score each match against `pattern[pattern_index..]` at its own scale, then re-order
    pub fn filter_matches<'s, I>(
        &'s self,
        corpus: &'s Corpus,
        pattern: &'s [DataPoint],
        pattern_index: usize,
        matches: I,
    ) -> Ordered<'s, J, Match, ScoredMatches<'s, J, I::IntoIter>>
    where
        I: IntoIterator<Item = Match>,
    {
        self.order(ScoredMatches {
            judge: self.judge,
            corpus,
            pattern,
            pattern_index,
            matches: matches.into_iter(),
        })
    }
}

/// Matches paired with their judge score
pub struct ScoredMatches<'s, J, I> {
    judge: &'s J,
    corpus: &'s Corpus,
    pattern: &'s [DataPoint],
    pattern_index: usize,
    matches: I,
}

impl<J, I> Iterator for ScoredMatches<'_, J, I>
where
    J: Judge,
    I: Iterator<Item = Match>,
{
    type Item = (Match, f64);

    fn next(&mut self) -> Option<(Match, f64)> {
        let m = self.matches.next()?;
        let score = score_match(self.judge, self.corpus, self.pattern, self.pattern_index, &m);
        Some((m, score))
    }
}

/// Judge a match with no lookback, or negative infinity when a window is missing
pub fn score_match<J: Judge>(
    judge: &J,
    corpus: &Corpus,
    pattern: &[DataPoint],
    pattern_index: usize,
    m: &Match,
) -> f64 {
    let windows = corpus
        .window(m.locator, 0, m.length)
        .zip(pattern.get(pattern_index..pattern_index + m.length));
    match windows {
        Some((c, p)) => judge.judge(c, p, 0, m.multiplier()),
        None => f64::NEG_INFINITY,
    }
}

struct Buffered<T> {
    score: f64,
    arrival: u64,
    item: T,
}

impl<T> PartialEq for Buffered<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Buffered<T> {}

impl<T> PartialOrd for Buffered<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Buffered<T> {
    // Max-heap: highest score first, earliest arrival among equal scores
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.arrival.cmp(&self.arrival))
    }
}

/// Lazy output of `BestScoreOrderFilter::order`
pub struct Ordered<'a, J, T, I> {
    judge: &'a J,
    min_length: Option<&'a MinLengthHint>,
    buffer_size: usize,
    input: I,
    exhausted: bool,
    heap: BinaryHeap<Buffered<T>>,
    arrivals: u64,
    best: f64,
}

impl<J: Judge, T, I> Ordered<'_, J, T, I> {
    /// Best score seen so far
    pub fn best_score(&self) -> f64 {
        self.best
    }

    fn observe(&mut self, score: f64) {
        if score > self.best {
            self.best = score;
            if let Some(hint) = self.min_length {
                hint.raise(self.judge.min_length_for_score(score));
            }
        }
    }
}

impl<J, T, I> Iterator for Ordered<'_, J, T, I>
where
    J: Judge,
    I: Iterator<Item = (T, f64)>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while !self.exhausted {
            let Some((item, score)) = self.input.next() else {
                self.exhausted = true;
                break;
            };
            self.observe(score);

            let released = if self.heap.len() >= self.buffer_size {
                self.heap.pop()
            } else {
                None
            };
            self.heap.push(Buffered {
                score,
                arrival: self.arrivals,
                item,
            });
            self.arrivals += 1;

            if let Some(buffered) = released {
                return Some(buffered.item);
            }
        }
        self.heap.pop().map(|buffered| buffered.item)
    }
}
