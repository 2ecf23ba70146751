//! Candidates - lazy whole-window matches for one pattern position
//!
//! Windows are produced longest first. A shared `MinLengthHint` lets a
//! downstream consumer (usually the score-ordering filter) cut off window
//! lengths that can no longer beat what it has already seen.

use crate::matcher::Matcher;
use crate::Judge;
use mosaic_core::{DataPoint, Symbol};
use mosaic_index::{CorpusLocator, Occurrences};
use std::cell::Cell;
use std::iter::Peekable;

/// Spacings below this carry no scale information
const MIN_SCALE_SPACING: f64 = 1e-6;

/// A corpus window chosen for a pattern window of the same length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// First corpus element of the window
    pub locator: CorpusLocator,
    pub length: usize,

    /// Spacing multipliers the window supports; `[0, inf]` when unbounded
    pub min_mult: f64,
    pub max_mult: f64,
}

impl Match {
    pub fn new(locator: CorpusLocator, length: usize) -> Self {
        Self {
            locator,
            length,
            min_mult: 0.0,
            max_mult: f64::INFINITY,
        }
    }

    pub fn with_scale_bounds(mut self, min_mult: f64, max_mult: f64) -> Self {
        self.min_mult = min_mult;
        self.max_mult = max_mult;
        self
    }

    pub fn is_scale_bounded(&self) -> bool {
        self.min_mult > 0.0 && self.max_mult.is_finite()
    }

    /// Geometric mean of the bounds, 1 when either bound is open
    pub fn multiplier(&self) -> f64 {
        if self.is_scale_bounded() {
            (self.min_mult * self.max_mult).sqrt()
        } else {
            1.0
        }
    }
}

/// Lower bound on useful window lengths, raised by consumers
#[derive(Debug, Default)]
pub struct MinLengthHint(Cell<usize>);

impl MinLengthHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// Never lowers the bound
    pub fn raise(&self, length: usize) {
        if length > self.0.get() {
            self.0.set(length);
        }
    }
}

/// Range of pattern/corpus spacing ratios over a window pair
fn scale_bounds(corpus: &[DataPoint], pattern: &[DataPoint]) -> Option<(f64, f64)> {
    corpus
        .iter()
        .zip(pattern)
        .filter(|(c, p)| c.spacing > MIN_SCALE_SPACING && p.spacing > MIN_SCALE_SPACING)
        .map(|(c, p)| p.spacing / c.spacing)
        .fold(None, |bounds, ratio| match bounds {
            None => Some((ratio, ratio)),
            Some((lo, hi)) => Some((f64::min(lo, ratio), f64::max(hi, ratio))),
        })
}

/// Lazy output of `Matcher::candidates`
pub struct Candidates<'m, 'c, J> {
    matcher: &'m Matcher<'c, J>,

    /// Pattern from the requested index on
    pattern: &'m [DataPoint],
    hint: &'m MinLengthHint,
    is_valid: &'m dyn Fn(&DataPoint) -> bool,
    symbols: Vec<Symbol>,

    next_length: usize,
    current_length: usize,
    current: Option<Peekable<Occurrences<'c>>>,
    examined: usize,
}

impl<'m, 'c, J: Judge> Candidates<'m, 'c, J> {
    pub(crate) fn new(
        matcher: &'m Matcher<'c, J>,
        pattern: &'m [DataPoint],
        index: usize,
        hint: &'m MinLengthHint,
        is_valid: &'m dyn Fn(&DataPoint) -> bool,
    ) -> Self {
        let pattern = pattern.get(index..).unwrap_or(&[]);
        let longest = matcher.config().first_search_length.min(pattern.len());
        let symbols = matcher.corpus().encoder().encode_all(&pattern[..longest]);

        Self {
            matcher,
            pattern,
            hint,
            is_valid,
            symbols,
            next_length: longest,
            current_length: 0,
            current: None,
            examined: 0,
        }
    }

    fn to_match(&self, locator: CorpusLocator, length: usize) -> Option<Match> {
        if !self.matcher.run_is_valid(locator, length, self.is_valid) {
            return None;
        }
        let window = self.matcher.corpus().window(locator, 0, length)?;
        let found = Match::new(locator, length);
        Some(match scale_bounds(window, &self.pattern[..length]) {
            Some((lo, hi)) => found.with_scale_bounds(lo, hi),
            None => found,
        })
    }
}

impl<J: Judge> Iterator for Candidates<'_, '_, J> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        loop {
            if self.examined >= self.matcher.config().max_search {
                return None;
            }

            if self.current_length < self.hint.get() {
                self.current = None;
            }
            if let Some(locator) = self.current.as_mut().and_then(Iterator::next) {
                self.examined += 1;
                match self.to_match(locator, self.current_length) {
                    Some(found) => return Some(found),
                    None => continue,
                }
            }

            if self.next_length == 0 || self.next_length < self.hint.get() {
                return None;
            }
            self.current_length = self.next_length;
            self.current = Some(self.matcher.occurrences(&self.symbols[..self.current_length]));
            self.next_length -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShapeJudge;
    use mosaic_core::EncoderSettings;
    use mosaic_index::Corpus;

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new(EncoderSettings::default(), 32);
        corpus.add_entry(vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 100.0, 0.0),
            DataPoint::hit(1.0, 50.0, 1.0),
            DataPoint::hit(2.0, 100.0, 0.0),
        ]);
        corpus.add_entry(vec![DataPoint::hit(1.0, 200.0, 0.0), DataPoint::hit(1.0, 200.0, 0.0)]);
        corpus
    }

    fn pattern() -> Vec<DataPoint> {
        vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 200.0, 0.0),
            DataPoint::hit(1.0, 100.0, 1.0),
        ]
    }

    #[test]
    fn test_longest_windows_first() {
        let corpus = corpus();
        let matcher = Matcher::new(&corpus, ShapeJudge::new());
        let hint = MinLengthHint::new();
        let pattern = pattern();
        let accept = |_: &DataPoint| true;

        let found: Vec<_> = matcher.candidates(&pattern, 0, &hint, &accept).collect();
        assert!(!found.is_empty());
        assert_eq!(found[0], Match::new(CorpusLocator::new(0, 0), 3).with_scale_bounds(2.0, 2.0));
        assert!(found.windows(2).all(|w| w[0].length >= w[1].length));
        assert!(found.iter().all(|m| m.length >= 1));
    }

    #[test]
    fn test_hint_cuts_short_windows() {
        let corpus = corpus();
        let matcher = Matcher::new(&corpus, ShapeJudge::new());
        let hint = MinLengthHint::new();
        let pattern = pattern();
        let accept = |_: &DataPoint| true;

        let mut candidates = matcher.candidates(&pattern, 0, &hint, &accept);
        assert_eq!(candidates.next().map(|m| m.length), Some(3));
        hint.raise(3);
        hint.raise(1);
        assert_eq!(hint.get(), 3);
        assert!(candidates.all(|m| m.length >= 3));
    }

    #[test]
    fn test_index_past_end_is_empty() {
        let corpus = corpus();
        let matcher = Matcher::new(&corpus, ShapeJudge::new());
        let hint = MinLengthHint::new();
        let pattern = pattern();
        let accept = |_: &DataPoint| true;

        assert_eq!(matcher.candidates(&pattern, 3, &hint, &accept).count(), 0);
        assert_eq!(matcher.candidates(&pattern, 9, &hint, &accept).count(), 0);
    }

    #[test]
    fn test_multiplier() {
        let loc = CorpusLocator::new(0, 0);
        assert_eq!(Match::new(loc, 2).multiplier(), 1.0);
        assert_eq!(Match::new(loc, 2).with_scale_bounds(0.0, 3.0).multiplier(), 1.0);
        assert!((Match::new(loc, 2).with_scale_bounds(1.0, 4.0).multiplier() - 2.0).abs() < 1e-12);
    }
}
