//! Judge - pluggable window scoring
//!
//! A judge compares a corpus window with a pattern window of the same
//! length. The first `lookback` elements are context that was already
//! committed; the rest are the candidates being scored.
//!
//! `best_possible_score` is an upper bound the matcher prunes against. A
//! judge that returns more than its own bound is broken.

use mosaic_core::{DataKind, DataPoint};
use std::f64::consts::PI;

/// Scoring strategy
pub trait Judge {
    /// Higher is better
    fn judge(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64;

    /// Upper bound on `judge` for a window of this shape
    fn best_possible_score(&self, length: usize, lookback: usize) -> f64;

    /// Diagnostic: total deviation over the candidate part
    fn matching_cost(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64;

    /// Diagnostic: how well the window continues the committed context
    fn relation_score(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64;

    /// Shortest window length that could still reach `score`
    fn min_length_for_score(&self, score: f64) -> usize;
}

impl<J: Judge + ?Sized> Judge for &J {
    fn judge(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        (**self).judge(corpus, pattern, lookback, scale)
    }

    fn best_possible_score(&self, length: usize, lookback: usize) -> f64 {
        (**self).best_possible_score(length, lookback)
    }

    fn matching_cost(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        (**self).matching_cost(corpus, pattern, lookback, scale)
    }

    fn relation_score(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        (**self).relation_score(corpus, pattern, lookback, scale)
    }

    fn min_length_for_score(&self, score: f64) -> usize {
        (**self).min_length_for_score(score)
    }
}

/// Score of a perfectly matching candidate element
pub const ELEMENT_SCORE: f64 = 10.0;

/// Context elements count half
pub const LOOKBACK_WEIGHT: f64 = 0.5;

const GAP_WEIGHT: f64 = 6.0;
const SPACING_WEIGHT: f64 = 0.08;
const ANGLE_WEIGHT: f64 = 4.0;
const NEW_COMBO_WEIGHT: f64 = 1.0;

/// Spacing at which a turn angle counts fully
const ANGLE_SUPPORT: f64 = 50.0;

const MAX_PENALTY: f64 = 4.0 * ELEMENT_SCORE;

/// Reference judge: per-element shape similarity
///
/// Each element scores `ELEMENT_SCORE - penalty` with penalty >= 0 built from
/// kind, rhythm ratio, scaled spacing, turn angle and combo breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeJudge;

impl ShapeJudge {
    pub fn new() -> Self {
        Self
    }

    /// Deviation of one corpus element from one pattern element
    pub fn penalty(corpus: &DataPoint, pattern: &DataPoint, scale: f64) -> f64 {
        let mut penalty = 0.0;

        if corpus.kind != pattern.kind {
            penalty += ELEMENT_SCORE;
        }

        penalty += GAP_WEIGHT * (corpus.beats_since / pattern.beats_since).log2().abs();

        let scaled = corpus.spacing * scale;
        penalty += SPACING_WEIGHT * (scaled - pattern.spacing).abs();

        let support = (scaled.min(pattern.spacing) / ANGLE_SUPPORT).clamp(0.0, 1.0);
        penalty += ANGLE_WEIGHT * wrap_angle(corpus.angle - pattern.angle).abs() / PI * support;

        if corpus.kind == DataKind::Hit && pattern.kind == DataKind::Hit && corpus.new_combo != pattern.new_combo {
            penalty += NEW_COMBO_WEIGHT;
        }

        if penalty.is_nan() {
            MAX_PENALTY
        } else {
            penalty.min(MAX_PENALTY)
        }
    }

    fn weighted(corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64, range: std::ops::Range<usize>) -> f64 {
        corpus
            .iter()
            .zip(pattern)
            .enumerate()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .map(|(k, (c, p))| {
                let weight = if k < lookback { LOOKBACK_WEIGHT } else { 1.0 };
                weight * (ELEMENT_SCORE - Self::penalty(c, p, scale))
            })
            .sum()
    }
}

impl Judge for ShapeJudge {
    fn judge(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        let len = corpus.len().min(pattern.len());
        Self::weighted(corpus, pattern, lookback, scale, 0..len)
    }

    fn best_possible_score(&self, length: usize, lookback: usize) -> f64 {
        let lookback = lookback.min(length);
        ELEMENT_SCORE * ((length - lookback) as f64 + LOOKBACK_WEIGHT * lookback as f64)
    }

    fn matching_cost(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        corpus
            .iter()
            .zip(pattern)
            .skip(lookback)
            .map(|(c, p)| Self::penalty(c, p, scale))
            .sum()
    }

    fn relation_score(&self, corpus: &[DataPoint], pattern: &[DataPoint], lookback: usize, scale: f64) -> f64 {
        let len = corpus.len().min(pattern.len());
        Self::weighted(corpus, pattern, lookback, scale, 0..lookback.min(len))
    }

    fn min_length_for_score(&self, score: f64) -> usize {
        if score > 0.0 {
            (score / ELEMENT_SCORE).ceil() as usize
        } else {
            0
        }
    }
}

/// Wrap into (-PI, PI]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}
