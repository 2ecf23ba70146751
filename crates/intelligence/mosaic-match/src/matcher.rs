//! Matcher - continuation search plus windowed search per position
//!
//! The matcher itself is immutable; everything that changes while a pattern
//! is processed lives in the `SearchContext` owned by its `MatchStream`.
//! Independent streams over the same matcher never interfere.

use crate::candidates::{Candidates, MinLengthHint};
use crate::Judge;
use glam::DVec2;
use mosaic_config::MatcherConfig;
use mosaic_core::{DataPoint, Symbol};
use mosaic_index::{Corpus, CorpusLocator, Occurrences};
use std::fmt;
use std::iter::Peekable;

/// Greedy approximate matcher over one corpus
pub struct Matcher<'c, J> {
    corpus: &'c Corpus,
    judge: J,
    config: MatcherConfig,
}

impl<'c, J: Judge> Matcher<'c, J> {
    pub fn new(corpus: &'c Corpus, judge: J) -> Self {
        Self::with_config(corpus, judge, MatcherConfig::default())
    }

    pub fn with_config(corpus: &'c Corpus, judge: J, config: MatcherConfig) -> Self {
        Self {
            corpus,
            judge,
            config,
        }
    }

    pub fn corpus(&self) -> &'c Corpus {
        self.corpus
    }

    pub fn judge(&self) -> &J {
        &self.judge
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Lazily produce one output element per pattern element.
    ///
    /// `is_valid` sees each candidate run replayed as cumulative values from
    /// the origin: `beats_since` is the running beat total, `spacing` and
    /// `angle` are the polar coordinates of the running position.
    pub fn find_similar<F>(&self, pattern: &[DataPoint], is_valid: F) -> MatchStream<'_, 'c, J, F>
    where
        F: Fn(&DataPoint) -> bool,
    {
        let symbols = self.corpus.encoder().encode_all(pattern);
        MatchStream {
            matcher: self,
            is_valid,
            ctx: SearchContext::new(symbols, pattern.to_vec()),
            finished: false,
        }
    }

    /// Lazily produce whole-window matches starting at `pattern[index]`, longest first
    pub fn candidates<'m>(
        &'m self,
        pattern: &'m [DataPoint],
        index: usize,
        hint: &'m MinLengthHint,
        is_valid: &'m dyn Fn(&DataPoint) -> bool,
    ) -> Candidates<'m, 'c, J> {
        Candidates::new(self, pattern, index, hint, is_valid)
    }

    /// Exact query, or the tolerance ladder when the encoding carries distance
    pub(crate) fn occurrences(&self, query: &[Symbol]) -> Peekable<Occurrences<'c>> {
        let corpus = self.corpus;
        let encoder = corpus.encoder();
        if !encoder.is_distance_aware() || self.config.tolerance_schedule.is_empty() {
            return corpus.query_exact(query).peekable();
        }

        let mut last = None;
        for &width in &self.config.tolerance_schedule {
            let (lo, hi) = encoder.range_window(query, width);
            let mut found = corpus.query_range(&lo, &hi).peekable();
            if found.peek().is_some() {
                return found;
            }
            last = Some(found);
        }
        last.unwrap_or_else(|| corpus.query_exact(query).peekable())
    }

    /// Replay `count` corpus points from `start` and check each against the predicate
    pub(crate) fn run_is_valid<F>(&self, start: CorpusLocator, count: usize, is_valid: &F) -> bool
    where
        F: Fn(&DataPoint) -> bool + ?Sized,
    {
        match self.corpus.window(start, 0, count) {
            Some(run) => replay(run).all(|point| is_valid(&point)),
            None => false,
        }
    }
}

/// Cumulative view of a run starting at the origin facing +x
pub(crate) fn replay(run: &[DataPoint]) -> impl Iterator<Item = DataPoint> + '_ {
    run.iter()
        .scan((DVec2::ZERO, 0.0_f64, 0.0_f64), |(pos, heading, beats), point| {
            *heading += point.angle;
            *pos += DVec2::from_angle(*heading) * point.spacing;
            *beats += point.beats_since;
            Some(DataPoint {
                beats_since: *beats,
                spacing: pos.length(),
                angle: pos.y.atan2(pos.x),
                ..point.clone()
            })
        })
}

/// Committed context for a window of `length` at position `i` of `total`
pub(crate) fn lookback(i: usize, length: usize, total: usize, max_lookback: usize) -> usize {
    let wanted = (length / 2).min(max_lookback);
    let required = (i + length).saturating_sub(total);
    wanted.max(required).min(i)
}

/// Per-stream counters
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
    pub positions: usize,

    /// Positions whose match directly follows the previous one in the corpus
    pub pogs: usize,

    /// Positions where no valid candidate existed
    pub fallbacks: usize,

    /// Occurrences examined across all windowed searches
    pub examined: usize,

    pub score_sum: f64,
    pub cost_sum: f64,
}

impl MatchStats {
    pub fn pog_rate(&self) -> f64 {
        if self.positions == 0 {
            0.0
        } else {
            self.pogs as f64 / self.positions as f64
        }
    }

    pub fn mean_score(&self) -> f64 {
        let matched = self.positions - self.fallbacks;
        if matched == 0 {
            0.0
        } else {
            self.score_sum / matched as f64
        }
    }
}

impl fmt::Display for MatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Positions: {} | Pogs: {} ({:.1}%) | Fallbacks: {} | Examined: {} | Mean score: {:.2}",
            self.positions,
            self.pogs,
            self.pog_rate() * 100.0,
            self.fallbacks,
            self.examined,
            self.mean_score()
        )
    }
}

/// Mutable state of one `find_similar` run
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Quantized input pattern, never updated
    symbols: Vec<Symbol>,

    /// Input pattern with every committed position replaced by its match
    pattern: Vec<DataPoint>,

    position: usize,

    /// Previous match and the window length it was found with
    last: Option<(CorpusLocator, usize)>,

    stats: MatchStats,
}

impl SearchContext {
    fn new(symbols: Vec<Symbol>, pattern: Vec<DataPoint>) -> Self {
        Self {
            symbols,
            pattern,
            position: 0,
            last: None,
            stats: MatchStats::default(),
        }
    }

    /// Next position to be matched
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn pattern(&self) -> &[DataPoint] {
        &self.pattern
    }

    pub fn last_match(&self) -> Option<CorpusLocator> {
        self.last.map(|(loc, _)| loc)
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    locator: CorpusLocator,
    length: usize,
    lookback: usize,
    score: f64,
}

/// Lazy output of `Matcher::find_similar`
pub struct MatchStream<'m, 'c, J, F> {
    matcher: &'m Matcher<'c, J>,
    is_valid: F,
    ctx: SearchContext,
    finished: bool,
}

impl<J, F> MatchStream<'_, '_, J, F>
where
    J: Judge,
    F: Fn(&DataPoint) -> bool,
{
    pub fn context(&self) -> &SearchContext {
        &self.ctx
    }

    pub fn stats(&self) -> &MatchStats {
        &self.ctx.stats
    }

    fn score(&self, locator: CorpusLocator, lookback: usize, length: usize, i: usize) -> Option<f64> {
        let corpus = self.matcher.corpus.window(locator, lookback, length)?;
        let start = i.checked_sub(lookback)?;
        let pattern = self.ctx.pattern.get(start..start + length)?;
        Some(self.matcher.judge.judge(corpus, pattern, lookback, 1.0))
    }

    /// Extend the previous match by one element with a shrunk window
    fn continuation(&self, i: usize) -> Option<Scored> {
        let (last, last_length) = self.ctx.last?;
        if last_length <= 2 {
            return None;
        }
        let length = if last_length % 2 == 0 {
            last_length - 2
        } else {
            last_length - 1
        };
        let config = &self.matcher.config;
        let lookback = lookback(i, length, self.ctx.pattern.len(), config.max_lookback);
        let locator = last.advance();

        if !self
            .matcher
            .run_is_valid(locator, length - lookback, &self.is_valid)
        {
            return None;
        }
        let score = self.score(locator, lookback, length, i)? + config.pog_bonus;

        Some(Scored {
            locator,
            length,
            lookback,
            score,
        })
    }

    /// Shrinking-window search, returns the number of occurrences examined
    fn search(&self, i: usize, best: &mut Option<Scored>) -> usize {
        let config = &self.matcher.config;
        let total = self.ctx.pattern.len();
        let mut examined = 0;
        let mut length = config.first_search_length.min(total);

        while length > 0 && examined < config.max_search {
            let lookback = lookback(i, length, total, config.max_lookback);
            let best_score = best.map_or(f64::NEG_INFINITY, |b| b.score);
            if best_score >= 0.5 * self.matcher.judge.best_possible_score(length, lookback) {
                break;
            }

            let start = i - lookback;
            let query = &self.ctx.symbols[start..start + length];
            for occurrence in self.matcher.occurrences(query) {
                if examined >= config.max_search {
                    break;
                }
                examined += 1;

                let middle = occurrence.advance_by(lookback);
                if !self
                    .matcher
                    .run_is_valid(middle, length - lookback, &self.is_valid)
                {
                    continue;
                }
                let Some(score) = self.score(middle, lookback, length, i) else {
                    continue;
                };
                if best.map_or(true, |b| score > b.score) {
                    *best = Some(Scored {
                        locator: middle,
                        length,
                        lookback,
                        score,
                    });
                }
            }
            length -= 1;
        }
        examined
    }

    fn commit(&mut self, i: usize, best: Option<Scored>, examined: usize) -> DataPoint {
        self.ctx.stats.positions += 1;
        self.ctx.stats.examined += examined;

        let chosen = best.and_then(|b| self.matcher.corpus.point(b.locator).map(|p| (b, p.clone())));
        let point = match chosen {
            Some((b, point)) => {
                let cost = self
                    .matcher
                    .corpus
                    .window(b.locator, b.lookback, b.length)
                    .zip(self.ctx.pattern.get(i - b.lookback..i - b.lookback + b.length))
                    .map(|(c, p)| self.matcher.judge.matching_cost(c, p, b.lookback, 1.0))
                    .unwrap_or(0.0);

                let stats = &mut self.ctx.stats;
                if self
                    .ctx
                    .last
                    .map_or(false, |(last, _)| last.is_followed_by(&b.locator))
                {
                    stats.pogs += 1;
                }
                stats.score_sum += b.score;
                stats.cost_sum += cost;
                tracing::debug!(
                    position = i,
                    locator = %b.locator,
                    length = b.length,
                    score = b.score,
                    "Matched position"
                );
                self.ctx.last = Some((b.locator, b.length));
                point
            }
            None => {
                self.ctx.stats.fallbacks += 1;
                self.ctx.last = None;
                tracing::debug!("No valid candidate at position {}, keeping the input element", i);
                self.ctx.pattern[i].clone()
            }
        };

        self.ctx.pattern[i] = point.clone();
        self.ctx.position += 1;
        point
    }
}

impl<J, F> Iterator for MatchStream<'_, '_, J, F>
where
    J: Judge,
    F: Fn(&DataPoint) -> bool,
{
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let i = self.ctx.position;
        if i >= self.ctx.pattern.len() {
            if !self.finished {
                self.finished = true;
                tracing::info!("Pattern matched: {}", self.ctx.stats);
            }
            return None;
        }

        let mut best = self.continuation(i);
        let examined = self.search(i, &mut best);
        Some(self.commit(i, best, examined))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ctx.pattern.len() - self.ctx.position;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShapeJudge;
    use mosaic_core::EncoderSettings;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn square() -> Vec<DataPoint> {
        vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 100.0, 0.0),
            DataPoint::hit(1.0, 100.0, 1.57),
            DataPoint::release(1.0, 100.0, 0.0),
        ]
    }

    fn random_entry(rng: &mut StdRng, len: usize) -> Vec<DataPoint> {
        (0..len)
            .map(|_| {
                let beats = [0.5, 1.0, 2.0][rng.gen_range(0..3)];
                DataPoint::hit(beats, rng.gen_range(20.0..200.0), rng.gen_range(-3.0..3.0))
            })
            .collect()
    }

    fn corpus_of(entries: Vec<Vec<DataPoint>>) -> Corpus {
        let mut corpus = Corpus::new(EncoderSettings::default(), 32);
        corpus.extend(entries);
        corpus
    }

    #[test]
    fn test_lookback_bounds() {
        // Clamped to the position and to the pattern end
        assert_eq!(lookback(0, 4, 4, 4), 0);
        assert_eq!(lookback(1, 2, 4, 4), 1);
        assert_eq!(lookback(2, 4, 4, 4), 2);
        assert_eq!(lookback(3, 10, 10, 4), 3);
        assert_eq!(lookback(8, 10, 10, 4), 8);
        assert_eq!(lookback(20, 32, 100, 4), 4);
    }

    #[test]
    fn test_replay_accumulates() {
        let run = vec![
            DataPoint::hit(1.0, 100.0, 0.0),
            DataPoint::hit(0.5, 100.0, std::f64::consts::FRAC_PI_2),
        ];
        let replayed: Vec<_> = replay(&run).collect();

        assert_eq!(replayed[0].beats_since, 1.0);
        assert!((replayed[0].spacing - 100.0).abs() < 1e-9);
        assert_eq!(replayed[1].beats_since, 1.5);
        assert!((replayed[1].spacing - 100.0 * 2f64.sqrt()).abs() < 1e-9);
        assert!((replayed[1].angle - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_output_cardinality() {
        let mut rng = StdRng::seed_from_u64(7);
        let populated = corpus_of((0..5).map(|_| random_entry(&mut rng, 40)).collect());
        let empty = corpus_of(Vec::new());

        for corpus in [&populated, &empty] {
            let matcher = Matcher::new(corpus, ShapeJudge::new());
            for n in [0, 1, 10, 100] {
                let pattern = random_entry(&mut rng, n);
                let mut stream = matcher.find_similar(&pattern, |_| true);
                let output: Vec<_> = stream.by_ref().collect();
                assert_eq!(output.len(), n);
                assert_eq!(stream.stats().positions, n);
                assert!(stream.next().is_none());
            }
        }
    }

    #[test]
    fn test_empty_corpus_falls_back_to_input() {
        let corpus = corpus_of(Vec::new());
        let matcher = Matcher::new(&corpus, ShapeJudge::new());
        let pattern = square();

        let mut stream = matcher.find_similar(&pattern, |_| true);
        let output: Vec<_> = stream.by_ref().collect();
        assert_eq!(output, pattern);
        assert_eq!(stream.stats().fallbacks, 4);
        assert!(stream.context().last_match().is_none());
    }

    #[test]
    fn test_self_match_prefers_exact_entry() {
        let far: Vec<_> = square()
            .into_iter()
            .map(|mut p| {
                p.spacing *= 3.0;
                p
            })
            .collect();
        let corpus = corpus_of(vec![square(), far]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        let mut stream = matcher.find_similar(&square(), |_| true);
        let output: Vec<_> = stream.by_ref().collect();

        assert_eq!(output, square());
        assert_eq!(stream.stats().fallbacks, 0);
        assert_eq!(stream.stats().pogs, 3);
        assert_eq!(stream.context().last_match(), Some(CorpusLocator::new(0, 3)));
    }

    #[test]
    fn test_continuation_walks_the_entry() {
        let mut rng = StdRng::seed_from_u64(11);
        let entry = random_entry(&mut rng, 10);
        let corpus = corpus_of(vec![entry.clone()]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        let mut stream = matcher.find_similar(&entry, |_| true);
        let output: Vec<_> = stream.by_ref().collect();

        assert_eq!(output, entry);
        assert_eq!(stream.stats().pogs, 9);
        assert!((stream.stats().pog_rate() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rejecting_predicate_falls_back() {
        let corpus = corpus_of(vec![square()]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        let mut stream = matcher.find_similar(&square(), |_| false);
        let output: Vec<_> = stream.by_ref().collect();
        assert_eq!(output, square());
        assert_eq!(stream.stats().fallbacks, 4);
        assert_eq!(stream.stats().pogs, 0);
    }

    #[test]
    fn test_predicate_sees_cumulative_values() {
        let corpus = corpus_of(vec![square()]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        // The whole run ends ~224 units from its start, shorter runs stay within 150
        let mut stream = matcher.find_similar(&square(), |p| p.spacing <= 150.0);
        let output: Vec<_> = stream.by_ref().collect();
        assert_eq!(output, square());
        assert_eq!(stream.stats().fallbacks, 0);
        assert_eq!(stream.stats().pogs, 3);
    }

    #[test]
    fn test_tolerance_ladder_finds_near_spacing() {
        let settings = EncoderSettings {
            distance_aware: true,
            ..Default::default()
        };
        let mut corpus = Corpus::new(settings, 32);
        corpus.add_entry(vec![DataPoint::hit(1.0, 100.0, 0.0), DataPoint::hit(1.0, 100.0, 0.5)]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        // Spacing bucket 26 against the corpus's 25: no exact occurrence
        let pattern = vec![DataPoint::hit(1.0, 104.0, 0.0), DataPoint::hit(1.0, 104.0, 0.5)];
        assert_eq!(corpus.query_exact(&corpus.encoder().encode_all(&pattern)).count(), 0);

        let mut stream = matcher.find_similar(&pattern, |_| true);
        let output: Vec<_> = stream.by_ref().collect();
        assert_eq!(output[0].spacing, 100.0);
        assert_eq!(output[1].spacing, 100.0);
        assert_eq!(stream.stats().fallbacks, 0);
    }

    #[test]
    fn test_streams_are_independent() {
        let corpus = corpus_of(vec![square()]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        let mut first = matcher.find_similar(&square(), |_| true);
        let mut second = matcher.find_similar(&square(), |_| false);
        assert_eq!(first.next(), Some(square()[0].clone()));
        assert_eq!(second.next(), Some(square()[0].clone()));
        assert_eq!(first.stats().fallbacks, 0);
        assert_eq!(second.stats().fallbacks, 1);
    }

    #[test]
    fn test_max_search_caps_examined_occurrences() {
        let mut rng = StdRng::seed_from_u64(3);
        // Every entry encodes to the same symbols
        let entries: Vec<Vec<DataPoint>> = (0..300)
            .map(|_| {
                (0..4)
                    .map(|_| DataPoint::hit(1.0, rng.gen_range(20.0..200.0), rng.gen_range(-3.0..3.0)))
                    .collect()
            })
            .collect();
        let corpus = corpus_of(entries);
        let config = MatcherConfig {
            max_search: 5,
            ..Default::default()
        };
        let matcher = Matcher::with_config(&corpus, ShapeJudge::new(), config);

        let pattern: Vec<_> = (0..8).map(|_| DataPoint::hit(1.0, 80.0, 0.5)).collect();
        let mut stream = matcher.find_similar(&pattern, |_| true);
        let mut previous = 0;
        while stream.next().is_some() {
            let examined = stream.stats().examined;
            assert!(examined - previous <= 5);
            previous = examined;
        }

        let stats = stream.stats();
        assert_eq!(stats.positions, 8);
        assert_eq!(stats.fallbacks, 0);
        assert!(stats.examined > 0);
        assert!(stats.examined <= 5 * stats.positions);
    }

    #[test]
    fn test_rejected_continuation_still_searches() {
        // Only runs that start at the tagged point replay it at spacing 100
        let tagged = vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 100.0, 0.0),
            DataPoint::hit(1.0, 100.0, 1.57).with_token("x"),
            DataPoint::hit(1.0, 100.0, 1.57),
            DataPoint::hit(1.0, 100.0, 0.0),
        ];
        let other: Vec<_> = (0..5).map(|_| DataPoint::hit(1.0, 30.0, -1.0)).collect();
        let corpus = corpus_of(vec![tagged.clone(), other]);
        let matcher = Matcher::new(&corpus, ShapeJudge::new());

        let starts_at_tag = |p: &DataPoint| p.source_token.as_deref() == Some("x") && (p.spacing - 100.0).abs() < 1e-6;
        let mut stream = matcher.find_similar(&tagged, |p| !starts_at_tag(p));

        stream.next();
        stream.next();
        let before = stream.context().last_match();
        assert_eq!(before, Some(CorpusLocator::new(0, 1)));

        // The continuation from (0, 1) starts at the tagged point
        stream.next();
        let after = stream.context().last_match();
        assert_eq!(stream.stats().fallbacks, 0);
        assert_eq!(stream.stats().pogs, 1);
        let (before, after) = (before.unwrap(), after.unwrap());
        assert_ne!(after, CorpusLocator::new(0, 2));
        assert!(!before.is_followed_by(&after));
    }
}
