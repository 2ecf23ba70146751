//! Constructor - replay matched data points into objects
//!
//! Stateless between calls; the `Continuation` returned by one call is the
//! starting state of the next.

use crate::object::{HitObject, ObjectKind};
use crate::timing::{Timing, UniformTiming, VelocityChange};
use glam::DVec2;
use mosaic_config::ConstructConfig;
use mosaic_core::{DataKind, DataPoint};
use mosaic_index::Corpus;
use mosaic_match::Match;

/// Start position when there is nothing to continue from
pub const PLAYFIELD_CENTRE: DVec2 = DVec2::new(256.0, 192.0);

const POSITION_EPSILON: f64 = 1e-9;

/// Running state at the end of the constructed output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Continuation {
    pub pos: DVec2,

    /// Heading, radians
    pub angle: f64,
    pub time: f64,
}

impl Default for Continuation {
    fn default() -> Self {
        Self::new(PLAYFIELD_CENTRE, 0.0, 0.0)
    }
}

impl Continuation {
    pub fn new(pos: DVec2, angle: f64, time: f64) -> Self {
        Self { pos, angle, time }
    }

    /// State at the end of an existing object list.
    ///
    /// The heading points from the last distinct position to the final one.
    pub fn from_objects(objects: &[HitObject]) -> Self {
        let Some(last) = objects.last() else {
            return Self::default();
        };
        let last_pos = last.end_pos();

        let before = objects
            .iter()
            .rev()
            .find_map(|object| {
                let end = object.end_pos();
                if end.distance_squared(last_pos) > POSITION_EPSILON {
                    Some(end)
                } else if object.pos.distance_squared(last_pos) > POSITION_EPSILON {
                    Some(object.pos)
                } else {
                    None
                }
            })
            .unwrap_or(PLAYFIELD_CENTRE);

        let angle = if before.distance_squared(last_pos) > POSITION_EPSILON {
            let heading = last_pos - before;
            heading.y.atan2(heading.x)
        } else {
            0.0
        };

        Self::new(last_pos, angle, last.end_time())
    }
}

/// Places matched sequences onto the end of an object list
pub struct Constructor {
    bounds: DVec2,
    timing: Option<Box<dyn Timing>>,
}

impl Constructor {
    pub fn new(bounds: DVec2) -> Self {
        Self {
            bounds,
            timing: None,
        }
    }

    pub fn with_config(config: &ConstructConfig) -> Self {
        let constructor = Self::new(DVec2::new(config.bounds[0], config.bounds[1]));
        match config.beat_length_ms {
            Some(beat_length) => constructor.with_timing(
                UniformTiming::new(beat_length, config.offset_ms).with_slider_multiplier(config.slider_multiplier),
            ),
            None => constructor,
        }
    }

    pub fn with_timing(mut self, timing: impl Timing + 'static) -> Self {
        self.timing = Some(Box::new(timing));
        self
    }

    pub fn bounds(&self) -> DVec2 {
        self.bounds
    }

    /// Replay a corpus match; `None` when its window is not in the corpus
    pub fn construct_match(
        &self,
        objects: &mut Vec<HitObject>,
        corpus: &Corpus,
        found: &Match,
        input: &[DataPoint],
        continuation: Option<Continuation>,
        velocities: Option<&mut Vec<VelocityChange>>,
    ) -> Option<Continuation> {
        let sequence = corpus.window(found.locator, 0, found.length)?;
        Some(self.replay(objects, sequence, found.multiplier(), input, continuation, velocities))
    }

    /// Replay `sequence` with `input` as the pattern elements it stands for.
    ///
    /// Timing, combo breaks and hit-sounds come from `input`; geometry and
    /// object shapes come from `sequence`.
    pub fn construct(
        &self,
        objects: &mut Vec<HitObject>,
        sequence: &[DataPoint],
        multiplier: f64,
        input: &[DataPoint],
        continuation: Option<Continuation>,
    ) -> Continuation {
        self.replay(objects, sequence, multiplier, input, continuation, None)
    }

    /// `construct`, also recording a velocity change for every finished slider.
    ///
    /// Changes are only produced when a timing is attached.
    pub fn construct_recording(
        &self,
        objects: &mut Vec<HitObject>,
        sequence: &[DataPoint],
        multiplier: f64,
        input: &[DataPoint],
        continuation: Option<Continuation>,
        velocities: &mut Vec<VelocityChange>,
    ) -> Continuation {
        self.replay(objects, sequence, multiplier, input, continuation, Some(velocities))
    }

    fn replay(
        &self,
        objects: &mut Vec<HitObject>,
        sequence: &[DataPoint],
        multiplier: f64,
        input: &[DataPoint],
        continuation: Option<Continuation>,
        mut velocities: Option<&mut Vec<VelocityChange>>,
    ) -> Continuation {
        let mut state = continuation.unwrap_or_else(|| Continuation::from_objects(objects));

        for (point, original) in sequence.iter().zip(input) {
            let original_object = original.source_token.as_deref().and_then(decode_logged);

            state.time = match &self.timing {
                Some(timing) => timing.walk_beats(original.beats_since, state.time),
                None => state.time + 1.0,
            };
            state.angle += point.angle;
            let step = DVec2::from_angle(state.angle) * point.spacing * multiplier;
            state.pos = (state.pos + step).clamp(DVec2::ZERO, self.bounds);

            match point.kind {
                DataKind::Release => {
                    let change = self.release(objects, point, original, original_object.as_ref(), &state);
                    if let (Some(change), Some(out)) = (change, velocities.as_mut()) {
                        out.push(change);
                    }
                }
                DataKind::Hit | DataKind::Spin => {
                    self.place(objects, point, original, original_object.as_ref(), &state)
                }
            }
        }

        state
    }

    /// Finish the previous object at the current state.
    ///
    /// Returns the velocity a finished slider needs to last until its release.
    fn release(
        &self,
        objects: &mut Vec<HitObject>,
        point: &DataPoint,
        original: &DataPoint,
        original_object: Option<&HitObject>,
        state: &Continuation,
    ) -> Option<VelocityChange> {
        let Some(last) = objects.last_mut() else {
            tracing::debug!("Release at {} with nothing to finish", state.time);
            return None;
        };
        if let ObjectKind::Spinner { end_time } = &mut last.kind {
            *end_time = state.time;
            return None;
        }
        let last = objects.pop()?;

        let mut slider = match point.source_token.as_deref().and_then(decode_logged) {
            Some(mut template) if template.is_slider() => {
                template.set_start_time(last.start_time);
                template.move_by(last.pos - template.pos);
                template
            }
            _ => HitObject::linear_slider(last.pos, state.pos, last.start_time),
        };

        if let Some(original_object) = original_object {
            slider.reset_hitsounds();
            slider.hitsounds = original_object.hitsounds.clone();
            if let (ObjectKind::Slider(shape), Some(source)) = (&mut slider.kind, original_object.slider()) {
                shape.edge_sounds = source.edge_sounds.clone();
                shape.edge_sets = source.edge_sets.clone();
            }
        }
        slider.new_combo = last.new_combo;

        // Rotate and scale the body so the tail lands on the release position
        let head = slider.pos;
        let current = slider.tail_pos() - head;
        let target = state.pos - head;
        if current.length() > POSITION_EPSILON && target.length() > POSITION_EPSILON {
            let rotation = target.y.atan2(target.x) - current.y.atan2(current.x);
            slider.transform_around_head(rotation, target.length() / current.length());
        }

        let mut change = None;
        if let ObjectKind::Slider(shape) = &mut slider.kind {
            if let Some(repeats) = original.repeats {
                shape.repeat_count = repeats;
            }
            shape.end_time = state.time;

            change = self.timing.as_ref().and_then(|timing| {
                let spans = shape.repeat_count.saturating_add(1);
                timing
                    .slider_velocity(shape.pixel_length, spans, slider.start_time, state.time)
                    .map(|velocity| VelocityChange {
                        time: slider.start_time,
                        velocity,
                    })
            });
        }
        objects.push(slider);
        change
    }

    /// Append a new circle or spinner at the current state
    fn place(
        &self,
        objects: &mut Vec<HitObject>,
        point: &DataPoint,
        original: &DataPoint,
        original_object: Option<&HitObject>,
        state: &Continuation,
    ) {
        let template = point.source_token.as_deref().and_then(decode_logged);
        let mut object = match (point.kind, template) {
            (DataKind::Spin, Some(template)) if template.is_spinner() => template,
            (DataKind::Hit, Some(template)) if template.is_circle() => template,
            (DataKind::Spin, _) => HitObject::spinner(state.time),
            _ => HitObject::circle(state.pos, state.time),
        };

        object.set_start_time(state.time);
        object.new_combo = original.new_combo;
        object.move_by(state.pos - object.pos);
        object.reset_hitsounds();
        if let Some(original_object) = original_object {
            object.hitsounds = original_object.hitsounds.clone();
        }
        objects.push(object);
    }
}

fn decode_logged(token: &str) -> Option<HitObject> {
    if token.trim().is_empty() {
        return None;
    }
    match HitObject::decode(token) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::warn!("Skipping object metadata: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::EncoderSettings;
    use mosaic_index::CorpusLocator;
    use std::f64::consts::FRAC_PI_2;

    const BOUNDS: DVec2 = DVec2::new(512.0, 382.0);

    fn in_bounds(pos: DVec2) -> bool {
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x <= BOUNDS.x && pos.y <= BOUNDS.y
    }

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new(EncoderSettings::default(), 32);
        corpus.add_entry(vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 100.0, 0.0),
            DataPoint::hit(1.0, 100.0, 1.57),
            DataPoint::release(1.0, 100.0, 0.0),
        ]);
        corpus.add_entry(vec![
            DataPoint::hit(0.5, 300.0, 2.5),
            DataPoint::spin(1.0, 250.0, -1.0),
            DataPoint::release(4.0, 0.0, 0.0),
            DataPoint::hit(1.0, 400.0, 0.3).with_new_combo(true),
            DataPoint::hit(0.5, 350.0, 3.0),
        ]);
        corpus
    }

    fn chain(constructor: &Constructor) -> (Vec<HitObject>, Vec<Continuation>) {
        let corpus = corpus();
        let matches = [
            Match::new(CorpusLocator::new(0, 0), 4),
            Match::new(CorpusLocator::new(1, 0), 3).with_scale_bounds(0.5, 2.0),
            Match::new(CorpusLocator::new(1, 3), 2).with_scale_bounds(1.5, 1.5),
            Match::new(CorpusLocator::new(0, 1), 3),
            Match::new(CorpusLocator::new(1, 0), 5),
        ];

        let mut objects = Vec::new();
        let mut states = Vec::new();
        let mut continuation = None;
        for found in &matches {
            let input = corpus.window(found.locator, 0, found.length).unwrap().to_vec();
            let state = constructor
                .construct_match(&mut objects, &corpus, found, &input, continuation, None)
                .unwrap();
            states.push(state);
            continuation = Some(state);
        }
        (objects, states)
    }

    #[test]
    fn test_chained_matches_stay_continuous() {
        for constructor in [
            Constructor::new(BOUNDS),
            Constructor::new(BOUNDS).with_timing(UniformTiming::from_bpm(180.0, 0.0)),
        ] {
            let (objects, states) = chain(&constructor);

            assert!(!objects.is_empty());
            assert!(objects.windows(2).all(|w| w[0].start_time <= w[1].start_time));
            assert!(states.windows(2).all(|w| w[0].time < w[1].time));
            assert!(objects.iter().all(|o| in_bounds(o.pos)));
            assert!(states.iter().all(|s| in_bounds(s.pos)));
            assert!(objects.iter().all(|o| o.end_time() >= o.start_time));
        }
    }

    #[test]
    fn test_release_lands_slider_tail() {
        let constructor = Constructor::new(BOUNDS);
        let start = Continuation::new(DVec2::new(100.0, 100.0), 0.0, 0.0);
        let sequence = vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::release(1.0, 100.0, FRAC_PI_2).with_token("0,0,0,2,0,B|50:50|100:0,1,157"),
        ];
        let input = vec![
            DataPoint::hit(1.0, 0.0, 0.0).with_new_combo(true),
            DataPoint::release(1.0, 100.0, FRAC_PI_2)
                .with_repeats(2)
                .with_token("0,0,0,2,8,L|10:0,3,10,2|0|0|4,0:0|0:0|0:0|0:0"),
        ];

        let mut objects = Vec::new();
        let end = constructor.construct(&mut objects, &sequence, 1.0, &input, Some(start));

        assert_eq!(objects.len(), 1);
        let slider = &objects[0];
        let shape = slider.slider().unwrap();
        assert_eq!(shape.curve_type, mosaic_core::CurveType::Bezier);
        assert_eq!(slider.pos, DVec2::new(100.0, 100.0));
        assert!((slider.tail_pos() - end.pos).length() < 1e-6);
        assert!((end.pos - DVec2::new(100.0, 200.0)).length() < 1e-9);
        assert_eq!(shape.repeat_count, 2);
        assert_eq!(shape.edge_sounds, vec![2, 0, 0, 4]);
        assert_eq!(slider.hitsounds.sound, 8);
        assert!(slider.new_combo);
        assert_eq!(slider.end_time(), 2.0);
    }

    #[test]
    fn test_release_without_template_draws_line() {
        let constructor = Constructor::new(BOUNDS);
        let points = vec![DataPoint::hit(1.0, 0.0, 0.0), DataPoint::release(1.0, 80.0, 0.0)];

        let mut objects = Vec::new();
        let end = constructor.construct(&mut objects, &points, 1.0, &points, None);

        let shape = objects[0].slider().unwrap();
        assert_eq!(shape.curve_type, mosaic_core::CurveType::Linear);
        assert!((shape.pixel_length - 80.0).abs() < 1e-9);
        assert!((objects[0].tail_pos() - end.pos).length() < 1e-9);
    }

    #[test]
    fn test_spinner_release_sets_end_time() {
        let constructor = Constructor::new(BOUNDS);
        let points = vec![DataPoint::spin(1.0, 0.0, 0.0), DataPoint::release(2.0, 0.0, 0.0)];

        let mut objects = Vec::new();
        constructor.construct(&mut objects, &points, 1.0, &points, None);

        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_spinner());
        assert_eq!(objects[0].start_time, 1.0);
        assert_eq!(objects[0].end_time(), 2.0);
    }

    #[test]
    fn test_template_substitution() {
        let constructor = Constructor::new(BOUNDS);
        let sequence = vec![
            DataPoint::hit(1.0, 50.0, 0.0).with_token("10,10,500,2,0,L|100:10,1,90"),
            DataPoint::spin(1.0, 0.0, 0.0).with_token("10,10,900,1,0"),
        ];
        let input = vec![
            DataPoint::hit(1.0, 50.0, 0.0).with_token("not,an,object"),
            DataPoint::spin(1.0, 0.0, 0.0),
        ];

        let mut objects = Vec::new();
        constructor.construct(&mut objects, &sequence, 1.0, &input, None);

        assert!(objects[0].is_circle());
        assert_eq!(objects[0].pos, DVec2::new(306.0, 192.0));
        assert_eq!(objects[0].hitsounds.sound, 0);
        assert!(objects[1].is_spinner());
    }

    #[test]
    fn test_positions_are_clamped() {
        let constructor = Constructor::new(BOUNDS);
        let points = vec![DataPoint::hit(1.0, 10_000.0, 0.0), DataPoint::hit(1.0, 10_000.0, 2.0)];

        let mut objects = Vec::new();
        let end = constructor.construct(&mut objects, &points, 3.0, &points, None);
        assert_eq!(objects[0].pos, DVec2::new(512.0, 192.0));
        assert!(in_bounds(end.pos));
    }

    #[test]
    fn test_continuation_from_objects() {
        assert_eq!(Continuation::from_objects(&[]), Continuation::default());

        let objects = vec![
            HitObject::circle(DVec2::new(0.0, 0.0), 100.0),
            HitObject::circle(DVec2::new(0.0, 50.0), 200.0),
            HitObject::circle(DVec2::new(0.0, 50.0), 300.0),
        ];
        let state = Continuation::from_objects(&objects);
        assert_eq!(state.pos, DVec2::new(0.0, 50.0));
        assert!((state.angle - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(state.time, 300.0);
    }

    #[test]
    fn test_release_records_slider_velocity() {
        let constructor = Constructor::new(BOUNDS).with_timing(UniformTiming::from_bpm(120.0, 0.0));
        let points = vec![
            DataPoint::hit(1.0, 0.0, 0.0),
            DataPoint::release(2.0, 140.0, 0.0),
            DataPoint::spin(1.0, 0.0, 0.0),
            DataPoint::release(1.0, 0.0, 0.0),
            DataPoint::hit(1.0, 50.0, std::f64::consts::PI),
            DataPoint::release(1.0, 70.0, 0.0).with_repeats(1),
        ];
        let input = points.clone();

        let mut objects = Vec::new();
        let mut velocities = Vec::new();
        constructor.construct_recording(&mut objects, &points, 1.0, &input, None, &mut velocities);

        // 140 px over 2 beats, then 70 px travelled twice over 1 beat
        assert_eq!(objects.len(), 3);
        assert_eq!(velocities.len(), 2);
        assert_eq!(velocities[0].time, 500.0);
        assert!((velocities[0].velocity - 0.5).abs() < 1e-9);
        assert_eq!(velocities[1].time, objects[2].start_time);
        assert!((velocities[1].velocity - 1.0).abs() < 1e-9);
        assert_eq!(velocities[0].to_string(), "500,0.5");
    }

    #[test]
    fn test_config_slider_multiplier() {
        let config = ConstructConfig {
            beat_length_ms: Some(500.0),
            slider_multiplier: 2.8,
            ..Default::default()
        };
        let constructor = Constructor::with_config(&config);
        let points = vec![DataPoint::hit(1.0, 0.0, 0.0), DataPoint::release(2.0, 140.0, 0.0)];

        let mut velocities = Vec::new();
        constructor.construct_recording(&mut Vec::new(), &points, 1.0, &points, None, &mut velocities);
        assert!((velocities[0].velocity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_no_velocity_without_timing() {
        let constructor = Constructor::new(BOUNDS);
        let points = vec![DataPoint::hit(1.0, 0.0, 0.0), DataPoint::release(2.0, 140.0, 0.0)];

        let mut objects = Vec::new();
        let mut velocities = Vec::new();
        constructor.construct_recording(&mut objects, &points, 1.0, &points, None, &mut velocities);

        assert!(objects[0].is_slider());
        assert!(velocities.is_empty());
    }
}
