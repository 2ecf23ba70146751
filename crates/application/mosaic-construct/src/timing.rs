//! Timing collaborator - beats to absolute time, slider velocities

use std::fmt;

/// Slider body travel per beat at velocity 1.0, in pixels
pub const BASE_SLIDER_PIXELS_PER_BEAT: f64 = 100.0;

/// Default global slider multiplier
pub const DEFAULT_SLIDER_MULTIPLIER: f64 = 1.4;

/// Converts beat gaps into absolute times
pub trait Timing {
    /// Absolute time `beats` after `from_time`
    fn walk_beats(&self, beats: f64, from_time: f64) -> f64;

    /// Velocity that makes a body of `pixel_length`, travelled `spans` times,
    /// last from `start_time` to `end_time`. `None` leaves the velocity alone.
    fn slider_velocity(&self, _pixel_length: f64, _spans: u32, _start_time: f64, _end_time: f64) -> Option<f64> {
        None
    }
}

/// Velocity change for a slider that was rescaled onto a new duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityChange {
    /// Start time of the slider
    pub time: f64,
    pub velocity: f64,
}

impl fmt::Display for VelocityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.time, self.velocity)
    }
}

/// Constant tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformTiming {
    /// Milliseconds per beat
    pub beat_length: f64,

    /// Time of beat zero
    pub offset: f64,

    /// Global slider multiplier
    pub slider_multiplier: f64,
}

impl UniformTiming {
    pub fn new(beat_length: f64, offset: f64) -> Self {
        Self {
            beat_length,
            offset,
            slider_multiplier: DEFAULT_SLIDER_MULTIPLIER,
        }
    }

    pub fn with_slider_multiplier(mut self, slider_multiplier: f64) -> Self {
        self.slider_multiplier = slider_multiplier;
        self
    }

    /// From beats per minute
    pub fn from_bpm(bpm: f64, offset: f64) -> Self {
        Self::new(60_000.0 / bpm, offset)
    }

    pub fn beat_at(&self, time: f64) -> f64 {
        (time - self.offset) / self.beat_length
    }

    pub fn time_at(&self, beat: f64) -> f64 {
        self.offset + beat * self.beat_length
    }
}

impl Timing for UniformTiming {
    fn walk_beats(&self, beats: f64, from_time: f64) -> f64 {
        self.time_at(self.beat_at(from_time) + beats)
    }

    /// `pixel_length / (beats_per_span * 100 * slider_multiplier)`
    fn slider_velocity(&self, pixel_length: f64, spans: u32, start_time: f64, end_time: f64) -> Option<f64> {
        let beats_per_span = (end_time - start_time) / self.beat_length / f64::from(spans.max(1));
        let denominator = beats_per_span * BASE_SLIDER_PIXELS_PER_BEAT * self.slider_multiplier;
        (denominator.is_finite() && denominator > 0.0 && pixel_length > 0.0).then(|| pixel_length / denominator)
    }
}
