//! Token Encoder - quantize data points into indexable symbols
//!
//! ```text
//!   Symbol (u16)
//!   ┌─────────────────────────┬─────────────────────────┐
//!   │ category * G + gap      │ spacing bucket (0..255) │
//!   │ (high byte)             │ (low byte, optional)    │
//!   └─────────────────────────┴─────────────────────────┘
//! ```
//!
//! Every bucket is monotonic in its input. Range queries over the index
//! depend on that: a wider spacing tolerance must map to a wider bucket span.

use crate::DataPoint;
use serde::{Deserialize, Serialize};

/// Hit, Spin, Release x {0, 1, many} repeats
pub const CATEGORY_COUNT: u8 = 5;

/// Quantized data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(u16);

impl Symbol {
    pub fn from_parts(rhythm: u8, distance: u8) -> Self {
        Symbol(((rhythm as u16) << 8) | distance as u16)
    }

    pub fn from_raw(raw: u16) -> Self {
        Symbol(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// Category and gap bucket (high byte)
    pub fn rhythm(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Spacing bucket (low byte), zero when the encoder ignores spacing
    pub fn distance(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

/// Encoder constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Offset added to floor(log2(beats)) (R)
    pub gap_resolution: i32,

    /// Number of gap buckets (G)
    pub gap_range: u8,

    /// Pixels per spacing bucket (K)
    pub distance_scale: f64,

    /// Encode the spacing bucket into the low byte
    pub distance_aware: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            gap_resolution: 6,
            gap_range: 9,
            distance_scale: 4.0,
            distance_aware: false,
        }
    }
}

/// Pure data point -> symbol mapping
#[derive(Debug, Clone, Default)]
pub struct TokenEncoder {
    settings: EncoderSettings,
}

impl TokenEncoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    pub fn is_distance_aware(&self) -> bool {
        self.settings.distance_aware
    }

    /// `clamp(floor(log2(beats)) + R, 0, G - 1)`
    pub fn gap_bucket(&self, beats_since: f64) -> u8 {
        let max = self.settings.gap_range.saturating_sub(1) as i32;
        let log = beats_since.log2().floor();
        // Saturating float -> int cast keeps non-positive gaps in bucket 0
        let bucket = (log as i32).saturating_add(self.settings.gap_resolution);
        bucket.max(0).min(max) as u8
    }

    /// `clamp(round(spacing / K), 0, 255)`
    pub fn distance_bucket(&self, spacing: f64) -> u8 {
        (spacing / self.settings.distance_scale).round().clamp(0.0, 255.0) as u8
    }

    pub fn category(point: &DataPoint) -> u8 {
        match point.kind {
            crate::DataKind::Hit => 0,
            crate::DataKind::Spin => 1,
            crate::DataKind::Release => 2 + point.repeat_class(),
        }
    }

    pub fn encode(&self, point: &DataPoint) -> Symbol {
        // Oversized gap ranges saturate instead of wrapping into other categories
        let rhythm = u16::from(Self::category(point)) * u16::from(self.settings.gap_range)
            + u16::from(self.gap_bucket(point.beats_since));
        let rhythm = rhythm.min(u16::from(u8::MAX)) as u8;
        let distance = if self.settings.distance_aware {
            self.distance_bucket(point.spacing)
        } else {
            0
        };
        Symbol::from_parts(rhythm, distance)
    }

    pub fn encode_all(&self, points: &[DataPoint]) -> Vec<Symbol> {
        points.iter().map(|p| self.encode(p)).collect()
    }

    /// Per-position bounds for a range query of tolerance `width`.
    ///
    /// The rhythm byte stays exact, the distance byte spans `[b - width, b + width]`.
    pub fn range_window(&self, symbols: &[Symbol], width: u8) -> (Vec<Symbol>, Vec<Symbol>) {
        symbols
            .iter()
            .map(|s| {
                (
                    Symbol::from_parts(s.rhythm(), s.distance().saturating_sub(width)),
                    Symbol::from_parts(s.rhythm(), s.distance().saturating_add(width)),
                )
            })
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataKind;

    fn distance_encoder() -> TokenEncoder {
        TokenEncoder::new(EncoderSettings {
            distance_aware: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_gap_bucket_clamps() {
        let encoder = TokenEncoder::default();
        assert_eq!(encoder.gap_bucket(1.0), 6);
        assert_eq!(encoder.gap_bucket(2.0), 7);
        assert_eq!(encoder.gap_bucket(0.5), 5);
        assert_eq!(encoder.gap_bucket(0.75), 5);
        assert_eq!(encoder.gap_bucket(1000.0), 8);
        assert_eq!(encoder.gap_bucket(1e-9), 0);
        assert_eq!(encoder.gap_bucket(0.0), 0);
    }

    #[test]
    fn test_distance_bucket_monotonic() {
        let encoder = distance_encoder();
        let mut last = 0;
        let mut spacing = 0.0;
        while spacing < 2000.0 {
            let bucket = encoder.distance_bucket(spacing);
            assert!(bucket >= last, "bucket decreased at spacing {}", spacing);
            last = bucket;
            spacing += 0.37;
        }
        assert_eq!(last, 255);
    }

    #[test]
    fn test_gap_bucket_monotonic() {
        let encoder = TokenEncoder::default();
        let mut last = 0;
        let mut beats = 0.01;
        while beats < 64.0 {
            let bucket = encoder.gap_bucket(beats);
            assert!(bucket >= last);
            last = bucket;
            beats *= 1.1;
        }
    }

    #[test]
    fn test_category_layout() {
        let encoder = TokenEncoder::default();
        let hit = encoder.encode(&DataPoint::hit(1.0, 100.0, 0.0));
        let spin = encoder.encode(&DataPoint::spin(1.0, 100.0, 0.0));
        let release = encoder.encode(&DataPoint::release(1.0, 100.0, 0.0).with_repeats(1));

        assert_eq!(hit.rhythm(), 6);
        assert_eq!(spin.rhythm(), 9 + 6);
        assert_eq!(release.rhythm(), 3 * 9 + 6);
        // Spacing is ignored without distance awareness
        assert_eq!(hit.distance(), 0);
        assert!(release.rhythm() < CATEGORY_COUNT * 9);
    }

    #[test]
    fn test_wide_gap_range_saturates() {
        let encoder = TokenEncoder::new(EncoderSettings {
            gap_range: 100,
            ..Default::default()
        });

        assert_eq!(encoder.encode(&DataPoint::spin(1.0, 0.0, 0.0)).rhythm(), 106);
        assert_eq!(encoder.encode(&DataPoint::release(1.0, 0.0, 0.0)).rhythm(), u8::MAX);
        assert_eq!(
            encoder.encode(&DataPoint::release(1.0, 0.0, 0.0).with_repeats(0)).rhythm(),
            u8::MAX
        );
    }

    #[test]
    fn test_distance_in_low_byte() {
        let encoder = distance_encoder();
        let symbol = encoder.encode(&DataPoint::new(DataKind::Hit, 1.0, 100.0, 0.0));
        assert_eq!(symbol.rhythm(), 6);
        assert_eq!(symbol.distance(), 25);
    }

    #[test]
    fn test_range_window() {
        let encoder = distance_encoder();
        let symbols = vec![Symbol::from_parts(6, 2), Symbol::from_parts(7, 254)];
        let (lo, hi) = encoder.range_window(&symbols, 3);

        assert_eq!(lo, vec![Symbol::from_parts(6, 0), Symbol::from_parts(7, 251)]);
        assert_eq!(hi, vec![Symbol::from_parts(6, 5), Symbol::from_parts(7, 255)]);
    }
}
