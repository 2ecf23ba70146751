//! DataPoint - one element of a pattern or corpus sequence
//!
//! Every field is relative to the previous element:
//! - beats_since: time gap in beats
//! - spacing: distance travelled
//! - angle: turn relative to the previous direction
//!
//! Absolute time and position only exist after replay (see mosaic-construct).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// What happens at a data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// Start of a circle or slider
    Hit,
    /// Start of a spinner
    Spin,
    /// End of the previously opened slider or spinner
    Release,
}

impl DataKind {
    /// Integer code used by the line format
    pub fn code(self) -> u8 {
        match self {
            DataKind::Hit => 0,
            DataKind::Spin => 1,
            DataKind::Release => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DataKind::Hit),
            1 => Some(DataKind::Spin),
            2 => Some(DataKind::Release),
            _ => None,
        }
    }
}

/// Curve shape of a slider body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    Linear,
    Catmull,
    Bezier,
    PerfectCurve,
}

impl CurveType {
    pub fn code(self) -> u8 {
        match self {
            CurveType::Linear => 0,
            CurveType::Catmull => 1,
            CurveType::Bezier => 2,
            CurveType::PerfectCurve => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CurveType::Linear),
            1 => Some(CurveType::Catmull),
            2 => Some(CurveType::Bezier),
            3 => Some(CurveType::PerfectCurve),
            _ => None,
        }
    }

    /// Letter used in object tokens (`B|x:y|...`)
    pub fn letter(self) -> char {
        match self {
            CurveType::Linear => 'L',
            CurveType::Catmull => 'C',
            CurveType::Bezier => 'B',
            CurveType::PerfectCurve => 'P',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'L' => Some(CurveType::Linear),
            'C' => Some(CurveType::Catmull),
            'B' => Some(CurveType::Bezier),
            'P' => Some(CurveType::PerfectCurve),
            _ => None,
        }
    }
}

/// One sequence element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub kind: DataKind,

    /// Time gap from the previous element, in beats (> 0)
    pub beats_since: f64,

    /// Distance from the previous position (>= 0)
    pub spacing: f64,

    /// Turn angle relative to the previous direction, radians
    pub angle: f64,

    /// Only meaningful for `DataKind::Hit`
    pub new_combo: bool,

    /// Curve type of the slider this hit starts, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve_type: Option<CurveType>,

    /// Repeat count of the slider a release ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats: Option<u32>,

    /// Raw object token, only used to copy secondary metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_token: Option<String>,
}

impl DataPoint {
    pub fn new(kind: DataKind, beats_since: f64, spacing: f64, angle: f64) -> Self {
        Self {
            kind,
            beats_since,
            spacing,
            angle,
            new_combo: false,
            curve_type: None,
            repeats: None,
            source_token: None,
        }
    }

    pub fn hit(beats_since: f64, spacing: f64, angle: f64) -> Self {
        Self::new(DataKind::Hit, beats_since, spacing, angle)
    }

    pub fn spin(beats_since: f64, spacing: f64, angle: f64) -> Self {
        Self::new(DataKind::Spin, beats_since, spacing, angle)
    }

    pub fn release(beats_since: f64, spacing: f64, angle: f64) -> Self {
        Self::new(DataKind::Release, beats_since, spacing, angle)
    }

    pub fn with_new_combo(mut self, new_combo: bool) -> Self {
        self.new_combo = new_combo;
        self
    }

    pub fn with_curve(mut self, curve_type: CurveType) -> Self {
        self.curve_type = Some(curve_type);
        self
    }

    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = Some(repeats);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.source_token = Some(token.into());
        self
    }

    /// Repeat-count class used by the encoder.
    ///
    /// Absent repeat counts fall into the last class.
    pub fn repeat_class(&self) -> u8 {
        match self.repeats {
            Some(0) => 0,
            Some(1) => 1,
            _ => 2,
        }
    }

    /// Check the invariants: beats_since finite and positive, spacing finite and non-negative
    pub fn validate(&self) -> Result<()> {
        if !self.beats_since.is_finite() || self.beats_since <= 0.0 {
            return Err(Error::InvalidDataPoint(format!(
                "beats_since must be finite and positive, got {}",
                self.beats_since
            )));
        }
        if !self.spacing.is_finite() || self.spacing < 0.0 {
            return Err(Error::InvalidDataPoint(format!(
                "spacing must be finite and non-negative, got {}",
                self.spacing
            )));
        }
        if !self.angle.is_finite() {
            return Err(Error::InvalidDataPoint(format!(
                "angle must be finite, got {}",
                self.angle
            )));
        }
        Ok(())
    }

    /// Left/right mirrored copy (turns flip direction)
    pub fn mirrored(&self) -> Self {
        Self {
            angle: -self.angle,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        for kind in [DataKind::Hit, DataKind::Spin, DataKind::Release] {
            assert_eq!(DataKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(DataKind::from_code(7), None);
    }

    #[test]
    fn test_curve_letters() {
        for code in 0..4 {
            let curve = CurveType::from_code(code).unwrap();
            assert_eq!(CurveType::from_letter(curve.letter()), Some(curve));
        }
    }

    #[test]
    fn test_repeat_class() {
        let release = DataPoint::release(1.0, 50.0, 0.0);
        assert_eq!(release.clone().with_repeats(0).repeat_class(), 0);
        assert_eq!(release.clone().with_repeats(1).repeat_class(), 1);
        assert_eq!(release.clone().with_repeats(4).repeat_class(), 2);
        assert_eq!(release.repeat_class(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(DataPoint::hit(0.5, 0.0, 0.0).validate().is_ok());
        assert!(DataPoint::hit(0.0, 10.0, 0.0).validate().is_err());
        assert!(DataPoint::hit(1.0, -1.0, 0.0).validate().is_err());
        assert!(DataPoint::hit(f64::NAN, 1.0, 0.0).validate().is_err());
    }

    #[test]
    fn test_mirrored() {
        let point = DataPoint::hit(1.0, 100.0, 1.2).with_new_combo(true);
        let mirror = point.mirrored();
        assert_eq!(mirror.angle, -1.2);
        assert_eq!(mirror.spacing, 100.0);
        assert!(mirror.new_combo);
    }
}
