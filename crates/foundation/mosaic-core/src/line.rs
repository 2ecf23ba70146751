//! Line format for data points
//!
//! ```text
//! kind beats spacing angle new_combo curve repeats token
//!  0   1.0000  100  1.5708    1       2     1     64,192,500,2,0,B|...
//! ```
//!
//! Fields are separated by a single space. Optional fields are empty when
//! absent, so a plain hit still carries its three trailing separators.
//! The token is last and takes the rest of the line.
//!
//! Corpus files hold one entry per block of lines; blocks are separated by
//! blank lines.

use crate::{CurveType, DataKind, DataPoint, Error, Result};
use std::fmt;
use std::str::FromStr;

const FIELD_COUNT: usize = 8;

/// Smallest positive beat count the 4-decimal field can hold
const MIN_PRINTED_BEATS: f64 = 0.0001;

impl DataPoint {
    /// Serialize into one line (no trailing newline)
    pub fn to_line(&self) -> String {
        // Positive gaps must not print as 0, which would fail to parse
        let beats = if self.beats_since > 0.0 {
            self.beats_since.max(MIN_PRINTED_BEATS)
        } else {
            self.beats_since
        };
        format!(
            "{} {:.4} {:.0} {:.4} {} {} {} {}",
            self.kind.code(),
            beats,
            self.spacing,
            self.angle,
            u8::from(self.new_combo),
            self.curve_type.map(|c| c.code().to_string()).unwrap_or_default(),
            self.repeats.map(|r| r.to_string()).unwrap_or_default(),
            self.source_token.as_deref().unwrap_or_default(),
        )
    }

    /// Parse one line; the result must satisfy the data point invariants
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.splitn(FIELD_COUNT, ' ').collect();
        let field = |i: usize, name: &'static str| fields.get(i).copied().ok_or(Error::MissingField(name));

        let kind_raw = field(0, "kind")?;
        let kind = kind_raw
            .parse::<u8>()
            .ok()
            .and_then(DataKind::from_code)
            .ok_or_else(|| invalid("kind", kind_raw))?;

        let point = DataPoint {
            kind,
            beats_since: parse_number(field(1, "beats_since")?, "beats_since")?,
            spacing: parse_number(field(2, "spacing")?, "spacing")?,
            angle: parse_number(field(3, "angle")?, "angle")?,
            new_combo: match field(4, "new_combo")? {
                "0" => false,
                "1" => true,
                other => return Err(invalid("new_combo", other)),
            },
            curve_type: match optional(&fields, 5) {
                Some(raw) => Some(
                    raw.parse::<u8>()
                        .ok()
                        .and_then(CurveType::from_code)
                        .ok_or_else(|| invalid("curve_type", raw))?,
                ),
                None => None,
            },
            repeats: match optional(&fields, 6) {
                Some(raw) => Some(raw.parse::<u32>().map_err(|_| invalid("repeats", raw))?),
                None => None,
            },
            source_token: optional(&fields, 7).map(str::to_string),
        };

        point.validate()?;
        Ok(point)
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl FromStr for DataPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DataPoint::from_line(s)
    }
}

fn invalid(field: &'static str, value: &str) -> Error {
    Error::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn parse_number(raw: &str, field: &'static str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| invalid(field, raw))
}

fn optional<'a>(fields: &[&'a str], i: usize) -> Option<&'a str> {
    fields.get(i).copied().filter(|s| !s.is_empty())
}

/// Parse blank-line separated entries
pub fn parse_entries(text: &str) -> Result<Vec<Vec<DataPoint>>> {
    let mut entries = Vec::new();
    let mut current = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
            continue;
        }

        let point = DataPoint::from_line(line).map_err(|e| Error::Parse {
            line: i + 1,
            reason: e.to_string(),
        })?;
        current.push(point);
    }

    if !current.is_empty() {
        entries.push(current);
    }

    Ok(entries)
}

/// Inverse of [`parse_entries`]
pub fn write_entries(entries: &[Vec<DataPoint>]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for point in entry {
            out.push_str(&point.to_line());
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_roundtrip() {
        let lines = [
            "0 1.0000 100 1.5708 1   ",
            "0 0.5000 0 0.0000 0 2  ",
            "2 1.0000 86 0.0000 0  1 ",
            "1 4.0000 12 -3.1416 0   256,192,1000,12,0,3000",
            "0 0.2500 45 0.7854 1 2  64,80,500,2,0,B|100:100|150:80,1,120",
        ];

        for line in lines {
            let point: DataPoint = line.parse().unwrap();
            assert_eq!(point.to_line(), line);
        }
    }

    #[test]
    fn test_fields_parsed() {
        let point = DataPoint::from_line("2 2.0000 37 -0.5000 0 1 3 token with spaces").unwrap();
        assert_eq!(point.kind, DataKind::Release);
        assert_eq!(point.beats_since, 2.0);
        assert_eq!(point.spacing, 37.0);
        assert_eq!(point.angle, -0.5);
        assert_eq!(point.curve_type, Some(CurveType::Catmull));
        assert_eq!(point.repeats, Some(3));
        assert_eq!(point.source_token.as_deref(), Some("token with spaces"));
    }

    #[test]
    fn test_short_line_accepted() {
        let point = DataPoint::from_line("0 1.0000 10 0.0000 1").unwrap();
        assert!(point.new_combo);
        assert_eq!(point.repeats, None);
    }

    #[test]
    fn test_tiny_gap_stays_parseable() {
        let point = DataPoint::hit(0.00004, 10.0, 0.0);
        assert!(point.validate().is_ok());

        let line = point.to_line();
        assert_eq!(line, "0 0.0001 10 0.0000 0   ");
        let parsed = DataPoint::from_line(&line).unwrap();
        assert_eq!(parsed.beats_since, 0.0001);

        let text = write_entries(&[vec![point]]);
        assert_eq!(parse_entries(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!(DataPoint::from_line("9 1.0000 10 0.0000 0   ").is_err());
        assert!(DataPoint::from_line("0 abc 10 0.0000 0   ").is_err());
        assert!(DataPoint::from_line("0 0.0000 10 0.0000 0   ").is_err());
        assert!(DataPoint::from_line("0 1.0000 10 0.0000 2   ").is_err());
        assert!(DataPoint::from_line("0 1.0000").is_err());
    }

    #[test]
    fn test_entries_roundtrip() {
        let entries = vec![
            vec![DataPoint::hit(1.0, 0.0, 0.0), DataPoint::hit(1.0, 100.0, 0.0)],
            vec![DataPoint::spin(2.0, 0.0, 0.0)],
        ];

        let text = write_entries(&entries);
        let parsed = parse_entries(&text).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_parse_error_has_line_number() {
        let text = "0 1.0000 10 0.0000 0   \n\nbroken\n";
        match parse_entries(text) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
