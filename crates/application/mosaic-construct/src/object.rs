//! Hit objects and their comma-separated token form
//!
//! ```text
//! circle   x,y,time,type,hitsound[,sample]
//! slider   x,y,time,type,hitsound,C|x:y|x:y,slides,length[,edge sounds,edge sets[,sample]]
//! spinner  x,y,time,type,hitsound,end time[,sample]
//! ```
//!
//! Type bits: 1 circle, 2 slider, 4 new combo, 8 spinner.

use crate::constructor::PLAYFIELD_CENTRE;
use crate::path;
use crate::{Error, Result};
use glam::DVec2;
use mosaic_core::CurveType;
use std::fmt;
use std::str::FromStr;

const TYPE_CIRCLE: u8 = 1;
const TYPE_SLIDER: u8 = 2;
const TYPE_NEW_COMBO: u8 = 4;
const TYPE_SPINNER: u8 = 8;

/// Secondary metadata copied from the input pattern
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hitsounds {
    /// Addition bits
    pub sound: u8,

    /// Raw sample field, kept verbatim
    pub sample: Option<String>,
}

/// Slider body
#[derive(Debug, Clone, PartialEq)]
pub struct SliderShape {
    pub curve_type: CurveType,

    /// Absolute control points after the head
    pub control_points: Vec<DVec2>,
    pub pixel_length: f64,

    /// Reverse arrows; the body is travelled `repeat_count + 1` times
    pub repeat_count: u32,

    pub edge_sounds: Vec<u8>,
    pub edge_sets: Vec<String>,

    /// Set when a release finishes the slider
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Circle,
    Slider(SliderShape),
    Spinner { end_time: f64 },
}

/// One placed object
#[derive(Debug, Clone, PartialEq)]
pub struct HitObject {
    pub pos: DVec2,
    pub start_time: f64,
    pub new_combo: bool,
    pub hitsounds: Hitsounds,
    pub kind: ObjectKind,
}

impl HitObject {
    pub fn circle(pos: DVec2, start_time: f64) -> Self {
        Self {
            pos,
            start_time,
            new_combo: false,
            hitsounds: Hitsounds::default(),
            kind: ObjectKind::Circle,
        }
    }

    pub fn spinner(start_time: f64) -> Self {
        Self {
            kind: ObjectKind::Spinner {
                end_time: start_time,
            },
            ..Self::circle(PLAYFIELD_CENTRE, start_time)
        }
    }

    /// Straight slider from `head` to `tail`
    pub fn linear_slider(head: DVec2, tail: DVec2, start_time: f64) -> Self {
        Self {
            kind: ObjectKind::Slider(SliderShape {
                curve_type: CurveType::Linear,
                control_points: vec![tail],
                pixel_length: head.distance(tail),
                repeat_count: 0,
                edge_sounds: Vec::new(),
                edge_sets: Vec::new(),
                end_time: start_time,
            }),
            ..Self::circle(head, start_time)
        }
    }

    pub fn is_circle(&self) -> bool {
        matches!(self.kind, ObjectKind::Circle)
    }

    pub fn is_slider(&self) -> bool {
        matches!(self.kind, ObjectKind::Slider(_))
    }

    pub fn is_spinner(&self) -> bool {
        matches!(self.kind, ObjectKind::Spinner { .. })
    }

    pub fn slider(&self) -> Option<&SliderShape> {
        match &self.kind {
            ObjectKind::Slider(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn end_time(&self) -> f64 {
        match &self.kind {
            ObjectKind::Circle => self.start_time,
            ObjectKind::Slider(shape) => shape.end_time,
            ObjectKind::Spinner { end_time } => *end_time,
        }
    }

    /// End of the slider path, or the position for other kinds
    pub fn tail_pos(&self) -> DVec2 {
        match &self.kind {
            ObjectKind::Slider(shape) => path::tail(self.pos, shape),
            _ => self.pos,
        }
    }

    /// Where the object is left: a slider with an odd number of reverses ends at its head
    pub fn end_pos(&self) -> DVec2 {
        match &self.kind {
            ObjectKind::Slider(shape) if shape.repeat_count % 2 == 1 => self.pos,
            _ => self.tail_pos(),
        }
    }

    /// Move in time, keeping the duration
    pub fn set_start_time(&mut self, time: f64) {
        let delta = time - self.start_time;
        self.start_time = time;
        match &mut self.kind {
            ObjectKind::Circle => {}
            ObjectKind::Slider(shape) => shape.end_time += delta,
            ObjectKind::Spinner { end_time } => *end_time += delta,
        }
    }

    pub fn move_by(&mut self, delta: DVec2) {
        self.pos += delta;
        if let ObjectKind::Slider(shape) = &mut self.kind {
            for point in &mut shape.control_points {
                *point += delta;
            }
        }
    }

    /// Rotate and scale the body around the head
    pub fn transform_around_head(&mut self, rotation: f64, scale: f64) {
        let head = self.pos;
        let turn = DVec2::from_angle(rotation);
        if let ObjectKind::Slider(shape) = &mut self.kind {
            for point in &mut shape.control_points {
                *point = head + turn.rotate(*point - head) * scale;
            }
            shape.pixel_length *= scale;
        }
    }

    pub fn reset_hitsounds(&mut self) {
        self.hitsounds = Hitsounds::default();
        if let ObjectKind::Slider(shape) = &mut self.kind {
            shape.edge_sounds.clear();
            shape.edge_sets.clear();
        }
    }

    pub fn decode(token: &str) -> Result<Self> {
        let fields: Vec<&str> = token.trim().split(',').collect();
        let x: f64 = number(&fields, 0, token, "x")?;
        let y: f64 = number(&fields, 1, token, "y")?;
        let start_time: f64 = number(&fields, 2, token, "time")?;
        let type_bits: u8 = number(&fields, 3, token, "type")?;
        let sound: u8 = number(&fields, 4, token, "hitsound")?;

        let (kind, sample_index) = if type_bits & TYPE_SLIDER != 0 {
            (ObjectKind::Slider(decode_slider(&fields, token, start_time)?), 10)
        } else if type_bits & TYPE_SPINNER != 0 {
            let end_time = number(&fields, 5, token, "end time")?;
            (ObjectKind::Spinner { end_time }, 6)
        } else if type_bits & TYPE_CIRCLE != 0 {
            (ObjectKind::Circle, 5)
        } else {
            return Err(Error::decode(token, format!("unknown type bits {}", type_bits)));
        };

        Ok(Self {
            pos: DVec2::new(x, y),
            start_time,
            new_combo: type_bits & TYPE_NEW_COMBO != 0,
            hitsounds: Hitsounds {
                sound,
                sample: optional(&fields, sample_index),
            },
            kind,
        })
    }

    pub fn encode(&self) -> String {
        let mut type_bits = match self.kind {
            ObjectKind::Circle => TYPE_CIRCLE,
            ObjectKind::Slider(_) => TYPE_SLIDER,
            ObjectKind::Spinner { .. } => TYPE_SPINNER,
        };
        if self.new_combo {
            type_bits |= TYPE_NEW_COMBO;
        }

        let mut out = format!(
            "{},{},{},{},{}",
            self.pos.x.round() as i64,
            self.pos.y.round() as i64,
            self.start_time.round() as i64,
            type_bits,
            self.hitsounds.sound
        );

        match &self.kind {
            ObjectKind::Circle => {}
            ObjectKind::Slider(shape) => {
                out.push(',');
                out.push(shape.curve_type.letter());
                for point in &shape.control_points {
                    out.push_str(&format!("|{}:{}", point.x.round() as i64, point.y.round() as i64));
                }
                out.push_str(&format!(",{},{}", shape.repeat_count + 1, shape.pixel_length));

                if !shape.edge_sounds.is_empty() || self.hitsounds.sample.is_some() {
                    let sounds: Vec<String> = shape.edge_sounds.iter().map(u8::to_string).collect();
                    out.push_str(&format!(",{},{}", sounds.join("|"), shape.edge_sets.join("|")));
                }
            }
            ObjectKind::Spinner { end_time } => {
                out.push_str(&format!(",{}", end_time.round() as i64));
            }
        }

        if let Some(sample) = &self.hitsounds.sample {
            out.push(',');
            out.push_str(sample);
        }
        out
    }
}

fn decode_slider(fields: &[&str], token: &str, start_time: f64) -> Result<SliderShape> {
    let curve = field(fields, 5, token, "curve")?;
    let mut parts = curve.split('|');
    let letter = parts
        .next()
        .and_then(|l| l.chars().next())
        .ok_or_else(|| Error::decode(token, "empty curve"))?;
    let curve_type = CurveType::from_letter(letter)
        .ok_or_else(|| Error::decode(token, format!("unknown curve type {:?}", letter)))?;

    let control_points = parts
        .map(|point| {
            let (x, y) = point
                .split_once(':')
                .ok_or_else(|| Error::decode(token, format!("bad control point {:?}", point)))?;
            match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
                (Ok(x), Ok(y)) => Ok(DVec2::new(x, y)),
                _ => Err(Error::decode(token, format!("bad control point {:?}", point))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let slides: u32 = number(fields, 6, token, "slides")?;
    let pixel_length: f64 = number(fields, 7, token, "length")?;

    let edge_sounds = match optional(fields, 8) {
        Some(raw) => raw
            .split('|')
            .map(|s| {
                s.trim()
                    .parse::<u8>()
                    .map_err(|_| Error::decode(token, format!("bad edge sound {:?}", s)))
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    let edge_sets = optional(fields, 9)
        .map(|raw| raw.split('|').map(String::from).collect())
        .unwrap_or_default();

    Ok(SliderShape {
        curve_type,
        control_points,
        pixel_length,
        repeat_count: slides.saturating_sub(1),
        edge_sounds,
        edge_sets,
        end_time: start_time,
    })
}

fn field<'a>(fields: &[&'a str], index: usize, token: &str, name: &str) -> Result<&'a str> {
    fields
        .get(index)
        .map(|f| f.trim())
        .ok_or_else(|| Error::decode(token, format!("missing {}", name)))
}

fn number<T: FromStr>(fields: &[&str], index: usize, token: &str, name: &str) -> Result<T> {
    let raw = field(fields, index, token, name)?;
    raw.parse()
        .map_err(|_| Error::decode(token, format!("invalid {} {:?}", name, raw)))
}

fn optional(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(String::from)
}

impl fmt::Display for HitObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for HitObject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
