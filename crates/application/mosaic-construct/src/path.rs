//! Slider paths
//!
//! A slider body is approximated by a polyline and walked to its pixel
//! length. Past the last control point the final segment is extended.
//!
//! ## Curves
//!
//! ```text
//! Linear        straight segments through every control point
//! Bezier        de Casteljau per segment; a repeated point starts a new segment
//! PerfectCurve  circular arc through exactly three points (Bezier otherwise)
//! Catmull       Catmull-Rom spline through every point
//! ```

use crate::object::SliderShape;
use glam::DVec2;
use mosaic_core::CurveType;
use std::f64::consts::TAU;

const BEZIER_STEPS: usize = 32;
const CATMULL_STEPS: usize = 16;

/// Arc sample spacing in pixels
const ARC_STEP: f64 = 4.0;
const MAX_ARC_STEPS: usize = 256;

/// Slider tail for a body starting at `head`
pub fn tail(head: DVec2, shape: &SliderShape) -> DVec2 {
    position_at(&polyline(head, shape.curve_type, &shape.control_points), shape.pixel_length)
}

/// Polyline approximation of a whole curve, head included
pub fn polyline(head: DVec2, curve: CurveType, control_points: &[DVec2]) -> Vec<DVec2> {
    let mut points = Vec::with_capacity(control_points.len() + 1);
    points.push(head);
    points.extend_from_slice(control_points);

    match curve {
        CurveType::Linear => points,
        CurveType::Bezier => bezier(&points),
        CurveType::Catmull => catmull(&points),
        CurveType::PerfectCurve => match points.as_slice() {
            [a, b, c] => circular_arc(*a, *b, *c).unwrap_or_else(|| bezier(&points)),
            _ => bezier(&points),
        },
    }
}

/// Point `distance` along the polyline
pub fn position_at(polyline: &[DVec2], distance: f64) -> DVec2 {
    let Some(&first) = polyline.first() else {
        return DVec2::ZERO;
    };

    let mut remaining = distance.max(0.0);
    let mut last_direction = None;
    for pair in polyline.windows(2) {
        let segment = pair[1] - pair[0];
        let length = segment.length();
        if length <= f64::EPSILON {
            continue;
        }
        if remaining <= length {
            return pair[0] + segment * (remaining / length);
        }
        remaining -= length;
        last_direction = Some(segment / length);
    }

    let end = polyline.last().copied().unwrap_or(first);
    match last_direction {
        Some(direction) => end + direction * remaining,
        None => end,
    }
}

fn bezier(points: &[DVec2]) -> Vec<DVec2> {
    if points.len() < 2 {
        return points.to_vec();
    }

    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..points.len() {
        let is_last = i == points.len() - 1;
        let splits = !is_last && points[i] == points[i + 1];
        if splits || is_last {
            out.extend(bezier_segment(&points[start..=i]));
            start = i + 1;
        }
    }
    out
}

fn bezier_segment(control: &[DVec2]) -> Vec<DVec2> {
    if control.len() <= 2 {
        return control.to_vec();
    }
    (0..=BEZIER_STEPS)
        .map(|k| de_casteljau(control, k as f64 / BEZIER_STEPS as f64))
        .collect()
}

fn de_casteljau(control: &[DVec2], t: f64) -> DVec2 {
    let mut work = control.to_vec();
    for level in 1..work.len() {
        for i in 0..work.len() - level {
            work[i] = work[i].lerp(work[i + 1], t);
        }
    }
    work[0]
}

fn catmull(points: &[DVec2]) -> Vec<DVec2> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity((n - 1) * CATMULL_STEPS + 1);
    for i in 0..n - 1 {
        let p1 = points[i];
        let p2 = points[i + 1];
        let p0 = if i > 0 { points[i - 1] } else { p1 };
        let p3 = if i + 2 < n { points[i + 2] } else { p2 + (p2 - p1) };
        for k in 0..CATMULL_STEPS {
            out.push(catmull_point(p0, p1, p2, p3, k as f64 / CATMULL_STEPS as f64));
        }
    }
    out.push(points[n - 1]);
    out
}

fn catmull_point(p0: DVec2, p1: DVec2, p2: DVec2, p3: DVec2, t: f64) -> DVec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (2.0 * p1
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Arc from `a` through `b` to `c`, `None` when the points are collinear
fn circular_arc(a: DVec2, b: DVec2, c: DVec2) -> Option<Vec<DVec2>> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-9 {
        return None;
    }

    let (a2, b2, c2) = (a.length_squared(), b.length_squared(), c.length_squared());
    let centre = DVec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    );
    let radius = a.distance(centre);
    let angle_of = |p: DVec2| (p.y - centre.y).atan2(p.x - centre.x);

    let start = angle_of(a);
    let mut end = angle_of(c);
    if (b - a).perp_dot(c - b) > 0.0 {
        while end < start {
            end += TAU;
        }
    } else {
        while end > start {
            end -= TAU;
        }
    }

    let sweep = end - start;
    let steps = ((sweep.abs() * radius / ARC_STEP).ceil() as usize).clamp(2, MAX_ARC_STEPS);
    Some(
        (0..=steps)
            .map(|k| centre + DVec2::from_angle(start + sweep * k as f64 / steps as f64) * radius)
            .collect(),
    )
}
