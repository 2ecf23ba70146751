//! Playfield predicate - keeps candidate runs inside the bounds
//!
//! The matcher replays a candidate run from the origin facing +x. The
//! predicate re-anchors that replay at the current end of the output and
//! rejects runs that would leave the playfield. The anchor is shared, so the
//! caller moves it forward as objects are constructed.

use crate::constructor::Continuation;
use glam::DVec2;
use mosaic_core::DataPoint;
use std::cell::Cell;
use std::rc::Rc;

pub struct PlayfieldPredicate {
    anchor: Rc<Cell<Continuation>>,
    bounds: DVec2,
    margin: f64,
}

impl PlayfieldPredicate {
    pub fn new(anchor: Rc<Cell<Continuation>>, bounds: DVec2) -> Self {
        Self {
            anchor,
            bounds,
            margin: 0.0,
        }
    }

    /// Predicate with an anchor nobody else moves
    pub fn fixed(origin: Continuation, bounds: DVec2) -> Self {
        Self::new(Rc::new(Cell::new(origin)), bounds)
    }

    /// Require this much clearance from every edge
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    pub fn anchor(&self) -> &Rc<Cell<Continuation>> {
        &self.anchor
    }

    /// Absolute position of a replayed point
    pub fn project(&self, replayed: &DataPoint) -> DVec2 {
        let anchor = self.anchor.get();
        anchor.pos + DVec2::from_angle(anchor.angle + replayed.angle) * replayed.spacing
    }

    pub fn check(&self, replayed: &DataPoint) -> bool {
        let p = self.project(replayed);
        let lo = DVec2::splat(self.margin);
        let hi = self.bounds - lo;
        p.x >= lo.x && p.y >= lo.y && p.x <= hi.x && p.y <= hi.y
    }
}
