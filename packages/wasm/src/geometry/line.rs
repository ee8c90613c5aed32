//! Line segments.

use serde::{Deserialize, Serialize};

use super::Vector;

/// A directed line segment from `start` to `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Start point.
    pub start: Vector,
    /// End point.
    pub end: Vector,
}

impl Line {
    /// Create a new line segment.
    #[inline]
    pub const fn new(start: Vector, end: Vector) -> Self {
        Self { start, end }
    }

    /// Segment length.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// `dy / dx`. Infinite for vertical lines.
    pub fn slope(&self) -> f64 {
        (self.end.y - self.start.y) / (self.end.x - self.start.x)
    }

    /// Direction vector (`end - start`).
    pub fn direction(&self) -> Vector {
        self.end - self.start
    }

    /// Angle of the segment in degrees.
    pub fn angle(&self) -> f64 {
        self.direction().angle()
    }

    /// Midpoint.
    pub fn center(&self) -> Vector {
        (self.start + self.end) * 0.5
    }

    /// General form coefficients `[a, b, c]` of `ax + by + c = 0`.
    pub fn general(&self) -> [f64; 3] {
        let Vector { x: x1, y: y1 } = self.start;
        let Vector { x: x2, y: y2 } = self.end;
        [y2 - y1, x1 - x2, x2 * y1 - x1 * y2]
    }

    /// Intersection of the infinite lines through both segments.
    ///
    /// Returns `None` for parallel (or degenerate) lines.
    pub fn intersection(&self, other: &Line) -> Option<Vector> {
        let [a1, b1, c1] = self.general();
        let [a2, b2, c2] = other.general();
        let det = a1 * b2 - a2 * b1;
        if det == 0.0 {
            return None;
        }
        Some(Vector::new(
            (b1 * c2 - b2 * c1) / det,
            (a2 * c1 - a1 * c2) / det,
        ))
    }

    /// Foot of the perpendicular dropped from `point` onto the line.
    pub fn pedal(&self, point: Vector) -> Vector {
        let d = self.direction();
        let len_sq = d.length_sq();
        if len_sq == 0.0 {
            return self.start;
        }
        let t = (point - self.start).dot(d) / len_sq;
        self.start + d * t
    }

    /// Shrink the segment by `a` at the start and `b` at the end.
    pub fn pad(&self, a: f64, b: f64) -> Line {
        let dir = self.direction().normalize();
        Line::new(self.start + dir * a, self.end - dir * b)
    }

    /// Translate by `offset` expressed in the line's own frame
    /// (x along the line, y perpendicular to it).
    pub fn translate(&self, offset: Vector) -> Line {
        let shift = offset.rotate(self.angle());
        Line::new(self.start + shift, self.end + shift)
    }
}
