//! Planar helpers: points, point-to-line distance, line intersection and
//! Bezier curves.
//!
//! All coordinates are plain `x`/`y` values. Callers pass longitude as `x`
//! and latitude as `y` (or local meters), so angles returned from the
//! tangent follow the compass convention (0 = +y, 90 = +x).

use std::ops::{Add, Div, Mul, Sub};

use super::heading_normalize;

/// A point in a plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pt {
    pub x: f64,
    pub y: f64,
}

impl Pt {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point.
    pub fn dist_sqr(&self, o: &Pt) -> f64 {
        let dx = o.x - self.x;
        let dy = o.y - self.y;
        dx * dx + dy * dy
    }
}

impl Add for Pt {
    type Output = Pt;
    fn add(self, o: Pt) -> Pt {
        Pt::new(self.x + o.x, self.y + o.y)
    }
}

impl Sub for Pt {
    type Output = Pt;
    fn sub(self, o: Pt) -> Pt {
        Pt::new(self.x - o.x, self.y - o.y)
    }
}

impl Mul<Pt> for f64 {
    type Output = Pt;
    fn mul(self, p: Pt) -> Pt {
        Pt::new(self * p.x, self * p.y)
    }
}

impl Div<f64> for Pt {
    type Output = Pt;
    fn div(self, d: f64) -> Pt {
        Pt::new(self.x / d, self.y / d)
    }
}

/// Result of [`dist_point_to_line_sqr`]. All values are squared lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistToLine {
    /// Squared distance from the point to its base on the (infinite) line.
    pub dist2: f64,
    /// Squared length of the line segment.
    pub len2: f64,
    /// Squared distance from the first segment end to the base.
    pub leg1_len2: f64,
    /// Squared distance from the second segment end to the base.
    pub leg2_len2: f64,
}

impl DistToLine {
    /// Whether the base point lies outside the segment.
    pub fn is_base_outside_line(&self) -> bool {
        self.leg1_len2 > self.len2 || self.leg2_len2 > self.len2
    }

    /// Squared distance plus the squared overshoot beyond the nearer end.
    ///
    /// Useful to rank candidate segments: a base outside the segment is
    /// penalized by how far outside it lies.
    pub fn dist_sqr_plus_outs(&self) -> f64 {
        if self.leg1_len2 > self.len2 {
            self.dist2 + self.leg2_len2
        } else if self.leg2_len2 > self.len2 {
            self.dist2 + self.leg1_len2
        } else {
            self.dist2
        }
    }

    /// Location of the base point on the line through `a` and `b`.
    pub fn base_location(&self, a: Pt, b: Pt) -> Pt {
        let mut r = self.leg1_len2.sqrt() / self.len2.sqrt();
        // base beyond a: factor points away from b
        if self.leg2_len2 > self.len2 {
            r = -r;
        }
        a + r * (b - a)
    }
}

/// Squared distance between `pt` and the line through `a` and `b`.
pub fn dist_point_to_line_sqr(pt: Pt, a: Pt, b: Pt) -> DistToLine {
    let a2 = pt.dist_sqr(&b);
    let b2 = pt.dist_sqr(&a);
    let len2 = a.dist_sqr(&b);
    let d = b2 - len2 - a2;
    let dist2 = (a2 - d * d / (4.0 * len2)).max(0.0);
    DistToLine {
        dist2,
        len2,
        leg1_len2: b2 - dist2,
        leg2_len2: a2 - dist2,
    }
}

/// Intersection of the lines `a`-`b` and `c`-`d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub pt: Pt,
    /// Position along `a`-`b` (0 at `a`, 1 at `b`).
    pub t: f64,
    /// Position along `c`-`d` (0 at `c`, 1 at `d`).
    pub u: f64,
}

impl Intersection {
    /// Whether the intersection lies within both segments.
    pub fn within_segments(&self) -> bool {
        (0.0..=1.0).contains(&self.t) && (0.0..=1.0).contains(&self.u)
    }
}

/// Intersect two lines. Parallel lines yield non-finite results.
pub fn coord_intersect(a: Pt, b: Pt, c: Pt, d: Pt) -> Intersection {
    let divisor = (a.x - b.x) * (c.y - d.y) - (a.y - b.y) * (c.x - d.x);
    let t = ((a.x - c.x) * (c.y - d.y) - (a.y - c.y) * (c.x - d.x)) / divisor;
    let u = -((a.x - b.x) * (a.y - c.y) - (a.y - b.y) * (a.x - c.x)) / divisor;
    let f1 = a.x * b.y - a.y * b.x;
    let f2 = c.x * d.y - c.y * d.x;
    Intersection {
        pt: (f1 * (c - d) - f2 * (a - b)) / divisor,
        t,
        u,
    }
}

fn tangent_angle(d: Pt) -> f64 {
    heading_normalize(d.x.atan2(d.y).to_degrees())
}

/// Point on a quadratic Bezier curve at `t` in [0, 1], with tangent angle.
pub fn bezier_quadratic(t: f64, p0: Pt, p1: Pt, p2: Pt) -> (Pt, f64) {
    let omt = 1.0 - t;
    let d = (2.0 * omt) * (p1 - p0) + (2.0 * t) * (p2 - p1);
    let pt = (omt * omt) * p0 + (2.0 * omt * t) * p1 + (t * t) * p2;
    (pt, tangent_angle(d))
}

/// Point on a cubic Bezier curve at `t` in [0, 1], with tangent angle.
pub fn bezier_cubic(t: f64, p0: Pt, p1: Pt, p2: Pt, p3: Pt) -> (Pt, f64) {
    let omt = 1.0 - t;
    let omt2 = omt * omt;
    let t2 = t * t;
    let d = (3.0 * omt2) * (p1 - p0) + (6.0 * omt * t) * (p2 - p1) + (3.0 * t2) * (p3 - p2);
    let pt = (omt2 * omt) * p0 + (3.0 * omt2 * t) * p1 + (3.0 * omt * t2) * p2 + (t2 * t) * p3;
    (pt, tangent_angle(d))
}
