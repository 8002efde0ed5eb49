//! Movement vector between two positions.

use std::fmt;

use super::{KT_PER_M_PER_S, MS_PER_FTM};

/// Angle, distance, vertical speed and ground speed connecting two positions.
///
/// Vectors are derived values and never stored in a track on their own.
/// Unset components are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    /// True bearing in degrees.
    pub angle: f64,
    /// Distance in meters.
    pub dist: f64,
    /// Vertical speed in m/s.
    pub vsi: f64,
    /// Ground speed in m/s.
    pub speed: f64,
}

impl Default for Vector {
    fn default() -> Self {
        Self {
            angle: f64::NAN,
            dist: f64::NAN,
            vsi: f64::NAN,
            speed: f64::NAN,
        }
    }
}

impl Vector {
    /// Create a vector from its components.
    pub fn new(angle: f64, dist: f64, vsi: f64, speed: f64) -> Self {
        Self {
            angle,
            dist,
            vsi,
            speed,
        }
    }

    /// A pure direction-and-distance vector without timing information.
    pub fn heading_dist(angle: f64, dist: f64) -> Self {
        Self::new(angle, dist, f64::NAN, f64::NAN)
    }

    /// Vertical speed in ft/min.
    #[inline]
    pub fn vsi_ft(&self) -> f64 {
        self.vsi / MS_PER_FTM
    }

    /// Ground speed in knots.
    #[inline]
    pub fn speed_kn(&self) -> f64 {
        self.speed * KT_PER_M_PER_S
    }

    /// Whether the angle is known.
    #[inline]
    pub fn has_angle(&self) -> bool {
        !self.angle.is_nan()
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<h {:3.0}, {:5.0}m @ {:3.0}kt, {:4.0}ft/m>",
            self.angle,
            self.dist,
            self.speed_kn(),
            self.vsi_ft()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unset() {
        let v = Vector::default();
        assert!(!v.has_angle());
        assert!(v.dist.is_nan());
        assert!(v.speed_kn().is_nan());
    }

    #[test]
    fn test_unit_conversions() {
        let v = Vector::new(0.0, 100.0, MS_PER_FTM * 1000.0, 1.0 / KT_PER_M_PER_S * 150.0);
        assert!((v.vsi_ft() - 1000.0).abs() < 1e-9);
        assert!((v.speed_kn() - 150.0).abs() < 1e-9);
    }
}
