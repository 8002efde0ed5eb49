//! Geographic bounding box.

use std::fmt;

use super::{heading_diff, Position, Vector};

/// A bounding box given by its north-west and south-east corners.
///
/// The box may cross the 180° meridian, in which case the north-west
/// longitude is larger than the south-east longitude. Boxes crossing a pole
/// are not supported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundingBox {
    pub nw: Position,
    pub se: Position,
}

impl BoundingBox {
    /// Box spanning `width` x `height` meters around `center`.
    pub fn around(center: &Position, width: f64, height: f64) -> Self {
        let mut b = Self {
            nw: center.clone(),
            se: center.clone(),
        };
        b.enlarge_m(width / 2.0, height / 2.0);
        b
    }

    /// Whether any corner has been set.
    pub fn is_set(&self) -> bool {
        !self.nw.lon.is_nan()
    }

    /// Grow the box by `x` meters east/west and `y` meters north/south.
    pub fn enlarge_m(&mut self, x: f64, y: f64) {
        // move the corners diagonally, good enough at this scale
        let d = (x * x + y * y).sqrt();
        self.nw = self.nw.plus(&Vector::heading_dist(315.0, d));
        self.se = self.se.plus(&Vector::heading_dist(135.0, d));
    }

    /// Grow the box to include the given coordinates.
    ///
    /// Longitude grows in whichever direction requires the smaller change.
    pub fn enlarge_pos(&mut self, lat: f64, lon: f64) {
        if !self.is_set() {
            self.nw = Position::new(lat, lon, None, f64::NAN);
            self.se = self.nw.clone();
            return;
        }

        if lat < self.se.lat {
            self.se.lat = lat;
        } else if lat > self.nw.lat {
            self.nw.lat = lat;
        }

        let diff_w = heading_diff(self.nw.lon, lon);
        let diff_e = heading_diff(self.se.lon, lon);

        if diff_w == diff_e {
            // box is a single point in longitude
            if diff_w < 0.0 {
                self.nw.lon = lon;
            } else {
                self.se.lon = lon;
            }
        } else if diff_w <= 0.0 || diff_e >= 0.0 {
            if diff_w.abs() < diff_e.abs() {
                self.nw.lon = lon;
            } else {
                self.se.lon = lon;
            }
        }
    }

    /// Grow the box to include `pos`.
    pub fn enlarge(&mut self, pos: &Position) {
        if !self.is_set() {
            self.nw = pos.clone();
            self.se = pos.clone();
            return;
        }
        self.enlarge_pos(pos.lat, pos.lon);
    }

    /// Center point of the box.
    pub fn center(&self) -> Position {
        let alt = match (self.nw.alt_m, self.se.alt_m) {
            (Some(a), Some(b)) => Some((a + b) / 2.0),
            _ => None,
        };
        Position::new(
            (self.nw.lat + self.se.lat) / 2.0,
            self.nw.lon + heading_diff(self.nw.lon, self.se.lon) / 2.0,
            alt,
            f64::NAN,
        )
    }

    /// Whether `pos` lies within the box.
    pub fn contains(&self, pos: &Position) -> bool {
        let lat_ok = self.nw.lat >= pos.lat && pos.lat >= self.se.lat;
        if !lat_ok {
            return false;
        }

        if self.nw.lon < self.se.lon {
            return self.nw.lon <= pos.lon && pos.lon <= self.se.lon;
        }

        // crosses the 180° meridian: shift negative longitudes by a full turn
        let wrap = |l: f64| if l < 0.0 { l + 360.0 } else { l };
        let (w, e, p) = (wrap(self.nw.lon), wrap(self.se.lon), wrap(pos.lon));
        if w < e {
            w <= p && p <= e
        } else {
            // box spans more than half the globe
            w >= p && p >= e
        }
    }

    /// Whether both boxes overlap.
    pub fn overlap(&self, o: &BoundingBox) -> bool {
        o.contains(&self.nw)
            || o.contains(&self.se)
            || self.contains(&Position::new(o.nw.lat, o.se.lon, None, f64::NAN))
            || self.contains(&Position::new(o.se.lat, o.nw.lon, None, f64::NAN))
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({:7.3}, {:7.3}) - ({:7.3}, {:7.3})]",
            self.nw.lat, self.nw.lon, self.se.lat, self.se.lon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Position {
        Position::new(lat, lon, None, 0.0)
    }

    #[test]
    fn test_around_contains_center() {
        let c = at(51.0, 7.0);
        let b = BoundingBox::around(&c, 10_000.0, 10_000.0);
        assert!(b.contains(&c));
        assert!(b.nw.lat > c.lat && b.nw.lon < c.lon);
        assert!(b.se.lat < c.lat && b.se.lon > c.lon);
        let m = b.center();
        assert!((m.lat - c.lat).abs() < 1e-3);
        assert!((m.lon - c.lon).abs() < 1e-3);
    }

    #[test]
    fn test_enlarge_from_empty() {
        let mut b = BoundingBox::default();
        assert!(!b.is_set());
        b.enlarge(&at(10.0, 20.0));
        b.enlarge(&at(12.0, 22.0));
        assert!(b.contains(&at(11.0, 21.0)));
        assert!(!b.contains(&at(13.0, 21.0)));
    }

    #[test]
    fn test_enlarge_across_date_line() {
        let mut b = BoundingBox::default();
        b.enlarge(&at(0.0, 179.0));
        b.enlarge(&at(1.0, -179.0));
        // grew east across the meridian instead of around the globe
        assert!(b.contains(&at(0.5, 180.0)));
        assert!(b.contains(&at(0.5, -179.5)));
        assert!(!b.contains(&at(0.5, 0.0)));
    }

    #[test]
    fn test_overlap() {
        let a = BoundingBox::around(&at(0.0, 0.0), 10_000.0, 10_000.0);
        let b = BoundingBox::around(&at(0.05, 0.05), 10_000.0, 10_000.0);
        let c = BoundingBox::around(&at(1.0, 1.0), 10_000.0, 10_000.0);
        assert!(a.overlap(&b));
        assert!(!a.overlap(&c));
    }
}
