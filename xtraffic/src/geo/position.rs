//! A point in space-time plus the flags the pipeline attaches to it.

use std::fmt;

use super::{
    coord_angle, coord_distance, dist_lat_lon, heading_avg, heading_normalize, nan_if_none,
    none_if_nan, Vector, ALT_MAX_FT, ALT_MIN_FT, EARTH_D_M, KT_PER_M_PER_S, M_PER_FT, MS_PER_FTM,
};
use crate::phase::FlightPhase;

/// Ground status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroundStatus {
    /// Not yet determined (terrain not probed).
    #[default]
    Unknown,
    /// Airborne.
    Off,
    /// On the ground.
    On,
}

impl GroundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroundStatus::Unknown => "GND_UNKNOWN",
            GroundStatus::Off => "GND_OFF",
            GroundStatus::On => "GND_ON",
        }
    }
}

/// Special location a position was snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecialPos {
    #[default]
    None,
    /// A startup (parking) location.
    Startup,
    /// A taxiway node.
    Taxi,
    /// A runway node.
    Runway,
}

impl SpecialPos {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialPos::None => "",
            SpecialPos::Startup => "STA",
            SpecialPos::Taxi => "TXI",
            SpecialPos::Runway => "RWY",
        }
    }
}

/// Reference into the taxiway-edge database of the airport collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeRef {
    /// Not looked up yet.
    #[default]
    Unknown,
    /// Looked up, no edge nearby.
    Unavailable,
    /// Snapped onto this edge.
    Edge(usize),
}

/// Flags the pipeline attaches to positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionFlags {
    pub phase: FlightPhase,
    /// Heading was set by a collaborator and must not be recomputed.
    pub heading_fixed: bool,
    pub ground: GroundStatus,
    pub special: SpecialPos,
    /// The renderer may cut this corner with a quadratic curve.
    pub cut_corner: bool,
}

/// A position: latitude, longitude, altitude, timestamp and attitude.
///
/// Latitude, longitude and timestamp are always set for positions in a
/// track. Altitude and attitude may be unknown.
///
/// # Ordering
///
/// Positions compare by timestamp. Two positions whose timestamps lie within
/// the similarity tolerance are "similar" and get merged rather than both
/// kept; the tolerance-aware comparisons take the tolerance as argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Altitude in meters.
    pub alt_m: Option<f64>,
    /// Timestamp in seconds (simulated time scale).
    pub ts: f64,
    pub heading: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub flags: PositionFlags,
    pub edge: EdgeRef,
    /// Number of raw positions merged into this one.
    merge_count: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
            alt_m: None,
            ts: f64::NAN,
            heading: None,
            pitch: None,
            roll: None,
            flags: PositionFlags::default(),
            edge: EdgeRef::default(),
            merge_count: 1,
        }
    }
}

impl Position {
    /// Create a position with unknown attitude and ground status.
    pub fn new(lat: f64, lon: f64, alt_m: Option<f64>, ts: f64) -> Self {
        Self {
            lat,
            lon,
            alt_m,
            ts,
            ..Default::default()
        }
    }

    /// Create a position with the altitude given in feet.
    pub fn with_alt_ft(lat: f64, lon: f64, alt_ft: f64, ts: f64) -> Self {
        Self::new(lat, lon, none_if_nan(alt_ft * M_PER_FT), ts)
    }

    /// Set the heading.
    pub fn heading(mut self, heading: f64) -> Self {
        self.heading = none_if_nan(heading);
        self
    }

    /// Set the ground status.
    pub fn ground(mut self, ground: GroundStatus) -> Self {
        self.flags.ground = ground;
        self
    }

    /// Altitude in feet.
    pub fn alt_ft(&self) -> Option<f64> {
        self.alt_m.map(|a| a / M_PER_FT)
    }

    pub fn is_on_ground(&self) -> bool {
        self.flags.ground == GroundStatus::On
    }

    pub fn has_taxi_edge(&self) -> bool {
        matches!(self.edge, EdgeRef::Edge(_))
    }

    /// Whether a pipeline stage or collaborator already refined this
    /// position. Such positions are neither merged nor snapped again.
    pub fn is_post_processed(&self) -> bool {
        self.flags.heading_fixed
            || self.flags.cut_corner
            || self.flags.special != SpecialPos::None
            || self.flags.phase.is_known()
            || self.edge != EdgeRef::Unknown
    }

    /// Number of raw positions merged into this one.
    pub fn merge_count(&self) -> u32 {
        self.merge_count
    }

    /// Plausible coordinates, timestamp and altitude.
    ///
    /// A missing altitude is accepted for on-ground positions only if
    /// `allow_nan_alt_if_gnd` is set.
    pub fn is_normal(&self, allow_nan_alt_if_gnd: bool) -> bool {
        if self.lat.is_nan() || self.lon.is_nan() || self.ts.is_nan() {
            return false;
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return false;
        }
        match self.alt_ft() {
            Some(ft) => (ALT_MIN_FT..=ALT_MAX_FT).contains(&ft),
            None => self.is_on_ground() && allow_nan_alt_if_gnd,
        }
    }

    /// Normal and with heading, pitch and roll set.
    pub fn is_fully_valid(&self) -> bool {
        self.heading.is_some() && self.pitch.is_some() && self.roll.is_some() && self.is_normal(false)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Timestamp comparisons
    // ─────────────────────────────────────────────────────────────────────

    /// Timestamps differ by at most `tolerance`.
    pub fn has_similar_ts(&self, other: &Position, tolerance: f64) -> bool {
        (self.ts - other.ts).abs() <= tolerance
    }

    /// Not later than `other`, allowing `tolerance`.
    pub fn not_after(&self, other: &Position, tolerance: f64) -> bool {
        self.ts <= other.ts + tolerance
    }

    /// Not earlier than `other`, allowing `tolerance`.
    pub fn not_before(&self, other: &Position, tolerance: f64) -> bool {
        self.ts >= other.ts - tolerance
    }

    /// Earlier than `other` by more than `tolerance`.
    pub fn clearly_before(&self, other: &Position, tolerance: f64) -> bool {
        self.ts < other.ts - tolerance
    }

    /// Later than `other` by more than `tolerance`.
    pub fn clearly_after(&self, other: &Position, tolerance: f64) -> bool {
        self.ts > other.ts + tolerance
    }

    // ─────────────────────────────────────────────────────────────────────
    // Geometry
    // ─────────────────────────────────────────────────────────────────────

    /// Bearing towards `other`.
    pub fn angle_to(&self, other: &Position) -> f64 {
        coord_angle(self.lat, self.lon, other.lat, other.lon)
    }

    /// Great-circle distance to `other` in meters.
    pub fn dist_to(&self, other: &Position) -> f64 {
        coord_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Planar distance estimate to `other` in meters.
    pub fn dist_planar(&self, other: &Position) -> f64 {
        dist_lat_lon(self.lat, self.lon, other.lat, other.lon)
    }

    /// Vector from `self` to `other`.
    ///
    /// Identical timestamps yield infinite vertical and ground speed.
    pub fn between(&self, other: &Position) -> Vector {
        let d_ts = other.ts - self.ts;
        let dist = self.dist_to(other);
        let (vsi, speed) = if d_ts == 0.0 {
            (f64::INFINITY, f64::INFINITY)
        } else {
            (
                (nan_if_none(other.alt_m) - nan_if_none(self.alt_m)) / d_ts,
                dist / d_ts,
            )
        };
        Vector::new(self.angle_to(other), dist, vsi, speed)
    }

    /// Vertical speed towards `other` in ft/min.
    pub fn vsi_ft_to(&self, other: &Position) -> f64 {
        self.between(other).vsi / MS_PER_FTM
    }

    /// Ground speed towards `other` in m/s.
    pub fn speed_to(&self, other: &Position) -> f64 {
        self.between(other).speed
    }

    /// Ground speed towards `other` in knots.
    pub fn speed_kt_to(&self, other: &Position) -> f64 {
        self.speed_to(other) * KT_PER_M_PER_S
    }

    /// Move along `vec`.
    ///
    /// Latitude and longitude follow the great circle. If the vector carries
    /// a positive speed, the timestamp advances by the flight time and the altitude
    /// changes by `vsi` times that flight time. The result counts as a
    /// single, unmerged position.
    pub fn plus(&self, vec: &Vector) -> Position {
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        let angle = vec.angle.to_radians();
        let dist = vec.dist * 2.0 / EARTH_D_M;

        let mut ret = self.clone();
        ret.merge_count = 1;

        if vec.speed > 0.0 {
            let flight_time = vec.dist / vec.speed;
            if !vec.vsi.is_nan() {
                ret.alt_m = self.alt_m.map(|a| a + vec.vsi * flight_time);
            }
            ret.ts += flight_time;
        }

        let new_lat = (lat.sin() * dist.cos() + lat.cos() * dist.sin() * angle.cos()).asin();
        let new_lon = lon
            + (angle.sin() * dist.sin() * lat.cos()).atan2(dist.cos() - lat.sin() * new_lat.sin());
        ret.lat = new_lat.to_degrees();
        ret.lon = new_lon.to_degrees();
        ret.normalize();
        ret
    }

    /// Wrap latitude and longitude into range and normalize the heading.
    pub fn normalize(&mut self) -> &mut Self {
        if self.lat > 90.0 {
            self.lat = 180.0 - self.lat;
        }
        if self.lat < -90.0 {
            self.lat = -180.0 - self.lat;
        }
        if self.lon > 180.0 {
            self.lon -= 360.0;
        }
        if self.lon < -180.0 {
            self.lon += 360.0;
        }
        self.heading = self.heading.map(heading_normalize);
        self
    }

    /// Merge a similar position into this one.
    ///
    /// Values are averaged weighted by the number of raw positions already
    /// merged. An unset value on either side yields the other side's value,
    /// so an unset incoming heading never overwrites a known one. A flight
    /// phase already set survives. Differing ground status becomes unknown
    /// and location flags are reset for re-evaluation.
    pub fn merge(&mut self, other: &Position) {
        let w1 = f64::from(self.merge_count);
        let w2 = f64::from(other.merge_count);
        let avg = |a: f64, b: f64| (a * w1 + b * w2) / (w1 + w2);
        let avg_opt = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => Some(avg(a, b)),
            (a, b) => a.or(b),
        };

        self.heading = none_if_nan(heading_avg(
            nan_if_none(self.heading),
            nan_if_none(other.heading),
            w1,
            w2,
        ));
        self.lat = avg(self.lat, other.lat);
        self.lon = avg(self.lon, other.lon);
        self.ts = avg(self.ts, other.ts);
        self.alt_m = avg_opt(self.alt_m, other.alt_m);
        self.pitch = avg_opt(self.pitch, other.pitch);
        self.roll = avg_opt(self.roll, other.roll);
        self.merge_count += other.merge_count;

        if !self.flags.phase.is_known() {
            self.flags.phase = other.flags.phase;
        }
        if self.flags.ground != other.flags.ground {
            self.flags.ground = GroundStatus::Unknown;
        }
        self.flags.heading_fixed = false;
        self.flags.special = SpecialPos::None;
        self.flags.cut_corner = false;
        self.edge = EdgeRef::Unknown;

        self.normalize();
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}: ({:7.5}, {:7.5}) {:7.1}ft {:<11} {:<3} {:2} {:<13} {{h {:3.0}{}, p {:3.0}, r {:3.0}}}",
            self.ts,
            self.lat,
            self.lon,
            nan_if_none(self.alt_ft()),
            self.flags.ground.as_str(),
            self.flags.special.as_str(),
            if self.flags.cut_corner { "CT" } else { "" },
            self.flags.phase.as_str(),
            nan_if_none(self.heading),
            if self.flags.heading_fixed { '*' } else { ' ' },
            nan_if_none(self.pitch),
            nan_if_none(self.roll),
        )
    }
}

/// Render a sequence of positions one per line, with the vector to the next.
pub(crate) fn positions_to_string<'a>(positions: impl IntoIterator<Item = &'a Position>) -> String {
    let list: Vec<&Position> = positions.into_iter().collect();
    if list.is_empty() {
        return "<empty>\n".to_string();
    }
    let mut out = String::new();
    for (i, p) in list.iter().enumerate() {
        out.push_str(&p.to_string());
        if let Some(next) = list.get(i + 1) {
            out.push(' ');
            out.push_str(&p.between(next).to_string());
        }
        out.push('\n');
    }
    out
}
