//! Geometry kernel.
//!
//! Pure functions and value types for positions, vectors, bounding boxes,
//! great-circle and planar distances, Bezier curves and heading arithmetic.
//!
//! # Unset values
//!
//! The functions in this module take and return plain `f64`. An unset input
//! (NaN) propagates to an unset output; nothing here panics or returns an
//! error. The data model above this layer ([`Position`]) stores unset values
//! as `Option<f64>` and converts at this boundary only.

mod bbox;
mod curve;
mod position;
mod vector;

pub use bbox::BoundingBox;
pub use curve::{
    bezier_cubic, bezier_quadratic, coord_intersect, dist_point_to_line_sqr, DistToLine,
    Intersection, Pt,
};
pub(crate) use position::positions_to_string;
pub use position::{EdgeRef, GroundStatus, Position, PositionFlags, SpecialPos};
pub use vector::Vector;

/// Meters per foot.
pub const M_PER_FT: f64 = 0.3048;

/// Meters per nautical mile.
pub const M_PER_NM: f64 = 1852.0;

/// Knots per meter/second.
pub const KT_PER_M_PER_S: f64 = 1.94384;

/// Meters/second per foot/minute.
pub const MS_PER_FTM: f64 = M_PER_FT / 60.0;

/// Length of one degree of latitude in meters.
pub const LAT_DEG_IN_MTR: f64 = 111_132.95;

/// Earth diameter in meters.
pub const EARTH_D_M: f64 = 12_742_000.0;

/// Lowest plausible altitude in feet.
pub const ALT_MIN_FT: f64 = -1500.0;

/// Highest plausible altitude in feet.
pub const ALT_MAX_FT: f64 = 60000.0;

/// Convert an optional value to the kernel's NaN representation.
#[inline]
pub fn nan_if_none(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

/// Convert a kernel value back to the data model's optional representation.
#[inline]
pub fn none_if_nan(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

/// Length of one degree of longitude in meters at the given latitude.
#[inline]
pub fn lon_deg_in_mtr(lat: f64) -> f64 {
    LAT_DEG_IN_MTR * lat.to_radians().cos()
}

/// Initial great-circle bearing from point 1 to point 2, in [0, 360).
pub fn coord_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let d_lon = lon2 - lon1;
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let y = d_lon.sin() * lat2.cos();
    heading_normalize(y.atan2(x).to_degrees())
}

/// Great-circle (haversine) distance in meters.
pub fn coord_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let x = ((lat2 - lat1) / 2.0).sin();
    let y = ((lon2 - lon1) / 2.0).sin();
    EARTH_D_M * (x * x + lat1.cos() * lat2.cos() * y * y).sqrt().asin()
}

/// Squared planar distance estimate in square meters.
///
/// Cheap replacement for [`coord_distance`] over short distances.
pub fn dist_lat_lon_sqr(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dx = (lon2 - lon1) * lon_deg_in_mtr((lat1 + lat2) / 2.0);
    let dz = (lat2 - lat1) * LAT_DEG_IN_MTR;
    dx * dx + dz * dz
}

/// Planar distance estimate in meters.
#[inline]
pub fn dist_lat_lon(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    dist_lat_lon_sqr(lat1, lon1, lat2, lon2).sqrt()
}

/// Normalize a heading to [0, 360).
///
/// NaN stays NaN.
pub fn heading_normalize(h: f64) -> f64 {
    if !h.is_finite() {
        return h;
    }
    let n = h.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if n >= 360.0 {
        0.0
    } else {
        n
    }
}

/// Weighted circular average of two headings, normalized to [0, 360).
///
/// `f1` and `f2` are the linear weights of `head1` and `head2`. If either
/// heading is unset the other one is returned.
pub fn heading_avg(head1: f64, head2: f64, f1: f64, f2: f64) -> f64 {
    if head1.is_nan() {
        return head2;
    }
    if head2.is_nan() {
        return head1;
    }

    let (mut h1, mut h2) = (head1, head2);
    if (h2 - h1).abs() > 180.0 {
        // north lies between both: lift the smaller one by a full turn
        if h1 < h2 {
            h1 += 360.0;
        } else {
            h2 += 360.0;
        }
    }

    let sum = f1 + f2;
    if sum == 0.0 || !sum.is_finite() {
        return heading_normalize((h1 + h2) / 2.0);
    }
    heading_normalize((f1 * h1 + f2 * h2) / sum)
}

/// Signed smallest difference `head2 - head1`, in [-180, 180].
///
/// Positive values mean a right turn. Unset inputs yield NaN.
pub fn heading_diff(head1: f64, head2: f64) -> f64 {
    if head1.is_nan() || head2.is_nan() {
        return f64::NAN;
    }
    let (mut h1, mut h2) = (head1, head2);
    if (h2 - h1).abs() > 180.0 {
        if h1 < h2 {
            h1 += 360.0;
        } else {
            h2 += 360.0;
        }
    }
    h2 - h1
}
