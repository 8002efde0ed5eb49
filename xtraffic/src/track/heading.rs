//! Heading recompute and the kinematic plausibility check.

use thiserror::Error;

use super::{find_adjacent, Track};
use crate::config::PipelineConfig;
use crate::flight_model::FlightModel;
use crate::geo::{heading_avg, heading_diff, nan_if_none, none_if_nan, Position, Vector};

/// Why a leg between two positions is implausible.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Implausible {
    #[error("turn of {0:.0}° too sharp")]
    Turn(f64),

    #[error("vertical speed of {0:.0} ft/min out of range")]
    VerticalSpeed(f64),

    #[error("speed of {0:.0} kn too fast")]
    TooFast(f64),

    #[error("speed of {0:.0} kn too slow for flight")]
    TooSlow(f64),
}

/// Check whether `this` is a plausible continuation of `last`.
///
/// `heading` is the direction of travel arriving at `last`; without it no
/// turn check happens. On success returns the direction of the leg
/// `last -> this`.
///
/// A leg is rejected if
/// - the turn at `last` exceeds the ground or air limit,
/// - the vertical speed exceeds three times the nominal climb rate,
/// - the speed exceeds four times the flaps-down speed,
/// - either end is airborne and the speed is below taxi speed.
pub fn check_leg(
    model: &FlightModel,
    config: &PipelineConfig,
    last: &Position,
    this: &Position,
    heading: Option<f64>,
) -> Result<f64, Implausible> {
    let v = last.between(this);
    let max_turn = config.max_turn(this.is_on_ground());

    let h_diff = match heading {
        Some(h)
            if !last.flags.heading_fixed
                && !this.flags.heading_fixed
                && v.dist > config.similar_pos_dist_m =>
        {
            heading_diff(h, v.angle)
        }
        _ => 0.0,
    };

    if h_diff.abs() > max_turn {
        return Err(Implausible::Turn(h_diff));
    }

    let vsi_ft = v.vsi_ft();
    let max_vsi = 3.0 * model.vsi_init_climb;
    if vsi_ft < -max_vsi || vsi_ft > max_vsi {
        return Err(Implausible::VerticalSpeed(vsi_ft));
    }

    let speed_kn = v.speed_kn();
    if !speed_kn.is_nan() {
        if speed_kn > 4.0 * model.flaps_down_speed {
            return Err(Implausible::TooFast(speed_kn));
        }
        if (!last.is_on_ground() || !this.is_on_ground()) && speed_kn < model.max_taxi_speed {
            return Err(Implausible::TooSlow(speed_kn));
        }
    }

    Ok(v.angle)
}

impl Track {
    /// Plausibility check with this track's flight model.
    pub(crate) fn is_pos_ok(
        &self,
        config: &PipelineConfig,
        last: &Position,
        this: &Position,
        heading: Option<f64>,
    ) -> Result<f64, Implausible> {
        check_leg(&self.model, config, last, this, heading)
    }

    /// Recompute the heading of `positions[idx]`.
    ///
    /// The heading is the circular average of the incoming and outgoing
    /// leg, weighted towards the shorter one. Legs shorter than the
    /// similar-position distance do not count; a vehicle standing still
    /// keeps its predecessor's heading. Without any usable leg a reported
    /// heading stays, otherwise the dynamic data around the timestamp
    /// decides. Never leaves the heading unset.
    pub(crate) fn calc_heading(&mut self, idx: usize, config: &PipelineConfig) {
        let Some(cur) = self.positions.get(idx) else {
            return;
        };
        if cur.flags.heading_fixed {
            return;
        }

        let pre = if idx > 0 {
            self.positions.get(idx - 1)
        } else {
            self.instance_target()
        };

        let mut heading = cur.heading;
        let mut vec_to: Option<Vector> = None;
        if let Some(pre) = pre {
            let v = pre.between(cur);
            if v.dist < config.similar_pos_dist_m {
                heading = pre.heading;
                if heading.is_some() {
                    self.positions[idx].heading = heading;
                    return;
                }
            } else {
                vec_to = Some(v);
            }
        }

        let vec_from = self
            .positions
            .get(idx + 1)
            .map(|next| cur.between(next))
            .filter(|v| v.dist >= config.similar_pos_dist_m);

        let ts = cur.ts;
        let computed = match (vec_to, vec_from) {
            (Some(to), Some(from)) => heading_avg(to.angle, from.angle, from.dist, to.dist),
            (None, Some(from)) => from.angle,
            (Some(to), None) => to.angle,
            (None, None) => match heading {
                Some(h) => h,
                None => {
                    let adj = find_adjacent(&self.dynamics, ts);
                    match (adj.before, adj.after) {
                        (Some(b), Some(a)) => heading_avg(
                            nan_if_none(b.heading),
                            nan_if_none(a.heading),
                            a.ts - ts,
                            ts - b.ts,
                        ),
                        (Some(b), None) => nan_if_none(b.heading),
                        (None, Some(a)) => nan_if_none(a.heading),
                        (None, None) => 0.0,
                    }
                }
            },
        };

        self.positions[idx].heading = Some(none_if_nan(computed).unwrap_or(0.0));
    }

    /// Recompute all headings.
    pub(crate) fn calc_all_headings(&mut self, config: &PipelineConfig) {
        for idx in 0..self.positions.len() {
            self.calc_heading(idx, config);
        }
    }
}
