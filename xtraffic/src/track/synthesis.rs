//! The recompute entry point and synthesis of positions no channel reports.
//!
//! Channels report positions every few seconds at best, and rarely exactly
//! where a vehicle touches down, lifts off or comes to a stop. The renderer
//! needs those points to fly a believable path, so they are computed here
//! from the kinematics around them:
//!
//! - **Approach**: the buffer ran empty while descending; head for the
//!   runway the airport collaborator suggests.
//! - **Stop**: the buffer ran empty on the ground; stay where the vehicle is.
//! - **Touch-down**: descending towards a ground position; touch down at
//!   the current sink rate instead of gliding all the way to that position.
//! - **Lift-off**: a ground position followed by an airborne one; extend the
//!   climb backwards to find where the wheels leave the runway.

use tracing::{debug, trace};

use super::{Track, TrackContext};
use crate::collaborators::AirframeState;
use crate::error::TrackError;
use crate::geo::{nan_if_none, GroundStatus, Position, SpecialPos, Vector, KT_PER_M_PER_S, MS_PER_FTM};
use crate::phase::FlightPhase;

/// Positions this close to the simulated time count as consumed.
const CONSUMED_SLACK_SECS: f64 = 0.05;

impl Track {
    /// Recompute the buffer for `sim_time`.
    ///
    /// Returns `Ok(true)` if the buffer holds positions for the instance to
    /// fly to (or, without an instance, two positions straddling
    /// `sim_time`), `Ok(false)` if there is not enough data yet. Fails if the
    /// buffer cannot be continued plausibly or lost its ordering; the caller
    /// then invalidates the track.
    pub(crate) fn calc_next_pos(&mut self, ctx: &TrackContext<'_>, sim_time: f64) -> Result<bool, TrackError> {
        let config = ctx.config;
        let state = self.instance_state().cloned();

        self.trim_dynamics(sim_time);
        let mut changed = self.smooth();

        match &state {
            Some(state) => {
                while self
                    .positions
                    .front()
                    .is_some_and(|p| p.ts <= sim_time + CONSUMED_SLACK_SECS)
                {
                    self.positions.pop_front();
                    changed = true;
                }

                if self.positions.is_empty() {
                    if state.vsi_ft() < -self.model.vsi_stable {
                        changed |= self.synthesize_approach(ctx, state, sim_time);
                    } else if state.on_ground {
                        changed |= self.add_artificial_stop(ctx, state, sim_time);
                    }

                    if self.positions.is_empty() {
                        trace!(key = %self.key, "No more position data");
                        return Ok(false);
                    }
                }
            }
            None => {
                if self.positions.len() < 2 || self.positions.front().is_some_and(|p| sim_time < p.ts) {
                    return Ok(false);
                }
            }
        }

        changed |= self.cleanse(ctx)?;
        changed |= self.snap_to_taxiways(ctx);

        if let Some(state) = &state {
            if !self.positions.is_empty() {
                if self
                    .rotate_ts
                    .is_some_and(|ts| ts + 2.0 * self.model.rotate_time < sim_time)
                {
                    self.rotate_ts = None;
                }

                if self.is_landing_ahead(state) {
                    self.synthesize_touch_down(ctx, state)?;
                    changed = true;
                } else {
                    changed |= self.synthesize_lift_off(ctx, state, sim_time)?;
                }
            }
        }

        if changed {
            self.snap_to_taxiways(ctx);
        }

        if state.is_none() {
            // creation needs [0] <= sim_time < [1]
            while self.positions.len() >= 2 && self.positions[1].ts <= sim_time {
                self.positions.pop_front();
                changed = true;
            }
            if self.positions.len() < 2 {
                return Ok(false);
            }
        }

        if changed {
            self.calc_all_headings(config);
            debug!(key = %self.key, buffer = %self.dump(), "Buffer recomputed");
        }

        if let Some(ts) = self.first_unsorted() {
            return Err(TrackError::Unsorted { key: self.key, ts });
        }
        Ok(true)
    }

    /// Snap all ground positions not yet refined onto taxiways and runways.
    fn snap_to_taxiways(&mut self, ctx: &TrackContext<'_>) -> bool {
        let max_dist = ctx.config.snap_taxi_dist_m;
        if max_dist <= 0.0 {
            return false;
        }

        let mut changed = false;
        let mut idx = 0;
        while idx < self.positions.len() {
            let p = &self.positions[idx];
            if p.is_on_ground() && !p.is_post_processed() {
                changed |= ctx.airports.snap(&mut self.positions, &mut idx, max_dist, true);
            }
            idx += 1;
        }
        changed
    }

    /// Head for a runway after the buffer ran empty during a descent.
    ///
    /// A touch-down far ahead is only approached by one refresh interval, as
    /// the channel may still deliver real positions. Close to the runway a
    /// final alignment point and the touch-down point are added.
    fn synthesize_approach(&mut self, ctx: &TrackContext<'_>, state: &AirframeState, sim_time: f64) -> bool {
        let config = ctx.config;
        let target = &state.target;
        let Some(mut rwy) = ctx.airports.find_runway(&self.model, target, state.speed_m_s) else {
            return false;
        };
        rwy.flags.ground = GroundStatus::On;
        if !rwy.flags.phase.is_known() {
            rwy.flags.phase = FlightPhase::TouchDown;
        }

        let mut vec_rwy = target.between(&rwy);
        let d_ts = rwy.ts - sim_time;
        let align = config.runway_align_dist_m;

        if d_ts > config.refresh_interval_secs && vec_rwy.dist > 3.0 * align {
            vec_rwy.dist *= config.refresh_interval_secs / d_ts;
            let mut interim = target.plus(&vec_rwy);
            interim.flags.phase = FlightPhase::Approach;
            debug!(key = %self.key, pos = %interim, "Added intermediate approach position");
            self.positions.push_back(interim);
        } else {
            let rwy_heading = rwy.heading.unwrap_or(vec_rwy.angle);
            let final_speed = self.model.flaps_down_speed * config.final_speed_factor / KT_PER_M_PER_S;
            let mut before = rwy.plus(&Vector::new(
                (rwy_heading + 180.0) % 360.0,
                align,
                -vec_rwy.vsi,
                vec_rwy.speed.min(final_speed),
            ));
            // computed forward from the runway, but reached before it
            before.ts -= 2.0 * (before.ts - rwy.ts);
            before.pitch = Some(0.0);
            before.flags.ground = GroundStatus::Off;
            before.flags.phase = FlightPhase::Final;

            debug!(key = %self.key, pos = %before, "Added final position");
            debug!(key = %self.key, pos = %rwy, "Added touch-down position");
            self.positions.push_back(before);
            self.positions.push_back(rwy.clone());
        }

        self.runway = Some(rwy);
        true
    }

    /// Repeat the target as a stop once the buffer ran empty on the ground.
    fn add_artificial_stop(&mut self, ctx: &TrackContext<'_>, state: &AirframeState, sim_time: f64) -> bool {
        let target = &state.target;
        if !target.is_on_ground()
            || matches!(
                target.flags.phase,
                FlightPhase::TouchDown | FlightPhase::StoppedOnRunway
            )
        {
            return false;
        }

        let mut stop = target.clone();
        stop.ts = sim_time + ctx.config.artificial_stop_secs;
        stop.flags.phase = FlightPhase::StoppedOnRunway;
        debug!(key = %self.key, pos = %stop, "Added stop position");
        self.positions.push_back(stop);
        true
    }

    /// Whether the instance descends considerably in the air towards a
    /// ground position.
    fn is_landing_ahead(&self, state: &AirframeState) -> bool {
        let Some(next) = self.positions.front() else {
            return false;
        };
        !state.target.is_on_ground() && next.is_on_ground() && state.vsi_ft() < -self.model.vsi_stable
    }

    /// Touch down at the current sink rate ahead of the next ground position.
    ///
    /// If the touch-down is too close to the target or to the next position,
    /// the next position becomes the touch-down. Runway positions after the
    /// touch-down are thinned out to the last one so the roll-out can
    /// decelerate over the full distance.
    fn synthesize_touch_down(&mut self, ctx: &TrackContext<'_>, state: &AirframeState) -> Result<(), TrackError> {
        let config = ctx.config;
        let target = &state.target;
        let Some(next) = self.positions.front() else {
            return Ok(());
        };

        let sink = nan_if_none(target.alt_m) - nan_if_none(next.alt_m);
        let time_to_touch_down = sink / -state.vsi_m_s;
        let touch_down_ts = target.ts + time_to_touch_down;

        // without forward speed there is nowhere to move the touch-down to
        if state.speed_m_s > 0.0
            && time_to_touch_down > config.time_required_pos_secs
            && touch_down_ts + config.time_required_pos_secs < next.ts
        {
            let vec = Vector::new(
                target.angle_to(next),
                time_to_touch_down * state.speed_m_s,
                state.vsi_m_s,
                state.speed_m_s,
            );
            let mut touch_down = target.plus(&vec);
            touch_down.flags.ground = GroundStatus::On;
            touch_down.flags.phase = FlightPhase::TouchDown;
            // terrain altitude is set when the renderer fetches it
            touch_down.alt_m = None;
            debug!(key = %self.key, pos = %touch_down, "Added touch-down position");
            self.positions.push_front(touch_down);

            if config.snap_taxi_dist_m > 0.0 {
                let mut idx = 0;
                ctx.airports
                    .snap(&mut self.positions, &mut idx, config.snap_taxi_dist_m, false);
            }
        } else if let Some(next) = self.positions.front_mut() {
            next.flags.phase = FlightPhase::TouchDown;
            debug!(key = %self.key, pos = %next, "Next position declared touch-down");
        }

        while self.positions.len() > 2
            && self.positions[1].is_on_ground()
            && self.positions[1].flags.special == SpecialPos::Runway
            && self.positions[2].flags.special == SpecialPos::Runway
        {
            self.positions.remove(1);
        }

        self.cleanse(ctx)?;
        Ok(())
    }

    /// Find the lift-off between a ground position and the airborne one
    /// after it, looking ahead up to the take-off look-ahead.
    ///
    /// The climb after the airborne position is extended backwards down to
    /// the ground. Positions before lift-off are kept on the ground, and
    /// positions between lift-off and the airborne one are removed.
    fn synthesize_lift_off(
        &mut self,
        ctx: &TrackContext<'_>,
        state: &AirframeState,
        sim_time: f64,
    ) -> Result<bool, TrackError> {
        let config = ctx.config;
        let mut i = 0;
        while self.rotate_ts.is_none() && i < self.positions.len() {
            let ppos = if i == 0 {
                &state.present
            } else {
                &self.positions[i - 1]
            };
            let to = &self.positions[i];

            if ppos.ts > sim_time + config.takeoff_lookahead_secs {
                break;
            }
            if !ppos.is_on_ground() || to.is_on_ground() {
                i += 1;
                continue;
            }

            let vec = ppos.between(to);
            let (climb_vsi, climb_speed) = match self.positions.get(i + 1) {
                Some(after) => {
                    let climb = to.between(after);
                    (climb.vsi, climb.speed)
                }
                None => (
                    self.model.vsi_init_climb * MS_PER_FTM,
                    self.model.speed_init_climb / KT_PER_M_PER_S,
                ),
            };

            let height = nan_if_none(to.alt_m) - nan_if_none(ppos.alt_m);
            let climb_secs = height / climb_vsi;
            let take_off_ts = to.ts - climb_secs;
            if !(state.target.ts < take_off_ts) {
                i += 1;
                continue;
            }

            let to_ts = to.ts;
            let mut take_off = to.plus(&Vector::new(
                (vec.angle + 180.0) % 360.0,
                climb_speed * climb_secs,
                -climb_vsi,
                climb_speed,
            ));
            take_off.flags.ground = GroundStatus::On;
            take_off.flags.phase = FlightPhase::LiftOff;
            take_off.alt_m = None;
            take_off.heading = Some(vec.angle);
            take_off.ts = take_off_ts;

            self.rotate_ts = Some(take_off_ts - self.model.rotate_time);
            self.insert_take_off(take_off.clone(), to_ts);
            debug!(key = %self.key, pos = %take_off, "Added lift-off position");

            self.cleanse(ctx)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Insert the lift-off position in time order.
    ///
    /// Before it, only the first runway position survives and everything is
    /// put on the ground. After it, positions up to the first airborne one
    /// (at `airborne_ts`) are removed.
    fn insert_take_off(&mut self, take_off: Position, airborne_ts: f64) {
        let take_off_ts = take_off.ts;
        let mut seen_runway = false;
        let mut j = 0;
        while j < self.positions.len() && self.positions[j].ts < take_off_ts {
            if self.positions[j].flags.special == SpecialPos::Runway {
                if seen_runway {
                    self.positions.remove(j);
                    continue;
                }
                seen_runway = true;
            }

            let p = &mut self.positions[j];
            if !p.is_on_ground() {
                p.flags.ground = GroundStatus::On;
                p.alt_m = None;
            }
            j += 1;
        }

        if j == self.positions.len() {
            self.positions.push_back(take_off);
            return;
        }

        self.positions.insert(j, take_off);
        self.positions
            .retain(|p| p.ts <= take_off_ts + 0.001 || p.ts >= airborne_ts);
    }
}
