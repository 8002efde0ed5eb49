//! Removal and correction of implausible buffered positions.

use tracing::debug;

use super::{Track, TrackContext};
use crate::config::PipelineConfig;
use crate::error::TrackError;
use crate::geo::GroundStatus;

impl Track {
    /// Run all cleansing steps over the buffer. Returns whether anything
    /// changed.
    ///
    /// Fails if the next position the instance would fly to cannot be
    /// reached plausibly and nothing else is left to fly to.
    pub(crate) fn cleanse(&mut self, ctx: &TrackContext<'_>) -> Result<bool, TrackError> {
        if self.positions.is_empty() {
            return Ok(false);
        }
        let mut changed = self.keep_above_glide_slope(ctx);
        changed |= self.remove_implausible(ctx.config)?;
        changed |= self.remove_hovering(ctx.config);
        Ok(changed)
    }

    /// Lift positions below the minimum descent line of the runway the
    /// vehicle is likely approaching.
    ///
    /// Only applies while the youngest position is below the altitude and
    /// height ceilings and the vehicle descends considerably.
    fn keep_above_glide_slope(&mut self, ctx: &TrackContext<'_>) -> bool {
        let config = ctx.config;
        let len = self.positions.len();
        if len < 2 {
            return false;
        }

        let last = &self.positions[len - 1];
        let prev = &self.positions[len - 2];
        let Some(last_alt) = last.alt_m else {
            return false;
        };
        if last_alt > config.keep_above_max_alt_m() {
            return false;
        }
        if let Some(terrain) = self.instance_state().and_then(|s| s.terrain_alt_m) {
            if last_alt - terrain >= config.keep_above_max_agl_m() {
                return false;
            }
        }
        if !(prev.vsi_ft_to(last) < -self.model.vsi_stable) {
            return false;
        }

        let Some(rwy) = ctx.airports.find_runway(&self.model, last, prev.speed_to(last)) else {
            return false;
        };
        let Some(rwy_alt) = rwy.alt_m else {
            return false;
        };

        let ratio = config.keep_above_ratio();
        let mut changed = false;
        for pos in self.positions.iter_mut() {
            let Some(alt) = pos.alt_m else {
                continue;
            };
            let dist = pos.dist_planar(&rwy);
            // 0.5 m slack against rounding
            if alt - rwy_alt < dist * ratio - 0.5 {
                pos.alt_m = Some(rwy_alt + dist * ratio);
                pos.flags.ground = GroundStatus::Off;
                changed = true;
                debug!(key = %self.key, ts = pos.ts, old_alt_m = alt, "Lifted onto glide slope");
            }
        }
        self.runway = Some(rwy);
        changed
    }

    /// Sweep the buffer and remove runs of positions that cannot be reached
    /// plausibly from their predecessor.
    ///
    /// With an instance the sweep starts at the instance target, otherwise
    /// at the second buffered position. After an implausible position the
    /// next plausible one is searched and everything in between removed.
    /// If none is found the sweep stops; if the offender is the very next
    /// position of the instance it is dropped, or the track fails if it is
    /// the only one left.
    fn remove_implausible(&mut self, config: &PipelineConfig) -> Result<bool, TrackError> {
        let len = self.positions.len();
        let (mut pos1, mut h1, mut i) = match self.instance_state() {
            Some(state) if len >= 1 => {
                let target = state.target.clone();
                let heading = Some(state.track);
                let mut i = 0;
                // the target may still be our front position
                while i < len && self.positions[i].ts == target.ts {
                    i += 1;
                }
                (target, heading, i)
            }
            None if len >= 3 => {
                let v1 = self.positions[0].between(&self.positions[1]);
                let heading = if v1.dist > config.similar_pos_dist_m {
                    Some(v1.angle)
                } else {
                    self.positions[1].heading
                };
                (self.positions[1].clone(), heading, 2)
            }
            _ => return Ok(false),
        };

        let mut changed = false;
        while i < self.positions.len() {
            let why = match self.is_pos_ok(config, &pos1, &self.positions[i], h1) {
                Ok(angle) => {
                    h1 = Some(angle);
                    pos1 = self.positions[i].clone();
                    i += 1;
                    continue;
                }
                Err(why) => why,
            };

            let next_valid = (i + 1..self.positions.len())
                .find(|&j| self.is_pos_ok(config, &pos1, &self.positions[j], h1).is_ok());

            match next_valid {
                Some(j) => {
                    debug!(
                        key = %self.key,
                        from_ts = self.positions[i].ts,
                        count = j - i,
                        reason = %why,
                        "Implausible positions removed"
                    );
                    self.positions.drain(i..j);
                    changed = true;
                }
                None => {
                    if self.instance.is_some() && i == 0 {
                        let ts = self.positions[0].ts;
                        if self.positions.len() < 2 {
                            debug!(key = %self.key, ts, reason = %why, "No valid continuation for instance");
                            return Err(TrackError::NoContinuation { key: self.key, ts });
                        }
                        self.positions.pop_front();
                        changed = true;
                        debug!(key = %self.key, ts, reason = %why, "Implausible next position dropped");
                    }
                    break;
                }
            }
        }
        Ok(changed)
    }

    /// Remove positions hovering level just above the runway after a
    /// descent.
    ///
    /// Some channels predict positions when coverage ends, which lets
    /// vehicles fly along the runway instead of landing. Only applies to
    /// channels opting in and to instances on approach.
    fn remove_hovering(&mut self, config: &PipelineConfig) -> bool {
        let Some(state) = self.instance_state() else {
            return false;
        };
        if self.positions.is_empty() || !state.phase.is_approaching() {
            return false;
        }
        if !self.current_channel().is_some_and(|c| c.hover_detection()) {
            return false;
        }
        let Some(terrain) = state.terrain_alt_m else {
            return false;
        };
        let max_hover_alt = terrain + config.max_hover_agl_m();
        let vsi_stable = self.model.vsi_stable;
        let mut prev = state.target.clone();

        // follow the descent
        let mut i = 0;
        while i < self.positions.len() {
            let p = &self.positions[i];
            if p.is_on_ground() || !(prev.vsi_ft_to(p) < -vsi_stable) {
                break;
            }
            prev = p.clone();
            i += 1;
        }

        let mut changed = false;
        while i < self.positions.len() {
            let p = &self.positions[i];
            let hovering = !p.is_on_ground()
                && p.alt_m.is_some_and(|alt| alt < max_hover_alt)
                && prev.vsi_ft_to(p).abs() <= vsi_stable;
            if !hovering {
                break;
            }
            debug!(key = %self.key, pos = %p, "Hovering position removed");
            self.positions.remove(i);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use super::*;
    use crate::collaborators::{Channel, ChannelRef};
    use crate::phase::FlightPhase;
    use crate::track::DynamicData;

    struct Hovering;

    impl Channel for Hovering {
        fn id(&self) -> u32 {
            7
        }
        fn name(&self) -> &str {
            "hovering"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn hover_detection(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_sweep_removes_outlier() {
        let config = PipelineConfig::default();
        let ctx = TrackContext::new(&config, &NO_AIRPORTS);
        let mut t = track(&config);
        t.positions.push_back(air(0.0, 0.00, 5000.0, 0.0));
        t.positions.push_back(air(0.0, 0.01, 5000.0, 10.0));
        // jumps 50 km north
        t.positions.push_back(air(0.45, 0.02, 5000.0, 20.0));
        t.positions.push_back(air(0.0, 0.03, 5000.0, 30.0));
        t.positions.push_back(air(0.0, 0.04, 5000.0, 40.0));

        assert!(t.cleanse(&ctx).unwrap());
        let ts: Vec<f64> = t.positions().iter().map(|p| p.ts).collect();
        assert_eq!(ts, vec![0.0, 10.0, 30.0, 40.0]);
    }

    #[test]
    fn test_sweep_needs_three_positions_without_instance() {
        let config = PipelineConfig::default();
        let ctx = TrackContext::new(&config, &NO_AIRPORTS);
        let mut t = track(&config);
        t.positions.push_back(air(0.0, 0.00, 5000.0, 0.0));
        t.positions.push_back(air(0.45, 0.01, 5000.0, 10.0));
        assert!(!t.cleanse(&ctx).unwrap());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_single_unreachable_position_fails_track() {
        let config = PipelineConfig::default();
        let ctx = TrackContext::new(&config, &NO_AIRPORTS);
        let mut t = track(&config);
        attach_instance(&mut t, state_at(air(0.0, 0.0, 5000.0, 0.0), 90.0, 0.0, 110.0));
        t.positions.push_back(air(0.0, -0.01, 5000.0, 10.0));
        assert!(matches!(
            t.cleanse(&ctx),
            Err(TrackError::NoContinuation { .. })
        ));
    }

    #[test]
    fn test_unreachable_front_position_dropped() {
        let config = PipelineConfig::default();
        let ctx = TrackContext::new(&config, &NO_AIRPORTS);
        let mut t = track(&config);
        attach_instance(&mut t, state_at(air(0.0, 0.0, 5000.0, 0.0), 90.0, 0.0, 110.0));
        // both behind the instance
        t.positions.push_back(air(0.0, -0.01, 5000.0, 10.0));
        t.positions.push_back(air(0.0, -0.02, 5000.0, 20.0));
        assert!(t.cleanse(&ctx).unwrap());
        assert_eq!(t.len(), 1);
        assert_eq!(t.positions[0].ts, 20.0);
    }

    #[test]
    fn test_glide_slope_clamp() {
        let config = PipelineConfig::default();
        let rwy = gnd(0.0, 0.1, 0.0).heading(90.0);
        let airports = FixedRunway(rwy);
        let ctx = TrackContext::new(&config, &airports);
        let mut t = track(&config);
        // about 11 km and 5.5 km before the runway, far too low
        t.positions.push_back(air(0.0, 0.0, 1000.0, 0.0));
        t.positions.push_back(air(0.0, 0.05, 300.0, 80.0));

        assert!(t.cleanse(&ctx).unwrap());
        assert!(t.runway().is_some());
        for p in t.positions() {
            let dist = p.dist_planar(&gnd(0.0, 0.1, 0.0));
            let min_alt = dist * config.keep_above_ratio();
            assert!(p.alt_m.unwrap() >= min_alt - 0.5);
            assert_eq!(p.flags.ground, GroundStatus::Off);
        }
    }

    #[test]
    fn test_hover_removal() {
        let config = PipelineConfig::default();
        let ctx = TrackContext::new(&config, &NO_AIRPORTS);
        let mut t = track(&config);
        let hovering: ChannelRef = Arc::new(Hovering);
        t.dynamics.clear();
        t.dynamics.push_back(DynamicData {
            channel: Some(hovering),
            ..Default::default()
        });

        let mut state = state_at(air(0.0, 0.0, 1500.0, 0.0), 90.0, -4.0, 70.0);
        state.phase = FlightPhase::Final;
        attach_instance(&mut t, state);

        // descending at 900 ft/min, then level at 300 ft
        t.positions.push_back(air(0.0, 0.0126, 1200.0, 20.0));
        t.positions.push_back(air(0.0, 0.0504, 300.0, 80.0));
        t.positions.push_back(air(0.0, 0.0630, 300.0, 100.0));
        t.positions.push_back(air(0.0, 0.0756, 300.0, 120.0));

        assert!(t.cleanse(&ctx).unwrap());
        let ts: Vec<f64> = t.positions().iter().map(|p| p.ts).collect();
        assert_eq!(ts, vec![20.0, 80.0]);
    }
}
