//! Channel arbitration of dynamic data.
//!
//! Channels are not in sync with each other; mixing their data makes
//! vehicles jump. A track therefore belongs to one channel at a time and
//! only changes hands under the rules in [`Track::add_dynamic`].

use tracing::debug;

use super::{DynamicData, Track};
use crate::config::PipelineConfig;
use crate::geo::Position;

/// Result of offering a dynamic snapshot to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicOutcome {
    /// Accepted. `switched` is set if the track changed channel,
    /// `position_queued` if the accompanying position was queued.
    Accepted { switched: bool, position_queued: bool },
    /// Another channel with at least the same priority owns the track.
    LowerPriority,
    /// The owning channel is still alive.
    ChannelActive,
    /// The switch position does not continue the track plausibly.
    Discontinuous,
}

impl DynamicOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DynamicOutcome::Accepted { .. })
    }
}

impl Track {
    /// Offer a dynamic snapshot and its position.
    ///
    /// If the snapshot comes from a channel other than the one owning the
    /// track:
    /// - without an instance the channel with the higher or equal priority
    ///   wins and all data of the losing channel is discarded,
    /// - with an instance the switch needs a position that would otherwise
    ///   arrive too late to keep the track alive, and that continues the
    ///   track plausibly.
    pub fn add_dynamic(
        &mut self,
        dynamic: DynamicData,
        position: Option<Position>,
        config: &PipelineConfig,
    ) -> DynamicOutcome {
        let mut switched = false;

        let owner = self.dynamics.back().and_then(|d| d.channel.clone());
        if let (Some(owner), Some(incoming)) = (owner, dynamic.channel.as_ref()) {
            if owner.id() != incoming.id() {
                if self.instance.is_none() {
                    if incoming.priority() < owner.priority() {
                        return DynamicOutcome::LowerPriority;
                    }
                    self.dynamics.clear();
                    self.positions.clear();
                } else {
                    let Some(pos) = position.as_ref() else {
                        return DynamicOutcome::ChannelActive;
                    };
                    let last = match (self.positions.back(), self.instance_target()) {
                        (Some(back), _) => back,
                        (None, Some(target)) => target,
                        (None, None) => return DynamicOutcome::ChannelActive,
                    };
                    if pos.ts + config.refresh_interval_secs <= last.ts + config.outdated_interval_secs {
                        return DynamicOutcome::ChannelActive;
                    }
                    if let Err(why) = self.is_pos_ok(config, last, pos, last.heading) {
                        debug!(key = %self.key, reason = %why, "Channel switch position implausible");
                        return DynamicOutcome::Discontinuous;
                    }
                }
                debug!(
                    key = %self.key,
                    from = owner.name(),
                    to = incoming.name(),
                    "Channel switch"
                );
                switched = true;
            }
        }

        let newer = self.dynamics.front().map_or(true, |front| front.ts < dynamic.ts);
        if newer
            && !self
                .dynamics
                .iter()
                .any(|d| d.is_similar(&dynamic, config.similar_ts_secs))
        {
            let idx = self
                .dynamics
                .iter()
                .position(|d| d.ts > dynamic.ts)
                .unwrap_or(self.dynamics.len());
            self.dynamics.insert(idx, dynamic);
        }

        let position_queued = match position {
            Some(pos) => self.add_raw_position(pos, config),
            None => false,
        };

        DynamicOutcome::Accepted {
            switched,
            position_queued,
        }
    }

    /// Drop dynamic snapshots that lie entirely in the past: keep the last
    /// one at or before `sim_time` as the current one.
    pub(crate) fn trim_dynamics(&mut self, sim_time: f64) {
        while self.dynamics.len() >= 2 && self.dynamics[1].ts <= sim_time {
            self.dynamics.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use super::*;
    use crate::collaborators::{Channel, ChannelRef};

    struct Prio(u32, i32);

    impl Channel for Prio {
        fn id(&self) -> u32 {
            self.0
        }
        fn name(&self) -> &str {
            "prio"
        }
        fn priority(&self) -> i32 {
            self.1
        }
    }

    fn dyn_from(channel: &ChannelRef, ts: f64) -> DynamicData {
        DynamicData {
            ts,
            channel: Some(Arc::clone(channel)),
            ..Default::default()
        }
    }

    fn empty_track(config: &PipelineConfig) -> Track {
        let mut t = track(config);
        t.dynamics.clear();
        t
    }

    #[test]
    fn test_lower_priority_rejected_without_instance() {
        let config = PipelineConfig::default();
        let high: ChannelRef = Arc::new(Prio(1, 10));
        let low: ChannelRef = Arc::new(Prio(2, 5));
        let mut t = empty_track(&config);

        let out = t.add_dynamic(dyn_from(&high, 10.0), Some(air(0.0, 0.0, 5000.0, 10.0)), &config);
        assert!(out.is_accepted());
        let out = t.add_dynamic(dyn_from(&low, 11.0), Some(air(0.0, 0.1, 5000.0, 11.0)), &config);
        assert_eq!(out, DynamicOutcome::LowerPriority);
        assert_eq!(t.dynamics().len(), 1);
        assert_eq!(t.incoming_len(), 1);
    }

    #[test]
    fn test_higher_priority_takes_over() {
        let config = PipelineConfig::default();
        let high: ChannelRef = Arc::new(Prio(1, 10));
        let low: ChannelRef = Arc::new(Prio(2, 5));
        let mut t = empty_track(&config);

        t.add_dynamic(dyn_from(&low, 10.0), None, &config);
        t.positions.push_back(air(0.0, 0.0, 5000.0, 10.0));
        let out = t.add_dynamic(dyn_from(&high, 20.0), None, &config);
        assert_eq!(
            out,
            DynamicOutcome::Accepted {
                switched: true,
                position_queued: false
            }
        );
        assert!(t.is_empty());
        assert_eq!(t.current_channel().map(|c| c.id()), Some(1));
    }

    #[test]
    fn test_switch_with_instance_needs_stale_owner() {
        let config = PipelineConfig::default();
        let a: ChannelRef = Arc::new(Prio(1, 10));
        let b: ChannelRef = Arc::new(Prio(2, 1));
        let mut t = empty_track(&config);
        t.add_dynamic(dyn_from(&a, 100.0), None, &config);
        attach_instance(&mut t, state_at(air(0.0, 0.0, 5000.0, 100.0).heading(90.0), 90.0, 0.0, 110.0));

        // close in time: owner still alive
        let soon = air(0.0, 0.01, 5000.0, 110.0);
        assert_eq!(
            t.add_dynamic(dyn_from(&b, 110.0), Some(soon), &config),
            DynamicOutcome::ChannelActive
        );

        // late, but turning back
        let back = air(0.0, -0.03, 5000.0, 131.0);
        assert_eq!(
            t.add_dynamic(dyn_from(&b, 131.0), Some(back), &config),
            DynamicOutcome::Discontinuous
        );

        // late and continuing east at about 200 kn
        let ahead = air(0.0, 0.032, 5000.0, 131.0);
        assert!(t.add_dynamic(dyn_from(&b, 131.0), Some(ahead), &config).is_accepted());
        assert_eq!(t.incoming_len(), 1);
    }

    #[test]
    fn test_dynamics_sorted_and_deduplicated() {
        let config = PipelineConfig::default();
        let a: ChannelRef = Arc::new(Prio(1, 10));
        let mut t = empty_track(&config);
        t.add_dynamic(dyn_from(&a, 10.0), None, &config);
        t.add_dynamic(dyn_from(&a, 30.0), None, &config);
        t.add_dynamic(dyn_from(&a, 20.0), None, &config);
        t.add_dynamic(dyn_from(&a, 21.0), None, &config);
        // older than the current snapshot
        t.add_dynamic(dyn_from(&a, 5.0), None, &config);
        let ts: Vec<f64> = t.dynamics().iter().map(|d| d.ts).collect();
        assert_eq!(ts, vec![10.0, 20.0, 30.0]);

        t.trim_dynamics(25.0);
        assert_eq!(t.current_dynamic().map(|d| d.ts), Some(20.0));
    }
}
