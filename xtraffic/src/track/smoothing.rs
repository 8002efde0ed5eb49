//! Timestamp smoothing.
//!
//! Some channels do not transmit when a position was measured, only when
//! it was received, so their timestamps jitter by several seconds. Distance
//! between positions is reliable though. Smoothing keeps the positions and
//! redistributes the timestamps of a leading window so the speed stays
//! constant across it.

use super::Track;

impl Track {
    /// Smooth the timestamps of the leading window of positions.
    ///
    /// The window starts at the front and extends as long as the positions
    /// stay within the channel's time range, share the front's ground
    /// status and carry no flight phase. Returns whether anything changed.
    pub(crate) fn smooth(&mut self) -> bool {
        let Some(ranges) = self.current_channel().and_then(|c| c.smoothing()) else {
            return false;
        };
        let Some(first) = self.positions.front() else {
            return false;
        };

        let range = if first.is_on_ground() {
            ranges.ground_secs
        } else {
            ranges.airborne_secs
        };

        let mut last = 1;
        while last < self.positions.len() {
            let p = &self.positions[last];
            if p.ts - first.ts > range || p.flags.ground != first.flags.ground || p.flags.phase.is_known() {
                break;
            }
            last += 1;
        }
        // one too far
        last -= 1;
        if last < 2 {
            return false;
        }

        let dist: f64 = (0..last)
            .map(|i| self.positions[i].dist_to(&self.positions[i + 1]))
            .sum();
        let total_time = self.positions[last].ts - first.ts;
        if total_time < 1.0 {
            return false;
        }
        let speed = dist / total_time;
        if speed < 1.0 {
            return false;
        }

        for i in 1..last {
            let leg = self.positions[i - 1].dist_to(&self.positions[i]);
            self.positions[i].ts = self.positions[i - 1].ts + leg / speed;
        }

        // positions at the same spot now share a timestamp
        let mut i = 1;
        while i < self.positions.len() {
            if self.positions[i - 1].ts == self.positions[i].ts {
                self.positions.remove(i - 1);
            } else {
                i += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use super::*;
    use crate::collaborators::{Channel, ChannelRef, SmoothingRanges};
    use crate::config::PipelineConfig;
    use crate::phase::FlightPhase;
    use crate::track::DynamicData;

    struct Jittery;

    impl Channel for Jittery {
        fn id(&self) -> u32 {
            3
        }
        fn name(&self) -> &str {
            "jittery"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn smoothing(&self) -> Option<SmoothingRanges> {
            Some(SmoothingRanges {
                ground_secs: 20.0,
                airborne_secs: 60.0,
            })
        }
    }

    fn jittery_track() -> Track {
        let config = PipelineConfig::default();
        let mut t = track(&config);
        let channel: ChannelRef = Arc::new(Jittery);
        t.dynamics.clear();
        t.dynamics.push_back(DynamicData {
            channel: Some(channel),
            ..Default::default()
        });
        t
    }

    #[test]
    fn test_constant_speed_after_smoothing() {
        let mut t = jittery_track();
        t.positions.push_back(air(0.0, 0.00, 5000.0, 0.0));
        t.positions.push_back(air(0.0, 0.01, 5000.0, 4.0));
        t.positions.push_back(air(0.0, 0.02, 5000.0, 16.0));
        t.positions.push_back(air(0.0, 0.03, 5000.0, 30.0));

        assert!(t.smooth());
        assert_eq!(t.positions[0].ts, 0.0);
        assert!((t.positions[1].ts - 10.0).abs() < 1e-6);
        assert!((t.positions[2].ts - 20.0).abs() < 1e-6);
        assert_eq!(t.positions[3].ts, 30.0);
    }

    #[test]
    fn test_window_stops_at_phase() {
        let mut t = jittery_track();
        t.positions.push_back(air(0.0, 0.00, 5000.0, 0.0));
        t.positions.push_back(air(0.0, 0.01, 5000.0, 4.0));
        let mut synthetic = air(0.0, 0.02, 5000.0, 16.0);
        synthetic.flags.phase = FlightPhase::Approach;
        t.positions.push_back(synthetic);
        assert!(!t.smooth());
        assert_eq!(t.positions[1].ts, 4.0);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut t = jittery_track();
        t.positions.push_back(gnd(0.0, 0.00, 0.0));
        t.positions.push_back(gnd(0.0, 0.00, 5.0));
        t.positions.push_back(gnd(0.0, 0.001, 10.0));
        assert!(t.smooth());
        assert_eq!(t.len(), 2);
        assert_sorted(&t);
    }

    #[test]
    fn test_no_smoothing_without_opt_in() {
        let config = PipelineConfig::default();
        let mut t = track(&config);
        t.positions.push_back(air(0.0, 0.00, 5000.0, 0.0));
        t.positions.push_back(air(0.0, 0.01, 5000.0, 4.0));
        t.positions.push_back(air(0.0, 0.02, 5000.0, 16.0));
        assert!(!t.smooth());
    }
}
