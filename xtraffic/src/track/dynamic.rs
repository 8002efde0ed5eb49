//! Dynamic attribute snapshots.

use std::collections::VecDeque;

use crate::collaborators::ChannelRef;

/// Attributes that change during a flight, as reported by one channel at
/// one point in time.
#[derive(Debug, Clone, Default)]
pub struct DynamicData {
    /// Transponder code.
    pub squawk: Option<u32>,
    pub on_ground: bool,
    /// Reported heading in degrees.
    pub heading: Option<f64>,
    /// Reported ground speed in knots.
    pub speed_kt: Option<f64>,
    /// Reported vertical speed in ft/min.
    pub vsi_ft: Option<f64>,
    /// Timestamp in seconds.
    pub ts: f64,
    /// Producing channel.
    pub channel: Option<ChannelRef>,
}

impl DynamicData {
    /// Formatted transponder code, `-` if none.
    pub fn squawk_str(&self) -> String {
        match self.squawk {
            Some(code) if (1..=9999).contains(&code) => format!("{:04}", code),
            _ => "-".to_string(),
        }
    }

    /// Timestamps closer than `tolerance`.
    pub fn is_similar(&self, other: &DynamicData, tolerance: f64) -> bool {
        (self.ts - other.ts).abs() < tolerance
    }

    /// Id of the producing channel.
    pub fn channel_id(&self) -> Option<u32> {
        self.channel.as_ref().map(|c| c.id())
    }
}

/// Snapshots around a timestamp: the last one at or before it and the first
/// one after it.
#[derive(Debug, Default)]
pub struct Adjacent<'a> {
    pub before: Option<&'a DynamicData>,
    pub after: Option<&'a DynamicData>,
}

/// Find the snapshots around `ts` in a time-ordered sequence.
pub fn find_adjacent(list: &VecDeque<DynamicData>, ts: f64) -> Adjacent<'_> {
    let mut adj = Adjacent::default();
    for d in list {
        if d.ts <= ts {
            adj.before = Some(d);
        } else {
            adj.after = Some(d);
            break;
        }
    }
    adj
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dyn_at(ts: f64, heading: f64) -> DynamicData {
        DynamicData {
            ts,
            heading: Some(heading),
            ..Default::default()
        }
    }

    #[test]
    fn test_squawk_formatting() {
        let mut d = DynamicData::default();
        assert_eq!(d.squawk_str(), "-");
        d.squawk = Some(7);
        assert_eq!(d.squawk_str(), "0007");
        d.squawk = Some(7000);
        assert_eq!(d.squawk_str(), "7000");
        d.squawk = Some(10000);
        assert_eq!(d.squawk_str(), "-");
        d.squawk = Some(0);
        assert_eq!(d.squawk_str(), "-");
    }

    #[test]
    fn test_similarity_is_exclusive() {
        let a = dyn_at(10.0, 0.0);
        assert!(a.is_similar(&dyn_at(12.9, 0.0), 3.0));
        assert!(!a.is_similar(&dyn_at(13.0, 0.0), 3.0));
    }

    #[test]
    fn test_find_adjacent() {
        let list: VecDeque<_> = vec![dyn_at(10.0, 1.0), dyn_at(20.0, 2.0), dyn_at(30.0, 3.0)].into();
        let adj = find_adjacent(&list, 25.0);
        assert_eq!(adj.before.map(|d| d.ts), Some(20.0));
        assert_eq!(adj.after.map(|d| d.ts), Some(30.0));

        let adj = find_adjacent(&list, 5.0);
        assert!(adj.before.is_none());
        assert_eq!(adj.after.map(|d| d.ts), Some(10.0));

        let adj = find_adjacent(&list, 30.0);
        assert_eq!(adj.before.map(|d| d.ts), Some(30.0));
        assert!(adj.after.is_none());
    }
}
