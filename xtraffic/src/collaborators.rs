//! Interfaces to the world outside the pipeline.
//!
//! The pipeline never talks to a network, a renderer, a terrain mesh or an
//! airport database directly. It depends on the traits in this module; the
//! embedding application implements them.
//!
//! | Trait | Called from | Purpose |
//! |-------|-------------|---------|
//! | [`TerrainProbe`] | render thread only | terrain altitude below a point |
//! | [`AirportNetwork`] | worker and render thread | runway lookup, taxiway snapping |
//! | [`Channel`] | any thread | identity and policy of a data source |
//! | [`PositionSource`], [`AttributeSource`] | producer threads | raw reports |
//! | [`AirframeFactory`], [`Airframe`] | render thread | renderable instances |

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error::AirframeError;
use crate::flight_model::FlightModel;
use crate::geo::{Position, KT_PER_M_PER_S, MS_PER_FTM};
use crate::phase::FlightPhase;
use crate::registry::Feed;
use crate::track::{DynamicData, StaticData, TrackKey};

// ─────────────────────────────────────────────────────────────────────────────
// Terrain and airports
// ─────────────────────────────────────────────────────────────────────────────

/// Terrain altitude lookup.
///
/// Only legal on the render thread, which is why the trait is not `Sync`
/// and the registry only ever borrows it for the duration of a call.
pub trait TerrainProbe {
    /// Terrain altitude in meters at the given point, if known.
    fn terrain_alt_m(&self, pos: &Position) -> Option<f64>;
}

/// Airport and taxiway database.
pub trait AirportNetwork: Send + Sync {
    /// Find the runway a vehicle at `from` moving at `speed_m_s` is likely
    /// to land on.
    ///
    /// Returns the touch-down point with the runway heading as its heading,
    /// a timestamp of the expected arrival and the runway altitude.
    fn find_runway(&self, model: &FlightModel, from: &Position, speed_m_s: f64)
        -> Option<Position>;

    /// Snap `buffer[*idx]` onto the nearest taxiway or runway within
    /// `max_dist_m`.
    ///
    /// With `insert_turns` set the implementation may insert intermediate
    /// positions at taxiway nodes; it must keep the buffer time-ordered and
    /// move `*idx` to keep pointing at the snapped position. Returns whether
    /// anything changed.
    fn snap(
        &self,
        buffer: &mut VecDeque<Position>,
        idx: &mut usize,
        max_dist_m: f64,
        insert_turns: bool,
    ) -> bool;
}

/// Airport network without any airports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAirports;

impl AirportNetwork for NoAirports {
    fn find_runway(&self, _: &FlightModel, _: &Position, _: f64) -> Option<Position> {
        None
    }

    fn snap(&self, _: &mut VecDeque<Position>, _: &mut usize, _: f64, _: bool) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Time windows for timestamp smoothing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingRanges {
    pub ground_secs: f64,
    pub airborne_secs: f64,
}

/// A data source with a fixed priority.
pub trait Channel: Send + Sync {
    /// Unique id of the channel.
    fn id(&self) -> u32;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Relative priority; numerically higher wins.
    fn priority(&self) -> i32;

    /// Smoothing windows if the channel's timestamps are unreliable.
    fn smoothing(&self) -> Option<SmoothingRanges> {
        None
    }

    /// Whether the channel delivers predicted positions hovering along the
    /// runway that should be removed.
    fn hover_detection(&self) -> bool {
        false
    }
}

/// Shared reference to a channel.
pub type ChannelRef = Arc<dyn Channel>;

/// Compare two channels by identity.
pub fn same_channel(a: &ChannelRef, b: &ChannelRef) -> bool {
    a.id() == b.id()
}

/// A position plus the dynamic data it came with.
#[derive(Debug, Clone)]
pub struct PositionReport {
    pub key: TrackKey,
    pub dynamic: DynamicData,
    pub position: Option<Position>,
}

/// A fragment of static attributes.
#[derive(Debug, Clone)]
pub struct AttributeReport {
    pub key: TrackKey,
    pub statics: StaticData,
}

/// A channel adapter producing positions.
pub trait PositionSource: Send {
    /// Drain the reports received since the last call.
    fn fetch_positions(&mut self) -> Vec<PositionReport>;
}

/// A channel adapter producing static attribute fragments.
pub trait AttributeSource: Send {
    /// Drain the fragments received since the last call.
    fn fetch_attributes(&mut self) -> Vec<AttributeReport>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Renderable instances
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of a renderable instance, as far as the pipeline needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct AirframeState {
    /// Position the instance currently flies to.
    pub target: Position,
    /// Present position.
    pub present: Position,
    /// Direction of movement in degrees.
    pub track: f64,
    /// Vertical speed in m/s.
    pub vsi_m_s: f64,
    /// Ground speed in m/s.
    pub speed_m_s: f64,
    pub on_ground: bool,
    pub phase: FlightPhase,
    /// Terrain altitude below the present position, in meters.
    pub terrain_alt_m: Option<f64>,
    /// Distance to the viewer in meters.
    pub view_distance_m: f64,
    /// Cleared when the instance failed and must be destroyed.
    pub valid: bool,
}

impl AirframeState {
    /// Vertical speed in ft/min.
    pub fn vsi_ft(&self) -> f64 {
        self.vsi_m_s / MS_PER_FTM
    }

    /// Ground speed in knots.
    pub fn speed_kt(&self) -> f64 {
        self.speed_m_s * KT_PER_M_PER_S
    }
}

/// A renderable instance of a track.
pub trait Airframe: Send {
    /// Move to `sim_time`, fetching positions through `feed` as needed.
    fn advance(&mut self, sim_time: f64, feed: &Feed<'_>);

    /// Current state.
    fn state(&self) -> AirframeState;

    /// Called when the pipeline gives up on the track.
    fn invalidate(&mut self) {}
}

/// Everything needed to create an instance.
#[derive(Debug, Clone)]
pub struct AirframeSeed {
    pub key: TrackKey,
    /// Position at or before the creation time.
    pub from: Position,
    /// Position after the creation time.
    pub to: Position,
    pub statics: StaticData,
    pub model: Arc<FlightModel>,
    pub sim_time: f64,
}

/// Creates renderable instances.
pub trait AirframeFactory: Send + Sync {
    fn create(&self, seed: AirframeSeed) -> Result<Box<dyn Airframe>, AirframeError>;
}

impl fmt::Debug for dyn Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestChannel(u32);

    impl Channel for TestChannel {
        fn id(&self) -> u32 {
            self.0
        }
        fn name(&self) -> &str {
            "test"
        }
        fn priority(&self) -> i32 {
            self.0 as i32
        }
    }

    #[test]
    fn test_channel_defaults() {
        let c: ChannelRef = Arc::new(TestChannel(3));
        assert!(c.smoothing().is_none());
        assert!(!c.hover_detection());
        assert!(same_channel(&c, &(Arc::new(TestChannel(3)) as ChannelRef)));
        assert!(format!("{:?}", c).contains("priority: 3"));
    }

    #[test]
    fn test_no_airports() {
        let mut buf = VecDeque::from(vec![Position::new(0.0, 0.0, Some(0.0), 0.0)]);
        let mut idx = 0;
        assert!(!NoAirports.snap(&mut buf, &mut idx, 15.0, true));
        assert!(NoAirports
            .find_runway(&FlightModel::default(), &buf[0], 60.0)
            .is_none());
    }
}
