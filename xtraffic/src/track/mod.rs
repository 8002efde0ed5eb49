//! Per-vehicle track state.
//!
//! A [`Track`] owns everything known about one vehicle: the cleansed
//! position buffer the renderer consumes, an incoming queue of raw
//! positions not yet integrated, the dynamic attribute snapshots, the
//! static attributes, and (once rendering started) the renderable
//! instance.
//!
//! The algorithms working on a track are split by concern:
//!
//! | Module | Work |
//! |--------|------|
//! | `ingest` | raw position queue, ground status, merge and insert |
//! | `heading` | heading recompute and the kinematic plausibility check |
//! | `cleansing` | glide-slope clamp, implausible-point sweep, hover removal |
//! | `smoothing` | timestamp smoothing for channels with unreliable clocks |
//! | `synthesis` | the recompute entry point, take-off, landing and stops |
//! | `arbitration` | channel switching of dynamic data |
//!
//! A `Track` is not synchronized itself. The registry wraps each one in a
//! per-track lock (see [`crate::registry`]).

mod arbitration;
mod cleansing;
mod dynamic;
mod heading;
mod ingest;
mod key;
mod smoothing;
mod statics;
mod synthesis;

pub use arbitration::DynamicOutcome;
pub use dynamic::{find_adjacent, Adjacent, DynamicData};
pub use heading::{check_leg, Implausible};
pub use ingest::{derive_ground_status, InsertOutcome};
pub use key::{KeyError, KeyType, TrackKey};
pub use statics::{MergeOutcome, StaticData};

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collaborators::{Airframe, AirframeState, AirportNetwork, ChannelRef};
use crate::config::PipelineConfig;
use crate::flight_model::{FlightModel, FlightModelCatalog, CAR_TYPE};
use crate::geo::{positions_to_string, Position};

/// Shared, read-only inputs of the track algorithms.
#[derive(Clone, Copy)]
pub struct TrackContext<'a> {
    pub config: &'a PipelineConfig,
    pub airports: &'a dyn AirportNetwork,
}

impl<'a> TrackContext<'a> {
    pub fn new(config: &'a PipelineConfig, airports: &'a dyn AirportNetwork) -> Self {
        Self { config, airports }
    }
}

/// The renderable instance of a track plus its last published state.
pub struct Instance {
    /// Taken out while the instance advances, so it can call back into the
    /// track without holding a borrow.
    pub(crate) airframe: Option<Box<dyn Airframe>>,
    pub(crate) state: AirframeState,
}

impl Instance {
    pub(crate) fn new(airframe: Box<dyn Airframe>) -> Self {
        let state = airframe.state();
        Self {
            airframe: Some(airframe),
            state,
        }
    }

    /// Last published state.
    pub fn state(&self) -> &AirframeState {
        &self.state
    }

    pub(crate) fn refresh_state(&mut self) {
        if let Some(airframe) = &self.airframe {
            self.state = airframe.state();
        }
    }

    pub(crate) fn invalidate(&mut self) {
        if let Some(airframe) = &mut self.airframe {
            airframe.invalidate();
        }
        self.state.valid = false;
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.state)
            .field("advancing", &self.airframe.is_none())
            .finish()
    }
}

/// Everything known about one vehicle.
#[derive(Debug)]
pub struct Track {
    pub(crate) key: TrackKey,
    /// Cleansed positions, strictly time-ordered, ready for the renderer.
    pub(crate) positions: VecDeque<Position>,
    /// Raw positions waiting for ground status and integration.
    pub(crate) incoming: VecDeque<Position>,
    /// Dynamic snapshots, time-ordered; the front one is current.
    pub(crate) dynamics: VecDeque<DynamicData>,
    pub(crate) statics: StaticData,
    pub(crate) model: Arc<FlightModel>,
    /// Planned start of the rotation before lift-off.
    pub(crate) rotate_ts: Option<f64>,
    /// Timestamp of the youngest position seen.
    pub(crate) youngest_ts: f64,
    /// Touch-down point of the runway the vehicle is heading for.
    pub(crate) runway: Option<Position>,
    pub(crate) instance: Option<Instance>,
    pub(crate) valid: bool,
}

impl Track {
    /// Create an empty track at `sim_time`.
    ///
    /// The youngest timestamp starts in the future so the fresh track is not
    /// considered outdated before its first positions arrive.
    pub fn new(key: TrackKey, sim_time: f64, config: &PipelineConfig, model: Arc<FlightModel>) -> Self {
        Self {
            key,
            positions: VecDeque::new(),
            incoming: VecDeque::new(),
            dynamics: VecDeque::new(),
            statics: StaticData::default(),
            model,
            rotate_ts: None,
            youngest_ts: sim_time + 2.0 * config.outdated_interval_secs,
            runway: None,
            instance: None,
            valid: true,
        }
    }

    pub fn key(&self) -> TrackKey {
        self.key
    }

    pub fn positions(&self) -> &VecDeque<Position> {
        &self.positions
    }

    /// Number of buffered positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of raw positions waiting for integration.
    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    pub fn statics(&self) -> &StaticData {
        &self.statics
    }

    pub fn dynamics(&self) -> &VecDeque<DynamicData> {
        &self.dynamics
    }

    pub fn model(&self) -> &Arc<FlightModel> {
        &self.model
    }

    pub fn rotate_ts(&self) -> Option<f64> {
        self.rotate_ts
    }

    pub fn youngest_ts(&self) -> f64 {
        self.youngest_ts
    }

    pub fn runway(&self) -> Option<&Position> {
        self.runway.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// State of the renderable instance, if any.
    pub fn instance_state(&self) -> Option<&AirframeState> {
        self.instance.as_ref().map(Instance::state)
    }

    /// Position the instance currently flies to.
    pub(crate) fn instance_target(&self) -> Option<&Position> {
        self.instance_state().map(|s| &s.target)
    }

    /// Mark the track invalid. The instance, if any, is invalidated too;
    /// the next maintenance sweep removes both.
    pub fn set_invalid(&mut self) {
        if self.valid {
            warn!(key = %self.key, "Track invalidated");
        }
        self.valid = false;
        if let Some(instance) = &mut self.instance {
            instance.invalidate();
        }
    }

    /// Drop the renderable instance. Buffered data is kept, so a new
    /// instance can be created later.
    pub(crate) fn destroy_instance(&mut self) -> bool {
        if self.instance.take().is_some() {
            debug!(key = %self.key, "Instance destroyed");
            true
        } else {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Attributes
    // ─────────────────────────────────────────────────────────────────────

    /// Merge a static attribute fragment.
    ///
    /// If the fragment changed the type designator the flight model is
    /// looked up again.
    pub fn merge_statics(&mut self, fragment: &StaticData, models: &FlightModelCatalog) -> MergeOutcome {
        let old_type = self.statics.type_designator.clone();
        let outcome = self.statics.merge(fragment, CAR_TYPE);
        if self.statics.type_designator != old_type {
            self.model = models.find(&self.statics.type_designator);
            debug!(
                key = %self.key,
                type_designator = %self.statics.type_designator,
                model = %self.model.name,
                "Flight model assigned"
            );
        }
        outcome
    }

    /// The current dynamic snapshot.
    pub fn current_dynamic(&self) -> Option<&DynamicData> {
        self.dynamics.front()
    }

    /// The youngest dynamic snapshot.
    pub fn last_dynamic(&self) -> Option<&DynamicData> {
        self.dynamics.back()
    }

    /// Channel owning the track.
    pub fn current_channel(&self) -> Option<&ChannelRef> {
        self.dynamics.front().and_then(|d| d.channel.as_ref())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Whether an instance could be created at `sim_time`: the first two
    /// positions straddle it.
    pub fn valid_for_instance(&self, sim_time: f64) -> bool {
        if self.key.is_empty() || self.dynamics.is_empty() || self.positions.len() < 2 {
            return false;
        }
        self.positions[0].ts <= sim_time && sim_time < self.positions[1].ts
    }

    /// Whether the track should be removed.
    pub fn is_outdated(&self, sim_time: f64, config: &PipelineConfig) -> bool {
        if let Some(state) = self.instance_state() {
            if !state.valid || state.view_distance_m > config.max_distance_m() {
                return true;
            }
            // keep a landing alive until the vehicle stopped
            if state.phase.is_completing_landing() {
                return false;
            }
        }
        self.positions.is_empty() && self.youngest_ts + config.outdated_interval_secs < sim_time
    }

    /// Whether the buffer is time-ordered. Returns the first offending
    /// timestamp otherwise; a NaN timestamp is never in order.
    pub(crate) fn first_unsorted(&self) -> Option<f64> {
        self.positions
            .iter()
            .zip(self.positions.iter().skip(1))
            .find(|(a, b)| !matches!(a.ts.partial_cmp(&b.ts), Some(Ordering::Less | Ordering::Equal)))
            .map(|(_, b)| b.ts)
    }

    /// Multi-line dump of the buffer for debug logs.
    pub fn dump(&self) -> String {
        let mut out = format!("{} ({} positions)\n", self.key, self.positions.len());
        if let Some(target) = self.instance_target() {
            out.push_str("target: ");
            out.push_str(&target.to_string());
            out.push('\n');
        }
        out.push_str(&positions_to_string(&self.positions));
        out
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders shared by the track algorithm tests.

    use super::*;
    use crate::collaborators::{AirframeState, NoAirports};
    use crate::geo::GroundStatus;
    use crate::phase::FlightPhase;

    pub static NO_AIRPORTS: NoAirports = NoAirports;

    pub fn key() -> TrackKey {
        TrackKey::icao(0x3c6444).unwrap()
    }

    pub fn track(config: &PipelineConfig) -> Track {
        let mut t = Track::new(key(), 0.0, config, Arc::new(FlightModel::default()));
        t.dynamics.push_back(DynamicData::default());
        t
    }

    pub fn air(lat: f64, lon: f64, alt_ft: f64, ts: f64) -> Position {
        Position::with_alt_ft(lat, lon, alt_ft, ts).ground(GroundStatus::Off)
    }

    pub fn gnd(lat: f64, lon: f64, ts: f64) -> Position {
        Position::new(lat, lon, Some(0.0), ts).ground(GroundStatus::On)
    }

    /// A frozen instance whose target is `target`.
    pub struct FrozenAirframe(pub AirframeState);

    impl Airframe for FrozenAirframe {
        fn advance(&mut self, _: f64, _: &crate::registry::Feed<'_>) {}
        fn state(&self) -> AirframeState {
            self.0.clone()
        }
    }

    pub fn state_at(target: Position, track: f64, vsi_m_s: f64, speed_m_s: f64) -> AirframeState {
        AirframeState {
            on_ground: target.is_on_ground(),
            present: target.clone(),
            target,
            track,
            vsi_m_s,
            speed_m_s,
            phase: FlightPhase::Unknown,
            terrain_alt_m: Some(0.0),
            view_distance_m: 1000.0,
            valid: true,
        }
    }

    pub fn attach_instance(track: &mut Track, state: AirframeState) {
        track.instance = Some(Instance::new(Box::new(FrozenAirframe(state))));
    }

    /// Airport network with a single runway touch-down point.
    pub struct FixedRunway(pub Position);

    impl AirportNetwork for FixedRunway {
        fn find_runway(&self, _: &FlightModel, from: &Position, speed_m_s: f64) -> Option<Position> {
            let mut rwy = self.0.clone();
            rwy.ts = from.ts + from.dist_to(&rwy) / speed_m_s;
            Some(rwy)
        }

        fn snap(&self, _: &mut VecDeque<Position>, _: &mut usize, _: f64, _: bool) -> bool {
            false
        }
    }

    pub fn assert_sorted(track: &Track) {
        assert!(
            track.first_unsorted().is_none(),
            "buffer not sorted:\n{}",
            track.dump()
        );
    }
}
