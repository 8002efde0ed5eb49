//! Registry of all tracks and the threads working on them.
//!
//! # Threads
//!
//! | Thread | Calls | Lock use |
//! |--------|-------|----------|
//! | producers | [`TrackRegistry::add_dynamic`], [`TrackRegistry::update_statics`] | blocking, brief |
//! | worker | recompute of queued keys | blocking |
//! | render | [`TrackRegistry::frame`] and its parts | try-lock only, except to return an advanced instance |
//!
//! # Lock order
//!
//! The structural lock (the track map) is always taken before a track lock
//! and a track lock is never held while taking the structural lock. No
//! thread holds two track locks at a time.

mod handle;
mod worker;

pub use handle::{Feed, Fetch, FetchedPositions, TrackHandle};
pub use worker::WORKER_THREAD_NAME;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::collaborators::{
    AirframeFactory, AirframeSeed, AirportNetwork, AttributeSource, PositionSource, TerrainProbe,
};
use crate::config::PipelineConfig;
use crate::error::TrackError;
use crate::flight_model::FlightModelCatalog;
use crate::geo::{GroundStatus, Position};
use crate::track::{
    derive_ground_status, DynamicData, DynamicOutcome, Instance, MergeOutcome, StaticData, Track,
    TrackContext, TrackKey,
};
use worker::{RecalcQueue, RecalcWorker};

/// What a maintenance sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub created: usize,
    pub evicted: usize,
    pub removed: usize,
    /// Tracks skipped because their lock was busy.
    pub skipped: usize,
}

/// Per-track decision of a maintenance sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Keep,
    Remove,
    /// Eligible for an instance; distance of its first position to the
    /// viewer.
    WantsInstance(f64),
}

/// State shared between the registry, the worker and advancing instances.
pub(crate) struct RegistryShared {
    config: PipelineConfig,
    tracks: Mutex<BTreeMap<TrackKey, Arc<TrackHandle>>>,
    queue: RecalcQueue,
    airports: Arc<dyn AirportNetwork>,
    models: FlightModelCatalog,
    factory: Arc<dyn AirframeFactory>,
    /// Set when raw positions were queued anywhere since the last
    /// integration pass.
    pending_new: AtomicBool,
    /// Current simulated time as `f64` bits.
    sim_time: AtomicU64,
    too_many_warned_at: Mutex<Option<f64>>,
}

impl RegistryShared {
    fn context(&self) -> TrackContext<'_> {
        TrackContext::new(&self.config, self.airports.as_ref())
    }

    fn sim_time(&self) -> f64 {
        f64::from_bits(self.sim_time.load(Ordering::Relaxed))
    }

    fn set_sim_time(&self, sim_time: f64) {
        self.sim_time.store(sim_time.to_bits(), Ordering::Relaxed);
    }

    fn get(&self, key: &TrackKey) -> Option<Arc<TrackHandle>> {
        self.tracks.lock().get(key).cloned()
    }

    fn get_or_create(&self, key: TrackKey) -> Arc<TrackHandle> {
        let mut tracks = self.tracks.lock();
        let handle = tracks.entry(key).or_insert_with(|| {
            debug!(key = %key, "Track created");
            let track = Track::new(key, self.sim_time(), &self.config, self.models.default_model());
            Arc::new(TrackHandle::new(track))
        });
        Arc::clone(handle)
    }

    fn snapshot(&self) -> Vec<Arc<TrackHandle>> {
        self.tracks.lock().values().cloned().collect()
    }

    /// Serve one recompute request on the worker.
    fn recalc(&self, key: TrackKey, sim_time: Option<f64>) {
        // structural lock released before the track lock is taken
        let Some(handle) = self.get(&key) else {
            return;
        };
        handle.with_track_mut(|t| {
            if !t.is_valid() {
                return;
            }
            let sim_time = sim_time
                .or_else(|| t.instance_target().map(|p| p.ts))
                .unwrap_or_else(|| self.sim_time());
            if let Err(err) = t.calc_next_pos(&self.context(), sim_time) {
                warn!(key = %key, error = %err, "Recompute failed");
                t.set_invalid();
            }
        });
    }

    /// Decide what to do with a track during maintenance.
    fn judge(&self, t: &mut Track, sim_time: f64, viewer: &Position) -> Verdict {
        if t.instance_state().is_some_and(|s| !s.valid) {
            t.destroy_instance();
        }
        if !t.is_valid() || t.is_outdated(sim_time, &self.config) {
            return Verdict::Remove;
        }
        if t.has_instance() || t.len() < 2 {
            return Verdict::Keep;
        }
        if t.valid_for_instance(sim_time) {
            let dist = t.positions().front().map_or(f64::INFINITY, |p| viewer.dist_to(p));
            return Verdict::WantsInstance(dist);
        }
        if t.positions().front().is_some_and(|p| p.ts <= sim_time) {
            // chances are the next recompute makes it eligible
            self.queue.request(t.key(), None);
        }
        Verdict::Keep
    }

    /// Create the instance of an eligible track.
    ///
    /// Recomputes once more, then hands the two positions straddling
    /// `sim_time` to the factory. Returns `Ok(false)` if the track turned
    /// out not to be eligible after all.
    fn create_instance(&self, t: &mut Track, sim_time: f64, terrain: &dyn TerrainProbe) -> Result<bool, TrackError> {
        if t.has_instance() {
            return Ok(true);
        }
        if !t.calc_next_pos(&self.context(), sim_time)? {
            return Ok(false);
        }
        while t.positions.len() >= 2 && t.positions[1].ts <= sim_time {
            t.positions.pop_front();
        }
        if !t.valid_for_instance(sim_time) {
            return Ok(false);
        }

        let (Some(mut from), Some(mut to)) = (t.positions.pop_front(), t.positions.pop_front()) else {
            return Ok(false);
        };
        for pos in [&mut from, &mut to] {
            if (pos.is_on_ground() && pos.alt_m.is_none()) || pos.flags.ground == GroundStatus::Unknown {
                let alt = terrain.terrain_alt_m(pos);
                derive_ground_status(pos, alt, &self.config);
            }
        }

        let seed = AirframeSeed {
            key: t.key(),
            from,
            to,
            statics: t.statics().clone(),
            model: Arc::clone(t.model()),
            sim_time,
        };
        let airframe = self
            .factory
            .create(seed)
            .map_err(|source| TrackError::Instance { key: t.key(), source })?;
        t.instance = Some(Instance::new(airframe));
        info!(
            key = %t.key(),
            call_sign = %t.statics().call_sign,
            model = %t.model().name,
            "Instance created"
        );
        Ok(true)
    }

    /// Warn that the instance limit is reached, at most once per warning
    /// interval.
    fn warn_too_many(&self, sim_time: f64) {
        let mut last = self.too_many_warned_at.lock();
        if last.map_or(true, |at| at + self.config.too_many_warning_secs < sim_time) {
            warn!(max = self.config.max_instances, "Too many instances, showing the nearest ones only");
            *last = Some(sim_time);
        }
    }
}

impl fmt::Debug for RegistryShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryShared")
            .field("tracks", &self.tracks.lock().len())
            .field("queued", &self.queue.len())
            .field("sim_time", &self.sim_time())
            .finish_non_exhaustive()
    }
}

/// All tracks plus the recompute worker.
///
/// Dropping the registry stops the worker; recomputes in progress finish.
#[derive(Debug)]
pub struct TrackRegistry {
    shared: Arc<RegistryShared>,
    worker: RecalcWorker,
}

impl TrackRegistry {
    /// Create the registry and start its worker thread.
    pub fn new(
        config: PipelineConfig,
        airports: Arc<dyn AirportNetwork>,
        models: FlightModelCatalog,
        factory: Arc<dyn AirframeFactory>,
    ) -> io::Result<Self> {
        let shared = Arc::new(RegistryShared {
            config,
            tracks: Mutex::new(BTreeMap::new()),
            queue: RecalcQueue::new(),
            airports,
            models,
            factory,
            pending_new: AtomicBool::new(false),
            sim_time: AtomicU64::new(0.0f64.to_bits()),
            too_many_warned_at: Mutex::new(None),
        });
        let worker = RecalcWorker::start(Arc::clone(&shared))?;
        Ok(Self { shared, worker })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    pub fn sim_time(&self) -> f64 {
        self.shared.sim_time()
    }

    /// Set the current simulated time. [`frame`](Self::frame) does this
    /// itself.
    pub fn set_sim_time(&self, sim_time: f64) {
        self.shared.set_sim_time(sim_time);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Producer side
    // ─────────────────────────────────────────────────────────────────────

    /// Offer a dynamic snapshot and its position, creating the track if
    /// needed. Called from producer threads.
    pub fn add_dynamic(&self, key: TrackKey, dynamic: DynamicData, position: Option<Position>) -> DynamicOutcome {
        let handle = self.shared.get_or_create(key);
        let (outcome, latest) = handle.with_track_mut(|t| {
            let outcome = t.add_dynamic(dynamic, position, &self.shared.config);
            (outcome, t.last_dynamic().cloned())
        });
        handle.publish_dynamic(latest);

        if let DynamicOutcome::Accepted {
            position_queued: true,
            ..
        } = outcome
        {
            self.shared.pending_new.store(true, Ordering::Release);
        }
        outcome
    }

    /// Merge a static attribute fragment, creating the track if needed.
    pub fn update_statics(&self, key: TrackKey, fragment: &StaticData) -> MergeOutcome {
        let handle = self.shared.get_or_create(key);
        handle.with_track_mut(|t| t.merge_statics(fragment, &self.shared.models))
    }

    /// Drain a position source. Returns the number of accepted reports.
    pub fn pump_positions(&self, source: &mut dyn PositionSource) -> usize {
        source
            .fetch_positions()
            .into_iter()
            .filter(|r| !r.key.is_empty())
            .map(|r| self.add_dynamic(r.key, r.dynamic, r.position))
            .filter(DynamicOutcome::is_accepted)
            .count()
    }

    /// Drain an attribute source. Returns the number of fragments merged.
    pub fn pump_attributes(&self, source: &mut dyn AttributeSource) -> usize {
        let reports = source.fetch_attributes();
        let count = reports.len();
        for report in reports {
            self.update_statics(report.key, &report.statics);
        }
        count
    }

    /// Queue a recompute of `key` on the worker.
    pub fn request_recalc(&self, key: TrackKey, sim_time: Option<f64>) {
        self.shared.queue.request(key, sim_time);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Render side
    // ─────────────────────────────────────────────────────────────────────

    /// One render-thread pass: integrate new positions, run maintenance and
    /// advance all instances.
    pub fn frame(&self, sim_time: f64, viewer: &Position, terrain: &dyn TerrainProbe) -> MaintenanceReport {
        self.shared.set_sim_time(sim_time);
        self.append_all_new(terrain);
        let report = self.maintenance(sim_time, viewer, terrain);
        self.advance_instances(sim_time, terrain);
        report
    }

    /// Integrate queued raw positions of all tracks and queue recomputes
    /// for those that received any.
    ///
    /// Busy tracks are retried on the next call.
    pub fn append_all_new(&self, terrain: &dyn TerrainProbe) {
        if !self.shared.pending_new.swap(false, Ordering::AcqRel) {
            return;
        }

        let mut retry = false;
        for handle in self.shared.snapshot() {
            let appended = handle.try_with_track_mut(|t| {
                t.is_valid() && t.append_new_positions(&self.shared.config, terrain)
            });
            match appended {
                Some(true) => self.shared.queue.request(handle.key(), None),
                Some(false) => {}
                None => retry = true,
            }
        }
        if retry {
            self.shared.pending_new.store(true, Ordering::Release);
        }
    }

    /// Reap outdated and invalid tracks and create instances for eligible
    /// ones.
    ///
    /// With `max_instances` reached, the instance farthest from `viewer` is
    /// evicted if it is farther than the candidate; otherwise the candidate
    /// waits.
    pub fn maintenance(&self, sim_time: f64, viewer: &Position, terrain: &dyn TerrainProbe) -> MaintenanceReport {
        let shared = &self.shared;
        let mut report = MaintenanceReport::default();
        let mut tracks = shared.tracks.lock();

        // busy tracks count as instances, but cannot be evicted
        let mut instances: Vec<(TrackKey, f64)> = tracks
            .iter()
            .filter_map(|(key, handle)| {
                match handle.try_with_track(|t| t.instance_state().map(|s| s.view_distance_m)) {
                    Some(Some(dist)) => Some((*key, dist)),
                    Some(None) => None,
                    None => Some((*key, f64::NEG_INFINITY)),
                }
            })
            .collect();

        let mut remove = Vec::new();
        for (key, handle) in tracks.iter() {
            let judged = handle.try_with_track_mut(|t| (shared.judge(t, sim_time, viewer), t.has_instance()));
            let Some((verdict, has_instance)) = judged else {
                report.skipped += 1;
                continue;
            };
            if !has_instance {
                instances.retain(|(k, _)| k != key);
            }

            let candidate_dist = match verdict {
                Verdict::Keep => continue,
                Verdict::Remove => {
                    instances.retain(|(k, _)| k != key);
                    remove.push(*key);
                    continue;
                }
                Verdict::WantsInstance(dist) => dist,
            };

            if instances.len() >= shared.config.max_instances {
                shared.warn_too_many(sim_time);
                let farthest = instances
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, d))| *d > candidate_dist)
                    .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
                    .map(|(i, (k, d))| (i, *k, *d));
                let Some((idx, far_key, far_dist)) = farthest else {
                    continue;
                };
                let evicted = tracks
                    .get(&far_key)
                    .and_then(|h| h.try_with_track_mut(Track::destroy_instance))
                    .unwrap_or(false);
                if !evicted {
                    continue;
                }
                info!(key = %far_key, dist_m = far_dist, for_key = %key, "Instance evicted for a closer one");
                instances.swap_remove(idx);
                report.evicted += 1;
            }

            let created = handle.try_with_track_mut(|t| match shared.create_instance(t, sim_time, terrain) {
                Ok(created) => created,
                Err(err) => {
                    warn!(key = %key, error = %err, "Instance creation failed");
                    t.set_invalid();
                    false
                }
            });
            if created == Some(true) {
                instances.push((*key, candidate_dist));
                report.created += 1;
            }
        }

        // instance goes first; a track still busy is retried next frame
        for key in &remove {
            let Some(handle) = tracks.get(key) else {
                continue;
            };
            if handle.try_with_track_mut(Track::destroy_instance).is_none() {
                debug!(key = %key, "Track busy, removal deferred");
                continue;
            }
            tracks.remove(key);
            report.removed += 1;
            debug!(key = %key, "Track removed");
        }
        report
    }

    /// Advance every instance to `sim_time`.
    ///
    /// Each instance is taken out of its track while it advances, so it can
    /// fetch positions through its [`Feed`] without the track being
    /// borrowed. Busy tracks are skipped this frame.
    pub fn advance_instances(&self, sim_time: f64, terrain: &dyn TerrainProbe) {
        for handle in self.shared.snapshot() {
            let taken = handle.try_with_track_mut(|t| t.instance.as_mut().and_then(|i| i.airframe.take()));
            let Some(Some(mut airframe)) = taken else {
                continue;
            };

            let feed = Feed::new(&handle, &self.shared, terrain);
            airframe.advance(sim_time, &feed);

            handle.with_track_mut(|t| {
                let Some(instance) = t.instance.as_mut() else {
                    // destroyed meanwhile
                    return;
                };
                let invalidated = !instance.state.valid;
                if invalidated {
                    airframe.invalidate();
                }
                instance.airframe = Some(airframe);
                instance.refresh_state();
                if invalidated {
                    instance.state.valid = false;
                }
            });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn get(&self, key: &TrackKey) -> Option<Arc<TrackHandle>> {
        self.shared.get(key)
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.shared.tracks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all tracks in registry order.
    pub fn keys(&self) -> Vec<TrackKey> {
        self.shared.tracks.lock().keys().copied().collect()
    }

    /// Number of tracks with an instance. Blocks on each track lock.
    pub fn instance_count(&self) -> usize {
        self.shared
            .snapshot()
            .iter()
            .filter(|h| h.with_track(Track::has_instance))
            .count()
    }

    /// Number of queued recompute requests.
    pub fn queued_recalcs(&self) -> usize {
        self.shared.queue.len()
    }

    /// Stop the worker. Further recompute requests stay queued unserved.
    pub fn shutdown(&mut self) {
        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Airframe, AirframeState, NoAirports};
    use crate::error::AirframeError;
    use crate::geo::GroundStatus;
    use crate::phase::FlightPhase;
    use crate::track::KeyType;

    struct Flat;

    impl TerrainProbe for Flat {
        fn terrain_alt_m(&self, _: &Position) -> Option<f64> {
            Some(0.0)
        }
    }

    /// Flies from position to position, fetching the next one on every
    /// advance.
    struct Hopper(AirframeState);

    impl Airframe for Hopper {
        fn advance(&mut self, _: f64, feed: &Feed<'_>) {
            if let Fetch::Ready(next) = feed.try_fetch_next(&self.0.target) {
                if let Some(pos) = next.positions.into_iter().next() {
                    self.0.present = self.0.target.clone();
                    self.0.target = pos;
                }
            }
        }

        fn state(&self) -> AirframeState {
            self.0.clone()
        }
    }

    struct HopperFactory;

    impl AirframeFactory for HopperFactory {
        fn create(&self, seed: AirframeSeed) -> Result<Box<dyn Airframe>, AirframeError> {
            Ok(Box::new(Hopper(AirframeState {
                on_ground: seed.to.is_on_ground(),
                track: seed.from.angle_to(&seed.to),
                vsi_m_s: 0.0,
                speed_m_s: seed.from.speed_to(&seed.to),
                present: seed.from,
                target: seed.to,
                phase: FlightPhase::Cruise,
                terrain_alt_m: Some(0.0),
                view_distance_m: 1000.0,
                valid: true,
            })))
        }
    }

    fn key(n: u64) -> TrackKey {
        TrackKey::new(KeyType::Icao, n).unwrap()
    }

    fn cruise(lon: f64, ts: f64) -> Position {
        Position::with_alt_ft(0.0, lon, 10000.0, ts).ground(GroundStatus::Off)
    }

    fn dynamic(ts: f64) -> DynamicData {
        DynamicData {
            ts,
            ..Default::default()
        }
    }

    /// Registry whose worker is already stopped, so recomputes only happen
    /// where a test triggers them.
    fn registry(config: PipelineConfig) -> TrackRegistry {
        let mut registry = TrackRegistry::new(
            config,
            Arc::new(NoAirports),
            FlightModelCatalog::default(),
            Arc::new(HopperFactory),
        )
        .unwrap();
        registry.shutdown();
        registry
    }

    /// Feed a straight cruise leg along the equator starting at `lon`.
    fn feed_leg(registry: &TrackRegistry, k: TrackKey, lon: f64, times: &[f64]) {
        for (i, ts) in times.iter().enumerate() {
            registry.add_dynamic(k, dynamic(*ts), Some(cruise(lon + 0.1 * i as f64, *ts)));
        }
        registry.append_all_new(&Flat);
    }

    #[test]
    fn test_add_dynamic_creates_track() {
        let registry = registry(PipelineConfig::default());
        let out = registry.add_dynamic(key(1), dynamic(100.0), Some(cruise(0.0, 100.0)));

        assert_eq!(
            out,
            DynamicOutcome::Accepted {
                switched: false,
                position_queued: true
            }
        );
        assert_eq!(registry.keys(), vec![key(1)]);
        let handle = registry.get(&key(1)).unwrap();
        assert_eq!(handle.latest_dynamic().map(|d| d.ts), Some(100.0));
        // not integrated before the render thread runs
        assert!(handle.is_empty());
    }

    #[test]
    fn test_append_all_new_integrates_and_queues() {
        let registry = registry(PipelineConfig::default());
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0]);

        assert_eq!(registry.get(&key(1)).unwrap().len(), 2);
        assert_eq!(registry.queued_recalcs(), 1);

        // nothing new: no second request
        registry.request_recalc(key(1), Some(5.0));
        registry.append_all_new(&Flat);
        assert_eq!(registry.queued_recalcs(), 1);
    }

    #[test]
    fn test_update_statics_creates_track() {
        let registry = registry(PipelineConfig::default());
        let fragment = StaticData {
            call_sign: "BER123".into(),
            ..Default::default()
        };
        let out = registry.update_statics(key(7), &fragment);

        assert!(out.needs_master_data);
        assert_eq!(registry.get(&key(7)).unwrap().statics().call_sign, "BER123");
    }

    #[test]
    fn test_maintenance_creates_instance() {
        let registry = registry(PipelineConfig::default());
        registry.set_sim_time(130.0);
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0, 220.0]);

        let viewer = cruise(0.0, 130.0);
        let report = registry.maintenance(130.0, &viewer, &Flat);

        assert_eq!(report.created, 1);
        assert_eq!(registry.instance_count(), 1);
        let handle = registry.get(&key(1)).unwrap();
        assert_eq!(handle.instance_state().map(|s| s.target.ts), Some(160.0));
        // the seed positions left the buffer
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_advance_hands_out_next_position() {
        let registry = registry(PipelineConfig::default());
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0, 220.0]);
        let viewer = cruise(0.0, 130.0);
        registry.maintenance(130.0, &viewer, &Flat);

        registry.advance_instances(165.0, &Flat);

        let handle = registry.get(&key(1)).unwrap();
        let state = handle.instance_state().unwrap();
        assert_eq!(state.present.ts, 160.0);
        assert_eq!(state.target.ts, 220.0);
        assert!(handle.is_empty());
    }

    #[test]
    fn test_invalid_track_hands_out_nothing() {
        let registry = registry(PipelineConfig::default());
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0, 220.0]);
        let handle = registry.get(&key(1)).unwrap();
        let feed = Feed::new(&handle, &registry.shared, &Flat);

        assert!(matches!(feed.try_fetch_next(&cruise(0.0, 100.0)), Fetch::Ready(_)));
        assert_eq!(handle.len(), 2);

        handle.with_track_mut(Track::set_invalid);
        assert!(matches!(feed.try_fetch_next(&cruise(0.0, 160.0)), Fetch::NoData));
        assert_eq!(handle.len(), 2);
    }

    #[test]
    fn test_farthest_instance_evicted() {
        let registry = registry(PipelineConfig::default().with_max_instances(1));
        // lower key first, so the far track gets its instance first
        feed_leg(&registry, key(1), 1.0, &[100.0, 160.0]);
        feed_leg(&registry, key(2), 0.0, &[100.0, 160.0]);
        let viewer = cruise(0.0, 130.0);

        let report = registry.maintenance(130.0, &viewer, &Flat);

        assert_eq!(report.created, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(registry.instance_count(), 1);
        assert!(registry.get(&key(2)).unwrap().instance_state().is_some());
        assert!(registry.get(&key(1)).unwrap().instance_state().is_none());
    }

    #[test]
    fn test_closer_instances_not_evicted() {
        let registry = registry(PipelineConfig::default().with_max_instances(1));
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0]);
        feed_leg(&registry, key(2), 1.0, &[100.0, 160.0]);
        let viewer = cruise(0.0, 130.0);

        let report = registry.maintenance(130.0, &viewer, &Flat);

        assert_eq!(report.created, 1);
        assert_eq!(report.evicted, 0);
        assert!(registry.get(&key(1)).unwrap().instance_state().is_some());
        assert!(registry.get(&key(2)).unwrap().instance_state().is_none());
    }

    #[test]
    fn test_invalid_track_removed() {
        let registry = registry(PipelineConfig::default());
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0]);
        registry.get(&key(1)).unwrap().with_track_mut(Track::set_invalid);

        let report = registry.maintenance(130.0, &cruise(0.0, 130.0), &Flat);

        assert_eq!(report.removed, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removed_track_loses_instance() {
        let registry = registry(PipelineConfig::default());
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0, 220.0]);
        let viewer = cruise(0.0, 130.0);
        registry.maintenance(130.0, &viewer, &Flat);
        let handle = registry.get(&key(1)).unwrap();
        assert!(handle.instance_state().is_some());

        handle.with_track_mut(Track::set_invalid);
        assert_eq!(registry.maintenance(131.0, &viewer, &Flat).removed, 1);
        assert!(registry.get(&key(1)).is_none());
        // the handle outlives the map entry, its instance does not
        assert!(handle.instance_state().is_none());
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_outdated_track_removed() {
        let registry = registry(PipelineConfig::default());
        registry.update_statics(key(1), &StaticData::default());
        let viewer = cruise(0.0, 0.0);

        // youngest timestamp starts two outdated intervals ahead
        assert_eq!(registry.maintenance(150.0, &viewer, &Flat).removed, 0);
        assert_eq!(registry.maintenance(151.0, &viewer, &Flat).removed, 1);
    }

    #[test]
    fn test_worker_recomputes_queued_track() {
        let registry = TrackRegistry::new(
            PipelineConfig::default(),
            Arc::new(NoAirports),
            FlightModelCatalog::default(),
            Arc::new(HopperFactory),
        )
        .unwrap();
        registry.set_sim_time(170.0);
        feed_leg(&registry, key(1), 0.0, &[100.0, 160.0, 220.0]);

        // the worker drops the consumed front position
        let handle = registry.get(&key(1)).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while handle.len() != 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(handle.len(), 2);
        assert_eq!(handle.with_track(|t| t.positions()[0].ts), 160.0);
    }
}
