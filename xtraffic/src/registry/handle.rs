//! Per-track lock and the render thread's non-blocking view of a track.
//!
//! Every [`Track`] lives behind a re-entrant lock in a [`TrackHandle`].
//! Producers and the worker take it blocking and briefly; the render
//! thread only ever tries it and treats a busy lock as "no data this
//! frame" ([`Fetch::NoLock`]).

use std::cell::RefCell;

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{trace, warn};

use super::RegistryShared;
use crate::collaborators::{AirframeState, ChannelRef, TerrainProbe};
use crate::error::TrackError;
use crate::geo::{GroundStatus, Position};
use crate::track::{derive_ground_status, DynamicData, StaticData, Track, TrackKey};

/// Result of a non-blocking access.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    /// The track is locked by another thread; retry next frame.
    NoLock,
    /// The lock was free but there is nothing to hand out.
    NoData,
    Ready(T),
}

impl<T> Fetch<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Fetch::Ready(_))
    }

    /// The value, if ready.
    pub fn ready(self) -> Option<T> {
        match self {
            Fetch::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Fetch::NoLock => Fetch::NoLock,
            Fetch::NoData => Fetch::NoData,
            Fetch::Ready(v) => Fetch::Ready(f(v)),
        }
    }
}

/// Positions handed to an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPositions {
    pub positions: Vec<Position>,
    /// Planned start of the rotation, if a take-off lies ahead.
    pub rotate_ts: Option<f64>,
}

/// A track behind its lock.
///
/// The lock is re-entrant so an instance advancing on the render thread can
/// call back into its own track through a [`Feed`]. The `RefCell` inside is
/// never borrowed across such a call.
pub struct TrackHandle {
    key: TrackKey,
    track: ReentrantMutex<RefCell<Track>>,
    /// Copy of the youngest dynamic snapshot for display.
    latest_dynamic: RwLock<Option<DynamicData>>,
}

impl TrackHandle {
    pub(crate) fn new(track: Track) -> Self {
        Self {
            key: track.key(),
            track: ReentrantMutex::new(RefCell::new(track)),
            latest_dynamic: RwLock::new(None),
        }
    }

    pub fn key(&self) -> TrackKey {
        self.key
    }

    /// Read the track, blocking until the lock is free.
    pub fn with_track<R>(&self, f: impl FnOnce(&Track) -> R) -> R {
        let guard = self.track.lock();
        let track = guard.borrow();
        f(&track)
    }

    /// Read the track if the lock is free right now.
    pub fn try_with_track<R>(&self, f: impl FnOnce(&Track) -> R) -> Option<R> {
        let guard = self.track.try_lock()?;
        let track = guard.try_borrow().ok()?;
        Some(f(&track))
    }

    /// Modify the track, blocking until the lock is free.
    pub(crate) fn with_track_mut<R>(&self, f: impl FnOnce(&mut Track) -> R) -> R {
        let guard = self.track.lock();
        let mut track = guard.borrow_mut();
        f(&mut track)
    }

    /// Modify the track if the lock is free right now and the track is not
    /// borrowed further up this thread's stack.
    pub(crate) fn try_with_track_mut<R>(&self, f: impl FnOnce(&mut Track) -> R) -> Option<R> {
        let guard = self.track.try_lock()?;
        let mut track = guard.try_borrow_mut().ok()?;
        Some(f(&mut track))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Safe copies
    // ─────────────────────────────────────────────────────────────────────

    /// Copy of the static attributes, without blocking.
    pub fn try_statics(&self) -> Fetch<StaticData> {
        match self.try_with_track(|t| t.statics().clone()) {
            Some(statics) => Fetch::Ready(statics),
            None => Fetch::NoLock,
        }
    }

    /// Copy of the current dynamic snapshot, without blocking.
    pub fn try_dynamic(&self) -> Fetch<DynamicData> {
        match self.try_with_track(|t| t.current_dynamic().cloned()) {
            Some(Some(dynamic)) => Fetch::Ready(dynamic),
            Some(None) => Fetch::NoData,
            None => Fetch::NoLock,
        }
    }

    /// Copy of the static attributes.
    pub fn statics(&self) -> StaticData {
        self.with_track(|t| t.statics().clone())
    }

    /// Copy of the current dynamic snapshot.
    pub fn first_dynamic(&self) -> Option<DynamicData> {
        self.with_track(|t| t.current_dynamic().cloned())
    }

    /// Copy of the youngest dynamic snapshot.
    pub fn last_dynamic(&self) -> Option<DynamicData> {
        self.with_track(|t| t.last_dynamic().cloned())
    }

    /// The youngest dynamic snapshot as last published by a producer.
    ///
    /// Does not touch the track lock and may lag behind the track by one
    /// update. Meant for display only.
    pub fn latest_dynamic(&self) -> Option<DynamicData> {
        self.latest_dynamic.read().clone()
    }

    pub(crate) fn publish_dynamic(&self, dynamic: Option<DynamicData>) {
        *self.latest_dynamic.write() = dynamic;
    }

    /// Channel owning the track.
    pub fn current_channel(&self) -> Option<ChannelRef> {
        self.with_track(|t| t.current_channel().cloned())
    }

    /// Number of buffered positions.
    pub fn len(&self) -> usize {
        self.with_track(|t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self) -> bool {
        self.with_track(|t| t.is_valid())
    }

    /// Published state of the instance, if one exists.
    pub fn instance_state(&self) -> Option<AirframeState> {
        self.with_track(|t| t.instance_state().cloned())
    }

    /// Multi-line dump of the buffer for debug logs.
    pub fn dump(&self) -> String {
        self.with_track(|t| t.dump())
    }
}

impl std::fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What an advancing instance sees of its track.
///
/// Only exists for the duration of [`Airframe::advance`](crate::collaborators::Airframe::advance)
/// on the render thread, which is why it may carry the terrain probe.
pub struct Feed<'a> {
    handle: &'a TrackHandle,
    shared: &'a RegistryShared,
    terrain: &'a dyn TerrainProbe,
}

impl<'a> Feed<'a> {
    pub(crate) fn new(handle: &'a TrackHandle, shared: &'a RegistryShared, terrain: &'a dyn TerrainProbe) -> Self {
        Self {
            handle,
            shared,
            terrain,
        }
    }

    pub fn key(&self) -> TrackKey {
        self.handle.key()
    }

    /// Terrain altitude below `pos`.
    pub fn terrain_alt_m(&self, pos: &Position) -> Option<f64> {
        self.terrain.terrain_alt_m(pos)
    }

    /// Take the next position after `target`, the position the instance
    /// currently flies to.
    ///
    /// Positions whose altitude was left to the render thread get their
    /// terrain altitude first. Positions before `target` are discarded.
    /// An invalid track has nothing to hand out.
    pub fn try_fetch_next(&self, target: &Position) -> Fetch<FetchedPositions> {
        let config = &self.shared.config;
        let fetched = self.handle.try_with_track_mut(|t| {
            if !t.is_valid() {
                return Fetch::NoData;
            }
            for pos in t.positions.iter_mut() {
                if (pos.is_on_ground() && pos.alt_m.is_none()) || pos.flags.ground == GroundStatus::Unknown {
                    let terrain = self.terrain.terrain_alt_m(pos);
                    derive_ground_status(pos, terrain, config);
                }
            }

            while t.positions.front().is_some_and(|p| p.ts < target.ts) {
                t.positions.pop_front();
            }

            match t.positions.pop_front() {
                Some(next) => {
                    trace!(key = %t.key(), pos = %next, "Position handed out");
                    Fetch::Ready(FetchedPositions {
                        positions: vec![next],
                        rotate_ts: t.rotate_ts(),
                    })
                }
                None => Fetch::NoData,
            }
        });
        fetched.unwrap_or(Fetch::NoLock)
    }

    /// Copy of the first buffered position after `ts`, leaving it in place.
    pub fn position_after(&self, ts: f64) -> Fetch<Position> {
        let found = self
            .handle
            .try_with_track(|t| t.positions().iter().find(|p| p.ts > ts).cloned());
        match found {
            Some(Some(pos)) => Fetch::Ready(pos),
            Some(None) => Fetch::NoData,
            None => Fetch::NoLock,
        }
    }

    /// Ask the worker to recompute the track for `sim_time`.
    pub fn request_recalc(&self, sim_time: f64) {
        self.shared.queue.request(self.handle.key(), Some(sim_time));
    }

    /// Recompute the track right away on this thread, blocking until the
    /// lock is free.
    ///
    /// For an instance that is about to run out of positions and cannot
    /// wait for the worker.
    /// On failure the track is invalidated, as with a failed recompute on
    /// the worker.
    pub fn recalc_now(&self, sim_time: f64) -> Result<bool, TrackError> {
        self.handle.with_track_mut(|t| {
            let result = t.calc_next_pos(&self.shared.context(), sim_time);
            if let Err(err) = &result {
                warn!(key = %t.key(), error = %err, "Recompute failed");
                t.set_invalid();
            }
            result
        })
    }
}
