//! Background recompute worker.
//!
//! One thread serves a queue of recompute requests. Requests are
//! de-duplicated by key; a repeated request only moves the requested
//! simulated time forward. The thread sleeps on a condition variable until
//! there is work or it is told to stop.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use super::RegistryShared;
use crate::track::TrackKey;

/// Thread name of the worker.
pub const WORKER_THREAD_NAME: &str = "xtraffic-recalc";

#[derive(Debug, Default)]
struct QueueState {
    /// Keys to recompute with the requested simulated time. `None` means
    /// "whatever time is current when the request is served".
    pending: VecDeque<(TrackKey, Option<f64>)>,
    stop: bool,
}

/// Recompute request queue.
#[derive(Debug, Default)]
pub(crate) struct RecalcQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl RecalcQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a recompute of `key`, or move an already queued one to the
    /// later of both times.
    pub(crate) fn request(&self, key: TrackKey, sim_time: Option<f64>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.pending.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = match (entry.1, sim_time) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            return;
        }
        state.pending.push_back((key, sim_time));
        self.wake.notify_all();
    }

    /// Block until a request is queued. Returns `None` once stopped.
    fn next(&self) -> Option<(TrackKey, Option<f64>)> {
        let mut state = self.state.lock();
        loop {
            if state.stop {
                return None;
            }
            if let Some(request) = state.pending.pop_front() {
                return Some(request);
            }
            self.wake.wait(&mut state);
        }
    }

    fn stop(&self) {
        self.state.lock().stop = true;
        self.wake.notify_all();
    }

    /// Number of queued requests.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Requested time for `key`, if queued.
    #[cfg(test)]
    fn requested(&self, key: TrackKey) -> Option<Option<f64>> {
        self.state
            .lock()
            .pending
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, t)| *t)
    }
}

/// The worker thread. Stopped and joined on drop.
#[derive(Debug)]
pub(crate) struct RecalcWorker {
    shared: Arc<RegistryShared>,
    thread: Option<JoinHandle<()>>,
}

impl RecalcWorker {
    /// Spawn the worker thread.
    pub(crate) fn start(shared: Arc<RegistryShared>) -> io::Result<Self> {
        let worker_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || Self::run(worker_shared))?;
        info!("Recompute worker started");
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    fn run(shared: Arc<RegistryShared>) {
        while let Some((key, sim_time)) = shared.queue.next() {
            shared.recalc(key, sim_time);
        }
        debug!("Recompute worker loop ended");
    }

    /// Stop the thread and wait for it. Requests still queued are dropped;
    /// a recompute in progress completes.
    pub(crate) fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shared.queue.stop();
        if thread.join().is_err() {
            tracing::error!("Recompute worker panicked");
        } else {
            info!("Recompute worker stopped");
        }
    }
}

impl Drop for RecalcWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
