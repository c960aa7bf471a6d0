//! Single-slot background flush scheduler.
//!
//! # Coalescing (for beginners)
//!
//! `apply()` must return immediately, so the actual write runs on a worker
//! thread.  If a caller fires `apply()` ten times in a loop we do not want
//! ten threads racing to overwrite the same file.  Instead each store owns
//! one *slot*:
//!
//! ```text
//! apply()  slot idle   → mark running, spawn worker
//! apply()  slot busy   → mark rerun, return
//! worker   job done    → rerun set?  clear it and run the job again
//!                        otherwise   mark idle and exit
//! ```
//!
//! The job reads the store when it *runs*, not when `apply()` was called, so
//! any number of applies issued during one write collapse into at most one
//! extra write that carries the newest state.
//!
//! The slot is the only state behind this module's lock; the job itself is
//! responsible for its own synchronisation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

/// What [`CommitScheduler::schedule`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new worker was started.
    Started,
    /// A worker was already running; it will run the job once more.
    Coalesced,
    /// The worker thread could not be spawned.
    SpawnFailed,
}

#[derive(Default)]
struct Slot {
    running: bool,
    rerun: bool,
    handle: Option<JoinHandle<()>>,
    passes: u64,
}

/// Runs at most one background job per owner at a time.
pub struct CommitScheduler {
    worker_name: String,
    slot: Arc<Mutex<Slot>>,
}

impl CommitScheduler {
    /// Creates an idle scheduler whose worker threads carry `worker_name`.
    pub fn new(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Runs `job` on the background slot, or coalesces it into the running
    /// worker.
    ///
    /// The worker thread is detached: it keeps running even if the scheduler
    /// is dropped.
    pub fn schedule<F>(&self, job: F) -> ScheduleOutcome
    where
        F: Fn() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.running {
            slot.rerun = true;
            debug!("background flush already running; coalescing request");
            return ScheduleOutcome::Coalesced;
        }

        let shared = Arc::clone(&self.slot);
        let spawned = thread::Builder::new()
            .name(self.worker_name.clone())
            .spawn(move || run_worker(&shared, job));

        match spawned {
            Ok(handle) => {
                slot.running = true;
                slot.handle = Some(handle);
                debug!("started background flush worker");
                ScheduleOutcome::Started
            }
            Err(e) => {
                error!("failed to spawn background flush worker: {e}");
                ScheduleOutcome::SpawnFailed
            }
        }
    }

    /// Returns `true` while a worker is running or has a rerun pending.
    pub fn is_busy(&self) -> bool {
        lock(&self.slot).running
    }

    /// Total number of job executions completed by workers of this scheduler.
    pub fn completed_passes(&self) -> u64 {
        lock(&self.slot).passes
    }

    /// Blocks until no worker is running.
    pub fn wait_idle(&self) {
        loop {
            let handle = lock(&self.slot).handle.take();
            match handle {
                Some(handle) => {
                    if handle.join().is_err() {
                        error!("background flush worker panicked");
                    }
                }
                None => break,
            }
        }
    }
}

fn run_worker<F: Fn()>(slot: &Mutex<Slot>, job: F) {
    loop {
        if panic::catch_unwind(AssertUnwindSafe(&job)).is_err() {
            error!("background flush job panicked");
        }

        let mut guard = lock(slot);
        guard.passes += 1;
        if guard.rerun {
            guard.rerun = false;
            debug!("running coalesced background flush");
            continue;
        }
        guard.running = false;
        debug!(passes = guard.passes, "background flush worker finished");
        break;
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
