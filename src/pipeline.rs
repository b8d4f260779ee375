//! Job chain: normalize → simulate → cost, behind a single run token.
//!
//! [`RunQueue`] enforces the append-or-replace policy: at most one request
//! waits, a newer submission supersedes a waiting one, and a request never
//! starts while another run is in flight.

use parking_lot::{Condvar, Mutex};
use tracing::{info, info_span, warn};

use crate::batch::{BatchReport, BatchRunner, Snapshot};
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::store::ResultStore;

/// A request to run the chain once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub id: u64,
    pub reason: String,
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Queued { id: u64 },
    /// The request replaced a pending one that had not started.
    Replaced { id: u64, superseded: u64 },
}

impl Submission {
    pub fn id(&self) -> u64 {
        match self {
            Self::Queued { id } | Self::Replaced { id, .. } => *id,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: Option<RunRequest>,
    in_flight: Option<u64>,
    next_id: u64,
    closed: bool,
}

/// Single-slot queue with one run token.
#[derive(Debug, Default)]
pub struct RunQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

/// Holds the run token; releasing it lets the next request start.
#[derive(Debug)]
pub struct RunGuard<'a> {
    queue: &'a RunQueue,
    request: RunRequest,
}

impl RunGuard<'_> {
    pub fn request(&self) -> &RunRequest {
        &self.request
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock();
        state.in_flight = None;
        self.queue.changed.notify_all();
    }
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a run, replacing any request that has not started yet.
    pub fn submit(&self, reason: impl Into<String>) -> Submission {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        let previous = state.pending.replace(RunRequest {
            id,
            reason: reason.into(),
        });
        self.changed.notify_all();
        match previous {
            Some(old) => {
                info!(id, superseded = old.id, "pending run replaced");
                Submission::Replaced {
                    id,
                    superseded: old.id,
                }
            }
            None => Submission::Queued { id },
        }
    }

    /// Takes the pending request if nothing is in flight.
    pub fn try_start(&self) -> Option<RunGuard<'_>> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return None;
        }
        let request = state.pending.take()?;
        state.in_flight = Some(request.id);
        Some(RunGuard { queue: self, request })
    }

    /// Blocks until a request can start. Returns `None` once the queue is
    /// closed and nothing is pending.
    pub fn start(&self) -> Option<RunGuard<'_>> {
        let mut state = self.state.lock();
        loop {
            if state.in_flight.is_none() {
                if let Some(request) = state.pending.take() {
                    state.in_flight = Some(request.id);
                    return Some(RunGuard { queue: self, request });
                }
                if state.closed {
                    return None;
                }
            }
            self.changed.wait(&mut state);
        }
    }

    /// Stops accepting waits; a pending request is still handed out.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn pending(&self) -> Option<RunRequest> {
        self.state.lock().pending.clone()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.state.lock().in_flight
    }
}

/// Turns external inputs into a batch snapshot (the normalize stage).
pub trait ScenarioSource: Send + Sync {
    /// # Errors
    ///
    /// Any failure reading or preparing inputs; the run stops before
    /// simulation.
    fn normalize(&self) -> Result<Snapshot, Error>;
}

impl ScenarioSource for Snapshot {
    fn normalize(&self) -> Result<Snapshot, Error> {
        Ok(self.clone())
    }
}

/// Wires a source, a batch runner and a store behind a [`RunQueue`].
pub struct Pipeline<S, St> {
    source: S,
    runner: BatchRunner,
    store: St,
    queue: RunQueue,
}

impl<S: ScenarioSource, St: ResultStore> Pipeline<S, St> {
    pub fn new(source: S, runner: BatchRunner, store: St) -> Self {
        Self {
            source,
            runner,
            store,
            queue: RunQueue::new(),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn submit(&self, reason: impl Into<String>) -> Submission {
        self.queue.submit(reason)
    }

    /// Runs the pending request, if any and if nothing is in flight.
    pub fn run_pending(&self, cancel: &CancelToken) -> Option<Result<BatchReport, Error>> {
        let guard = self.queue.try_start()?;
        Some(self.execute(guard.request(), cancel))
    }

    /// Processes requests until the queue is closed.
    pub fn serve(&self, cancel: &CancelToken) -> Vec<Result<BatchReport, Error>> {
        let mut results = Vec::new();
        while let Some(guard) = self.queue.start() {
            results.push(self.execute(guard.request(), cancel));
        }
        results
    }

    fn execute(&self, request: &RunRequest, cancel: &CancelToken) -> Result<BatchReport, Error> {
        let span = info_span!("run", id = request.id, reason = %request.reason);
        let _enter = span.enter();

        info!(stage = "normalize", "stage started");
        let snapshot = self.source.normalize().inspect_err(|e| {
            warn!(stage = "normalize", error = %e, "run aborted");
        })?;

        info!(stage = "simulate+cost", scenarios = snapshot.scenarios.len(), "stage started");
        Ok(self.runner.run(&snapshot, &self.store, cancel))
    }
}
