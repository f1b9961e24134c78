//! Per-job polling state machine.
//!
//! A watcher polls one job's status until the engine reports a terminal
//! state, then runs the owner's callbacks and hands the outcome to the
//! tracker, which retires the pointer and publishes the notification.
//!
//! ```text
//! idle -> polling -> done | error
//!            \-----> cancelled
//! ```
//!
//! Queries are strictly sequential: the next one is scheduled only after
//! the previous answer (or failure) was processed. A failed query is never
//! a job error; the watcher keeps polling until the engine itself says
//! `done` or `error`, or until it is cancelled.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pstudio_core::job::{JobOutcome, JobReference};
use pstudio_core::studio::error_text;
use pstudio_core::types::AccountScope;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::status::StatusSource;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable state of a watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherState {
    /// Created, first query not yet issued.
    Idle,
    /// Waiting for a terminal status.
    Polling {
        /// Last progress percentage reported by the engine.
        progress: Option<u8>,
        /// Status queries issued so far, failed ones included.
        attempts: u32,
    },
    /// The job finished with this result.
    Done { result: Value },
    /// The job failed; `message` is what the user is shown.
    Error { message: String },
    /// The owner lost interest; the job itself may still be running.
    Cancelled,
}

impl WatcherState {
    /// No further transitions can happen.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            WatcherState::Done { .. } | WatcherState::Error { .. } | WatcherState::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

type DoneCallback = Box<dyn FnOnce(&Value) + Send>;
type ErrorCallback = Box<dyn FnOnce(&str) + Send>;

/// What the owner of a watcher wants done with the outcome, typically
/// patching its own view state.
#[derive(Default)]
pub struct JobCallbacks {
    on_done: Option<DoneCallback>,
    on_error: Option<ErrorCallback>,
}

impl JobCallbacks {
    /// No callbacks; only the pointer and notification side effects happen.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_done(mut self, f: impl FnOnce(&Value) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn invoke(self, outcome: &JobOutcome, message: &str) {
        match outcome {
            JobOutcome::Done { result, .. } => {
                if let Some(f) = self.on_done {
                    f(result);
                }
            }
            JobOutcome::Failed(_) => {
                if let Some(f) = self.on_error {
                    f(message);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared handle on a running watcher.
///
/// Cloning the handle does not start another watcher. Dropping every handle
/// does not stop it either; call [`cancel`](Self::cancel).
#[derive(Clone)]
pub struct WatcherHandle {
    shared: Arc<Shared>,
}

struct Shared {
    id: u64,
    scope: AccountScope,
    job: JobReference,
    cancel: CancellationToken,
    state: watch::Receiver<WatcherState>,
    callbacks: Mutex<Delivery>,
}

/// Callback bookkeeping: queued until the outcome is known, then the
/// outcome itself so late owners can still be served.
enum Delivery {
    Pending(Vec<JobCallbacks>),
    Delivered { outcome: JobOutcome, message: String },
}

/// Callbacks attached after the outcome was delivered. The caller runs
/// them with [`deliver`](Self::deliver) once it holds no locks.
pub(crate) struct LateCallbacks {
    callbacks: JobCallbacks,
    outcome: JobOutcome,
    message: String,
}

impl LateCallbacks {
    pub(crate) fn deliver(self) {
        self.callbacks.invoke(&self.outcome, &self.message);
    }
}

impl WatcherHandle {
    pub fn job(&self) -> &JobReference {
        &self.shared.job
    }

    pub fn scope(&self) -> &AccountScope {
        &self.shared.scope
    }

    /// Current state snapshot.
    pub fn state(&self) -> WatcherState {
        self.shared.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.state.borrow().is_final()
    }

    /// Still polling and not asked to stop.
    pub fn is_active(&self) -> bool {
        !self.shared.cancel.is_cancelled() && !self.is_finished()
    }

    /// Stop polling. The pointer stays in place so the job can be resumed
    /// or picked up by the supervisor.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Wait until the watcher reaches a final state.
    pub async fn wait(&self) -> WatcherState {
        let mut rx = self.shared.state.clone();
        let result = rx.wait_for(WatcherState::is_final).await.map(|s| s.clone());
        match result {
            Ok(state) => state,
            // The task is gone without a final state (runtime shutdown).
            Err(_) => self.state(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.shared.id
    }

    /// Attach another owner's callbacks. If the outcome was already
    /// delivered they come back bound to it, to be run by the caller.
    pub(crate) fn attach(&self, callbacks: JobCallbacks) -> Option<LateCallbacks> {
        let mut delivery = self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &mut *delivery {
            Delivery::Pending(list) => {
                list.push(callbacks);
                None
            }
            Delivery::Delivered { outcome, message } => Some(LateCallbacks {
                callbacks,
                outcome: outcome.clone(),
                message: message.clone(),
            }),
        }
    }

    /// Record the outcome and take the callbacks queued so far.
    fn deliver(&self, outcome: &JobOutcome, message: &str) -> Vec<JobCallbacks> {
        let mut delivery = self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let delivered = Delivery::Delivered {
            outcome: outcome.clone(),
            message: message.to_string(),
        };
        match std::mem::replace(&mut *delivery, delivered) {
            Delivery::Pending(list) => list,
            Delivery::Delivered { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("id", &self.shared.id)
            .field("job", &self.shared.job)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Receives the outcome of a watcher.
pub(crate) trait OutcomeSink: Send + Sync + 'static {
    /// Retire the pointer and publish the notification. Returns whether
    /// this call was the first to settle the job.
    fn settle(&self, scope: &AccountScope, job: &JobReference, outcome: &JobOutcome) -> bool;

    /// The watcher task is about to exit.
    fn watcher_finished(&self, watcher_id: u64, job_id: &str);
}

/// Everything a watcher task needs besides its job.
pub(crate) struct WatcherContext {
    pub source: Arc<dyn StatusSource>,
    pub sink: Arc<dyn OutcomeSink>,
    pub poll_interval: Duration,
}

/// Spawn the polling task for `job` and return its handle.
pub(crate) fn spawn_watcher(
    id: u64,
    scope: AccountScope,
    job: JobReference,
    callbacks: JobCallbacks,
    ctx: WatcherContext,
) -> WatcherHandle {
    let (state_tx, state_rx) = watch::channel(WatcherState::Idle);
    let handle = WatcherHandle {
        shared: Arc::new(Shared {
            id,
            scope,
            job,
            cancel: CancellationToken::new(),
            state: state_rx,
            callbacks: Mutex::new(Delivery::Pending(vec![callbacks])),
        }),
    };

    let task_handle = handle.clone();
    tokio::spawn(async move {
        run_watcher(task_handle, ctx, state_tx).await;
    });

    handle
}

async fn run_watcher(
    handle: WatcherHandle,
    ctx: WatcherContext,
    state_tx: watch::Sender<WatcherState>,
) {
    let job = handle.job().clone();
    tracing::debug!(job_id = %job.job_id, domain = %job.domain, subkey = %job.subkey, "Watcher started");

    let final_state = match poll_until_terminal(&handle, &ctx, &state_tx).await {
        None => {
            tracing::debug!(job_id = %job.job_id, "Watcher cancelled");
            WatcherState::Cancelled
        }
        Some(outcome) => {
            let message = error_text(&job, outcome.error_message()).message;
            for callbacks in handle.deliver(&outcome, &message) {
                callbacks.invoke(&outcome, &message);
            }
            ctx.sink.settle(handle.scope(), &job, &outcome);

            match outcome {
                JobOutcome::Done { result, .. } => WatcherState::Done { result },
                JobOutcome::Failed(_) => WatcherState::Error { message },
            }
        }
    };

    ctx.sink.watcher_finished(handle.id(), &job.job_id);
    state_tx.send_replace(final_state);
}

/// Poll until the engine reports a terminal status. Returns `None` when
/// cancelled, including when a response arrives after cancellation.
async fn poll_until_terminal(
    handle: &WatcherHandle,
    ctx: &WatcherContext,
    state_tx: &watch::Sender<WatcherState>,
) -> Option<JobOutcome> {
    let cancel = &handle.shared.cancel;
    let job = handle.job();
    let mut attempts: u32 = 0;
    let mut progress: Option<u8> = None;

    state_tx.send_replace(WatcherState::Polling { progress, attempts });

    loop {
        attempts += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = ctx.source.fetch_status(job) => result,
        };

        if cancel.is_cancelled() {
            return None;
        }

        match result {
            Ok(status) => {
                progress = status.progress().or(progress);
                if let Some(outcome) = status.into_outcome() {
                    tracing::info!(
                        job_id = %job.job_id,
                        attempts,
                        success = outcome.is_success(),
                        "Job reached terminal state",
                    );
                    return Some(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = attempts,
                    error = %e,
                    "Status query failed, retrying",
                );
            }
        }

        state_tx.send_replace(WatcherState::Polling { progress, attempts });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn final_states() {
        assert!(!WatcherState::Idle.is_final());
        assert!(!WatcherState::Polling { progress: None, attempts: 1 }.is_final());
        assert!(WatcherState::Done { result: Value::Null }.is_final());
        assert!(WatcherState::Error { message: "x".into() }.is_final());
        assert!(WatcherState::Cancelled.is_final());
    }

    #[test]
    fn callbacks_match_outcome() {
        let done = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let (d, f) = (done.clone(), failed.clone());
        JobCallbacks::new()
            .on_done(move |_| d.store(true, Ordering::SeqCst))
            .on_error(move |_| f.store(true, Ordering::SeqCst))
            .invoke(&JobOutcome::Failed(None), "failed");

        assert!(!done.load(Ordering::SeqCst));
        assert!(failed.load(Ordering::SeqCst));
    }
}
