//! Background supervisor for jobs nobody is watching.
//!
//! Every tick enumerates the pointers of the current account scope and
//! issues a one-shot status query for each job without a live watcher.
//! Terminal jobs are settled through the tracker, so a job finishing while
//! its page is closed still produces its notification exactly once.

use pstudio_core::types::AccountScope;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::tracker::JobTracker;

/// What one supervisor tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pointers found for the scope.
    pub pointers: usize,
    /// Pointers skipped because a watcher already polls them.
    pub watched: usize,
    /// Jobs settled by this tick.
    pub settled: usize,
    /// Status queries that failed; retried next tick.
    pub failed: usize,
}

/// Fixed-cadence reconciler over all stored pointers of one scope.
pub struct Supervisor {
    tracker: JobTracker,
    scope: watch::Receiver<AccountScope>,
}

impl Supervisor {
    pub fn new(tracker: JobTracker, scope: watch::Receiver<AccountScope>) -> Self {
        Self { tracker, scope }
    }

    /// Run ticks at the tracker's poll interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.tracker.poll_interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = interval.as_millis() as u64,
            "Job supervisor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job supervisor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.settled > 0 || report.failed > 0 {
                        tracing::debug!(?report, "Supervisor tick");
                    }
                }
            }
        }
    }

    /// One reconciliation pass over the current scope.
    pub async fn tick(&self) -> TickReport {
        let scope = self.scope.borrow().clone();
        let pointers = self.tracker.store().list_all(&scope);
        let mut report = TickReport {
            pointers: pointers.len(),
            ..TickReport::default()
        };

        for job in pointers {
            if self.tracker.is_watching(&job.job_id) {
                report.watched += 1;
                continue;
            }

            match self.tracker.source().fetch_status(&job).await {
                Ok(status) => {
                    if let Some(outcome) = status.into_outcome() {
                        if self.tracker.settle(&scope, &job, &outcome) {
                            report.settled += 1;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        job_id = %job.job_id,
                        domain = %job.domain,
                        error = %e,
                        "Supervisor status check failed",
                    );
                }
            }
        }

        report
    }
}
