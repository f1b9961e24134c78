//! The headless watcher daemon.
//!
//! Wires a [`JobTracker`] from configuration, then runs two background
//! services until shutdown: the [`Supervisor`](pstudio_jobs::Supervisor),
//! which settles every stored job of the configured account scope, and the
//! [`NotificationReporter`], which logs each resulting notification.

use std::time::Duration;

use pstudio_core::types::AccountScope;
use pstudio_jobs::{JobTracker, TrackerConfig, TransportError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::reporter::NotificationReporter;

/// How long shutdown waits for the background services.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Totals reported when the daemon stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonSummary {
    /// Notifications logged while running.
    pub notifications: usize,
}

pub struct Daemon {
    tracker: JobTracker,
    scope_tx: watch::Sender<AccountScope>,
}

impl Daemon {
    /// Build the tracker and its services from configuration.
    pub fn new(config: &TrackerConfig) -> Result<Self, TransportError> {
        let tracker = JobTracker::from_config(config)?;
        let (scope_tx, _) = watch::channel(config.account_scope.clone());
        Ok(Self { tracker, scope_tx })
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Switch the observed account scope (e.g. after sign-in).
    pub fn set_scope(&self, scope: AccountScope) {
        tracing::info!(scope = %scope, "Switching account scope");
        self.scope_tx.send_replace(scope);
    }

    /// Run until `cancel` fires, then stop the services and any watcher.
    pub async fn run(&self, cancel: CancellationToken) -> DaemonSummary {
        let reporter_cancel = cancel.child_token();
        let reporter = tokio::spawn(NotificationReporter::run(
            self.tracker.bus().subscribe(),
            reporter_cancel.clone(),
        ));

        let supervisor = self.tracker.supervisor(self.scope_tx.subscribe());
        supervisor.run(cancel.clone()).await;

        self.tracker.cancel_all();
        reporter_cancel.cancel();

        let notifications = match tokio::time::timeout(SHUTDOWN_GRACE, reporter).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Notification reporter task failed");
                0
            }
            Err(_) => {
                tracing::warn!("Notification reporter did not stop in time");
                0
            }
        };

        tracing::info!(notifications, "Watcher daemon stopped");
        DaemonSummary { notifications }
    }
}
