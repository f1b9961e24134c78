//! Notifications for terminal job outcomes.
//!
//! The notification id is derived from the job id, so every observer of
//! the same outcome produces the same id and the bus delivers it once.

use std::time::Duration;

use pstudio_core::job::{JobOutcome, JobReference};
use pstudio_core::studio::{done_text, error_text, navigation_target, source_label};
use pstudio_events::{NotificationAction, NotificationItem, NotificationKind};

/// How long a success notification stays up.
pub const SUCCESS_TTL: Duration = Duration::from_secs(11);

/// How long an error notification stays up.
pub const ERROR_TTL: Duration = Duration::from_secs(14);

pub fn done_notification_id(job_id: &str) -> String {
    format!("job_done:{job_id}")
}

pub fn error_notification_id(job_id: &str) -> String {
    format!("job_err:{job_id}")
}

/// Build the single notification announcing how `job` ended.
pub fn job_notification(job: &JobReference, outcome: &JobOutcome) -> NotificationItem {
    let (id, kind, text, ttl) = match outcome {
        JobOutcome::Done { result, .. } => (
            done_notification_id(&job.job_id),
            NotificationKind::Success,
            done_text(job, result, outcome.reported_action()),
            SUCCESS_TTL,
        ),
        JobOutcome::Failed(_) => (
            error_notification_id(&job.job_id),
            NotificationKind::Error,
            error_text(job, outcome.error_message()),
            ERROR_TTL,
        ),
    };

    NotificationItem::new(kind, text.title)
        .with_id(id)
        .with_message(text.message)
        .with_source(source_label(job))
        .with_action(
            NotificationAction::new("Open")
                .primary()
                .navigate_to(navigation_target(job)),
        )
        .with_action(NotificationAction::new("Close"))
        .with_ttl(ttl)
}
