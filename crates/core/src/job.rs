//! Job references and remote job status.
//!
//! A [`JobReference`] is the client's handle on a job executed by the
//! remote generation engine. [`JobStatus`] is what the engine reports when
//! polled; the client never writes it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobReference
// ---------------------------------------------------------------------------

/// Pointer to a job running on the remote engine.
///
/// Immutable once created. Launching a new job for the same
/// `(domain, subkey)` produces a new reference that supersedes this one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    /// Job family, e.g. `"lookbook"`, `"scene"`, `"video"`.
    pub domain: String,
    /// Sub-resource within the domain, e.g. a mode (`"TORSO"`) or an edited
    /// field (`"model"`).
    pub subkey: String,
    /// Engine-assigned job identifier.
    pub job_id: String,
    /// What completing the job should do, e.g. `"generate"`, `"applyDetails"`.
    #[serde(default)]
    pub action: String,
}

impl JobReference {
    /// Create a reference with an empty action hint.
    pub fn new(
        domain: impl Into<String>,
        subkey: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            subkey: subkey.into(),
            job_id: job_id.into(),
            action: String::new(),
        }
    }

    /// Set the action hint.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// True when the same `(domain, subkey)` slot is addressed.
    pub fn same_slot(&self, other: &JobReference) -> bool {
        self.domain == other.domain && self.subkey == other.subkey
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Coarse job state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    /// `done` and `error` are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

/// Remote job status including the payload of terminal states.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Queued { progress: Option<u8> },
    Running { progress: Option<u8> },
    Done {
        result: serde_json::Value,
        /// Action the engine recorded for the job, if it reports one.
        action: Option<String>,
    },
    Error { message: Option<String> },
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            JobStatus::Queued { .. } => JobState::Queued,
            JobStatus::Running { .. } => JobState::Running,
            JobStatus::Done { .. } => JobState::Done,
            JobStatus::Error { .. } => JobState::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Reported completion percentage for non-terminal states.
    pub fn progress(&self) -> Option<u8> {
        match self {
            JobStatus::Queued { progress } | JobStatus::Running { progress } => *progress,
            _ => None,
        }
    }

    /// Terminal projection of this status, `None` while the job is pending.
    pub fn into_outcome(self) -> Option<JobOutcome> {
        match self {
            JobStatus::Done { result, action } => Some(JobOutcome::Done { result, action }),
            JobStatus::Error { message } => Some(JobOutcome::Failed(message)),
            JobStatus::Queued { .. } | JobStatus::Running { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobOutcome
// ---------------------------------------------------------------------------

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The engine finished and produced an opaque result payload.
    Done {
        result: serde_json::Value,
        /// Server-reported action; used when the reference carries none.
        action: Option<String>,
    },
    /// The engine reported a job-level error, with its message if any.
    Failed(Option<String>),
}

impl JobOutcome {
    /// Successful outcome without a server-reported action.
    pub fn done(result: serde_json::Value) -> Self {
        JobOutcome::Done {
            result,
            action: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Done { .. })
    }

    /// Server-reported action of a successful outcome, ignoring blanks.
    pub fn reported_action(&self) -> Option<&str> {
        match self {
            JobOutcome::Done {
                action: Some(action),
                ..
            } => Some(action.trim()).filter(|a| !a.is_empty()),
            _ => None,
        }
    }

    /// Server-provided error message, ignoring blank strings.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobOutcome::Failed(Some(msg)) if !msg.trim().is_empty() => Some(msg.trim()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn pending_status_has_no_outcome() {
        let status = JobStatus::Running { progress: Some(40) };
        assert_eq!(status.progress(), Some(40));
        assert!(status.into_outcome().is_none());
    }

    #[test]
    fn error_status_becomes_failed_outcome() {
        let status = JobStatus::Error {
            message: Some("engine overloaded".into()),
        };
        let outcome = status.into_outcome();
        assert_matches!(outcome, Some(JobOutcome::Failed(Some(ref m))) if m == "engine overloaded");
    }

    #[test]
    fn done_status_keeps_reported_action() {
        let status = JobStatus::Done {
            result: serde_json::Value::Null,
            action: Some("merge".into()),
        };
        let outcome = status.into_outcome().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.reported_action(), Some("merge"));
        assert_eq!(JobOutcome::done(serde_json::Value::Null).reported_action(), None);
    }

    #[test]
    fn blank_error_message_is_ignored() {
        let outcome = JobOutcome::Failed(Some("  ".into()));
        assert_eq!(outcome.error_message(), None);
        assert!(!outcome.is_success());
    }

    #[test]
    fn reference_serializes_camel_case() {
        let job = JobReference::new("scene", "model", "sc_1").with_action("applyDetails");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["jobId"], "sc_1");
        assert_eq!(json["action"], "applyDetails");
    }

    #[test]
    fn same_slot_ignores_job_id() {
        let a = JobReference::new("lookbook", "TORSO", "1");
        let b = JobReference::new("lookbook", "TORSO", "2");
        let c = JobReference::new("lookbook", "LEGS", "1");
        assert!(a.same_slot(&b));
        assert!(!a.same_slot(&c));
    }
}
