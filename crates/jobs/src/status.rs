//! Remote job status: the collaborator contract and its wire format.
//!
//! The engine exposes one status shape for every job domain:
//!
//! ```json
//! { "ok": true, "job": { "state": "running", "progress": 15, "result": null, "error": null, "action": "merge" } }
//! ```
//!
//! A bare `{ "state": ... }` body (no `job` envelope) is accepted as well.

use async_trait::async_trait;
use pstudio_core::job::{JobReference, JobStatus};
use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// A status query that did not produce a job status.
///
/// Always transient from the watcher's point of view: it is retried and
/// never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The status endpoint returned a non-2xx status code.
    #[error("Status endpoint returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was not a recognizable job status.
    #[error("Malformed status response: {0}")]
    Decode(String),

    /// The source could not be reached for another reason.
    #[error("Status source unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// StatusSource
// ---------------------------------------------------------------------------

/// Anything that can report the current status of a remote job.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job: &JobReference) -> Result<JobStatus, TransportError>;
}

// ---------------------------------------------------------------------------
// Wire decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireJob {
    state: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    action: Option<String>,
}

/// Decode a status response body into a [`JobStatus`].
///
/// Unknown states are treated as still running so that a newer engine
/// state never ends observation early.
pub fn decode_status(body: &Value) -> Result<JobStatus, TransportError> {
    let job = match body.get("job") {
        Some(job) if job.is_object() => job,
        Some(_) => return Err(TransportError::Decode("`job` is not an object".into())),
        None => body,
    };

    let wire: WireJob =
        serde_json::from_value(job.clone()).map_err(|e| TransportError::Decode(e.to_string()))?;

    let progress = wire
        .progress
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0) as u8);

    let status = match wire.state.trim().to_ascii_lowercase().as_str() {
        "queued" => JobStatus::Queued { progress },
        "running" => JobStatus::Running { progress },
        "done" => JobStatus::Done {
            result: wire.result.unwrap_or(Value::Null),
            action: wire.action.filter(|a| !a.trim().is_empty()),
        },
        "error" => JobStatus::Error {
            message: wire.error.and_then(error_text),
        },
        other => {
            tracing::debug!(state = other, "Unknown job state, treating as running");
            JobStatus::Running { progress }
        }
    };

    Ok(status)
}

fn error_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
