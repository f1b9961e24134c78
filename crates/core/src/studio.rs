//! Studio catalog: per-domain presentation of job outcomes.
//!
//! Each job domain corresponds to a studio page. This module decides how a
//! finished or failed job is described to the user (title, message, source
//! label) and where the notification's primary action navigates.

use serde_json::Value;

use crate::job::JobReference;
use crate::results::result_count;

// ---------------------------------------------------------------------------
// Domain, subkey and action constants
// ---------------------------------------------------------------------------

/// Lookbook photoshoots, one session per mode.
pub const DOMAIN_LOOKBOOK: &str = "lookbook";

/// Scene edits (model or location).
pub const DOMAIN_SCENE: &str = "scene";

/// Video renders and merges.
pub const DOMAIN_VIDEO: &str = "video";

/// Scene subkey for the model panel.
pub const SUBKEY_MODEL: &str = "model";

/// Scene subkey for the location panel.
pub const SUBKEY_LOCATION: &str = "location";

/// Default lookbook mode.
pub const MODE_TORSO: &str = "TORSO";

/// Plain generation.
pub const ACTION_GENERATE: &str = "generate";

/// Apply extra details to an existing scene image.
pub const ACTION_APPLY_DETAILS: &str = "applyDetails";

/// Merge several video clips.
pub const ACTION_MERGE: &str = "merge";

/// Navigation target used when a domain has no page of its own.
pub const ROUTE_STUDIOS: &str = "/studios";

/// Message used when the engine reports an error without text.
pub const GENERIC_ERROR_MESSAGE: &str = "Could not complete the generation.";

// ---------------------------------------------------------------------------
// Labels and routes
// ---------------------------------------------------------------------------

/// Human-readable studio name for a domain.
pub fn studio_label(domain: &str) -> String {
    match domain.to_ascii_lowercase().as_str() {
        DOMAIN_LOOKBOOK => "Lookbook".to_string(),
        DOMAIN_SCENE => "Scene".to_string(),
        DOMAIN_VIDEO => "Video".to_string(),
        "" => "Studio".to_string(),
        _ => domain.to_string(),
    }
}

/// Label shown on a notification to say where the job ran, e.g.
/// `"Lookbook · TORSO"`.
pub fn source_label(job: &JobReference) -> String {
    let studio = studio_label(&job.domain);
    let subkey = job.subkey.trim();
    if subkey.is_empty() {
        studio
    } else {
        format!("{studio} · {}", subkey.to_uppercase())
    }
}

/// Route the notification's primary action opens.
pub fn navigation_target(job: &JobReference) -> String {
    match job.domain.to_ascii_lowercase().as_str() {
        DOMAIN_LOOKBOOK => {
            let mode = job.subkey.trim();
            let mode = if mode.is_empty() { MODE_TORSO } else { mode };
            format!("/studio/lookbook?mode={}", mode.to_uppercase())
        }
        DOMAIN_SCENE => "/scene".to_string(),
        DOMAIN_VIDEO => "/video".to_string(),
        _ => ROUTE_STUDIOS.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Notification text
// ---------------------------------------------------------------------------

/// Title and body of a job notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeText {
    pub title: String,
    pub message: String,
}

impl NoticeText {
    fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Describe a successfully finished job.
///
/// `reported_action` is the action the engine returned with the status; it
/// applies only when the reference itself carries no action (legacy
/// pointers store a bare job id).
pub fn done_text(job: &JobReference, result: &Value, reported_action: Option<&str>) -> NoticeText {
    let action = match job.action.trim() {
        "" => reported_action.unwrap_or_default(),
        own => own,
    };
    match job.domain.to_ascii_lowercase().as_str() {
        DOMAIN_LOOKBOOK => {
            let count = result_count(result);
            let message = if count > 0 {
                format!("Frames ready: {count}")
            } else {
                "Open the studio to see the results.".to_string()
            };
            NoticeText::new("Photoshoot ready", message)
        }
        DOMAIN_SCENE => {
            let applied = is_apply_action(action);
            let title = match (job.subkey.to_ascii_lowercase().as_str(), applied) {
                (SUBKEY_MODEL, true) => "Model details applied",
                (SUBKEY_MODEL, false) => "Model ready",
                (SUBKEY_LOCATION, true) => "Location details applied",
                (SUBKEY_LOCATION, false) => "Location ready",
                _ => "Scene ready",
            };
            NoticeText::new(title, "Done. Open the scene editor.")
        }
        DOMAIN_VIDEO => {
            let title = if action.eq_ignore_ascii_case(ACTION_MERGE) {
                "Video merged"
            } else {
                "Video ready"
            };
            NoticeText::new(title, "Done. Open the video studio.")
        }
        _ => NoticeText::new("Generation ready", "Open the result."),
    }
}

/// Describe a failed job, preferring the engine's own message.
pub fn error_text(job: &JobReference, message: Option<&str>) -> NoticeText {
    let (title, fallback) = match job.domain.to_ascii_lowercase().as_str() {
        DOMAIN_LOOKBOOK => ("Generation failed", "Photoshoot failed."),
        DOMAIN_SCENE => ("Scene error", "Scene generation failed."),
        DOMAIN_VIDEO => ("Video error", "Could not render the video."),
        _ => ("Generation failed", GENERIC_ERROR_MESSAGE),
    };

    let message = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback);

    NoticeText::new(title, message)
}

fn is_apply_action(action: &str) -> bool {
    action.to_ascii_lowercase().contains("apply")
}
