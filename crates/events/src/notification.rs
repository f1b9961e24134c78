//! User-visible notification items.

use std::time::Duration;

use chrono::Utc;
use pstudio_core::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifetime of a notification when none is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(9);

/// Notifications never disappear faster than this.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Visual flavour of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

// ---------------------------------------------------------------------------
// NotificationAction
// ---------------------------------------------------------------------------

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub label: String,
    /// Rendered as the main call to action.
    pub primary: bool,
    /// Route to navigate to; `None` means the action only closes the item.
    pub target: Option<String>,
    /// Whether invoking the action also dismisses the notification.
    pub close_on_invoke: bool,
}

impl NotificationAction {
    /// A secondary action that just closes the notification.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            primary: false,
            target: None,
            close_on_invoke: true,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn navigate_to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Keep the notification open after the action runs.
    pub fn keep_open(mut self) -> Self {
        self.close_on_invoke = false;
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationItem
// ---------------------------------------------------------------------------

/// A notification shown to the user until it expires or is dismissed.
///
/// Constructed via [`NotificationItem::new`] and enriched with the builder
/// methods. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    /// Deduplication key. Empty ids are replaced on publish.
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Where the notification came from, e.g. `"Lookbook · TORSO"`.
    pub source: Option<String>,
    pub actions: Vec<NotificationAction>,
    pub created_at: Timestamp,
    /// Lifetime in milliseconds, measured from `created_at`.
    pub ttl_ms: u64,
}

impl NotificationItem {
    /// Create an item with the default ttl and no id, message or actions.
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            title: title.into(),
            message: String::new(),
            source: None,
            actions: Vec::new(),
            created_at: Utc::now(),
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Configured lifetime, clamped to [`MIN_TTL`].
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms).max(MIN_TTL)
    }

    /// Time left before the item expires, never less than [`MIN_TTL`].
    pub fn remaining_ttl(&self) -> Duration {
        let elapsed = (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.ttl().saturating_sub(elapsed).max(MIN_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let item = NotificationItem::new(NotificationKind::Info, "Hello");
        assert!(item.id.is_empty());
        assert!(item.source.is_none());
        assert!(item.actions.is_empty());
        assert_eq!(item.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn ttl_is_clamped() {
        let item = NotificationItem::new(NotificationKind::Info, "x").with_ttl(Duration::from_millis(10));
        assert_eq!(item.ttl(), MIN_TTL);
        assert_eq!(item.remaining_ttl(), MIN_TTL);
    }

    #[test]
    fn old_items_keep_min_ttl() {
        let mut item = NotificationItem::new(NotificationKind::Error, "late");
        item.created_at = Utc::now() - chrono::Duration::seconds(60);
        assert_eq!(item.remaining_ttl(), MIN_TTL);
    }

    #[test]
    fn action_builder() {
        let action = NotificationAction::new("Open").primary().navigate_to("/scene").keep_open();
        assert!(action.primary);
        assert_eq!(action.target.as_deref(), Some("/scene"));
        assert!(!action.close_on_invoke);
    }

    #[test]
    fn serializes_camel_case() {
        let item = NotificationItem::new(NotificationKind::Success, "Done").with_id("job_done:1");
        let json = serde_json::to_value(&item).expect("item serializes");
        assert_eq!(json["kind"], "success");
        assert_eq!(json["ttlMs"], 9000);
        assert!(json.get("createdAt").is_some());
    }
}
