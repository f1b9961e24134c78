//! In-process notification bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`NotificationBus`] is the central publish/subscribe hub for
//! [`NotificationItem`]s. Besides fanning items out to subscribers it keeps
//! the inbox of *active* items: at most `capacity` of them, each removed
//! when its ttl elapses, when it is dismissed, or when a newer item evicts
//! it. An id that is still active cannot be published again.
//!
//! The bus is cheap to clone; all clones share the same inbox.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::notification::{NotificationItem, NotificationAction};

/// Default number of simultaneously active notifications.
pub const DEFAULT_INBOX_CAPACITY: usize = 4;

/// Buffer capacity for the broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why an item left the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Expired,
    Dismissed,
    Evicted,
    ActionInvoked,
}

/// What subscribers receive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Published(NotificationItem),
    Removed { id: String, reason: RemovalReason },
}

/// Effect of invoking a notification action, to be carried out by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEffect {
    /// Navigate to the given route.
    Navigate(String),
    /// Nothing beyond the optional dismissal.
    None,
}

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// Process-wide notification hub.
///
/// # Usage
///
/// ```rust
/// use pstudio_events::{NotificationBus, NotificationItem, NotificationKind};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = NotificationBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(NotificationItem::new(NotificationKind::Info, "Hello").with_id("greeting"));
/// # drop(rx.try_recv());
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<Inner>,
}

struct Inner {
    sender: broadcast::Sender<NotificationEvent>,
    inbox: Mutex<VecDeque<ActiveItem>>,
    capacity: usize,
}

/// Inbox entry; newest entries sit at the front.
struct ActiveItem {
    item: NotificationItem,
    expiry: Option<AbortHandle>,
}

impl NotificationBus {
    /// Create a bus that keeps at most `capacity` active items.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                sender,
                inbox: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Subscribe to every publish and removal on this bus.
    ///
    /// Dropping the receiver unsubscribes. Events published before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.sender.subscribe()
    }

    /// Publish an item to all current subscribers.
    ///
    /// Returns `false` without side effects when an item with the same id
    /// is still active. Items without an id get a random one.
    pub fn publish(&self, mut item: NotificationItem) -> bool {
        if item.id.trim().is_empty() {
            item.id = format!("n_{}", uuid::Uuid::new_v4().simple());
        }

        let evicted = {
            let mut inbox = self.inner.lock_inbox();
            if inbox.iter().any(|a| a.item.id == item.id) {
                tracing::debug!(id = %item.id, "Notification already active, skipping");
                return false;
            }

            let expiry = self.schedule_expiry(&item);
            inbox.push_front(ActiveItem {
                item: item.clone(),
                expiry,
            });

            let mut evicted = Vec::new();
            while inbox.len() > self.inner.capacity {
                if let Some(oldest) = inbox.pop_back() {
                    if let Some(handle) = &oldest.expiry {
                        handle.abort();
                    }
                    evicted.push(oldest.item.id);
                }
            }
            evicted
        };

        tracing::debug!(id = %item.id, kind = ?item.kind, "Notification published");
        // A SendError only means there are zero receivers.
        let _ = self.inner.sender.send(NotificationEvent::Published(item));
        for id in evicted {
            let _ = self.inner.sender.send(NotificationEvent::Removed {
                id,
                reason: RemovalReason::Evicted,
            });
        }
        true
    }

    /// Remove an active item before its ttl elapses.
    pub fn dismiss(&self, id: &str) -> bool {
        self.inner.remove(id, RemovalReason::Dismissed)
    }

    /// Run the action at `index` of the active item `id`.
    ///
    /// Returns the effect for the caller to carry out, or `None` if the
    /// item or action does not exist. The item is dismissed unless the
    /// action is marked to keep it open.
    pub fn invoke_action(&self, id: &str, index: usize) -> Option<ActionEffect> {
        let action: NotificationAction = {
            let inbox = self.inner.lock_inbox();
            let active = inbox.iter().find(|a| a.item.id == id)?;
            active.item.actions.get(index)?.clone()
        };

        if action.close_on_invoke {
            self.inner.remove(id, RemovalReason::ActionInvoked);
        }

        Some(match action.target {
            Some(target) => ActionEffect::Navigate(target),
            None => ActionEffect::None,
        })
    }

    /// Snapshot of the active items, newest first.
    pub fn active(&self) -> Vec<NotificationItem> {
        self.inner
            .lock_inbox()
            .iter()
            .map(|a| a.item.clone())
            .collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.inner.lock_inbox().iter().any(|a| a.item.id == id)
    }

    // ---- private helpers ----

    /// Spawn the removal timer for an item.
    ///
    /// Outside a Tokio runtime no timer can run; the item then stays until
    /// it is dismissed or evicted.
    fn schedule_expiry(&self, item: &NotificationItem) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(id = %item.id, "No runtime available, notification will not expire");
            return None;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = item.id.clone();
        let ttl = item.remaining_ttl();

        let task = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                inner.remove(&id, RemovalReason::Expired);
            }
        });
        Some(task.abort_handle())
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_INBOX_CAPACITY)
    }
}

impl Inner {
    fn lock_inbox(&self) -> MutexGuard<'_, VecDeque<ActiveItem>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: &str, reason: RemovalReason) -> bool {
        let removed = {
            let mut inbox = self.lock_inbox();
            let Some(pos) = inbox.iter().position(|a| a.item.id == id) else {
                return false;
            };
            inbox.remove(pos)
        };

        if let Some(active) = removed {
            if let Some(handle) = active.expiry {
                handle.abort();
            }
            tracing::debug!(id, ?reason, "Notification removed");
            let _ = self.sender.send(NotificationEvent::Removed {
                id: id.to_string(),
                reason,
            });
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::notification::NotificationKind;

    fn item(id: &str) -> NotificationItem {
        NotificationItem::new(NotificationKind::Info, "title").with_id(id)
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        assert!(bus.publish(item("a").with_message("hello")));

        let event = rx.recv().await.expect("should receive the event");
        assert_matches!(event, NotificationEvent::Published(ref n) if n.id == "a" && n.message == "hello");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_item() {
        let bus = NotificationBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(item("multi"));

        assert_matches!(rx1.recv().await, Ok(NotificationEvent::Published(n)) if n.id == "multi");
        assert_matches!(rx2.recv().await, Ok(NotificationEvent::Published(n)) if n.id == "multi");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_legal() {
        let bus = NotificationBus::default();
        assert!(bus.publish(item("orphan")));
        assert!(bus.is_active("orphan"));
    }

    #[tokio::test]
    async fn duplicate_active_id_is_ignored() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        assert!(bus.publish(item("job_done:1")));
        assert!(!bus.publish(item("job_done:1")));

        assert_matches!(rx.try_recv(), Ok(NotificationEvent::Published(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.active().len(), 1);
    }

    #[tokio::test]
    async fn missing_id_is_generated() {
        let bus = NotificationBus::default();
        bus.publish(NotificationItem::new(NotificationKind::Info, "anon"));
        let active = bus.active();
        assert!(active[0].id.starts_with("n_"));
    }

    #[tokio::test]
    async fn oldest_item_is_evicted_beyond_capacity() {
        let bus = NotificationBus::new(2);
        let mut rx = bus.subscribe();

        bus.publish(item("1"));
        bus.publish(item("2"));
        bus.publish(item("3"));

        let ids: Vec<_> = bus.active().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["3", "2"]);

        let mut removed = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let NotificationEvent::Removed { id, reason } = event {
                removed.push((id, reason));
            }
        }
        assert_eq!(removed, vec![("1".to_string(), RemovalReason::Evicted)]);
    }

    #[tokio::test(start_paused = true)]
    async fn item_expires_after_ttl() {
        let bus = NotificationBus::default();
        bus.publish(item("ttl").with_ttl(Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(bus.is_active("ttl"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!bus.is_active("ttl"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_id_can_be_published_again() {
        let bus = NotificationBus::default();
        bus.publish(item("again").with_ttl(Duration::from_secs(2)));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(bus.publish(item("again")));
    }

    #[tokio::test]
    async fn dismiss_removes_item() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();
        bus.publish(item("d"));

        assert!(bus.dismiss("d"));
        assert!(!bus.dismiss("d"));

        let _ = rx.recv().await;
        assert_matches!(
            rx.recv().await,
            Ok(NotificationEvent::Removed { reason: RemovalReason::Dismissed, .. })
        );
    }

    #[tokio::test]
    async fn invoking_navigation_action_dismisses() {
        let bus = NotificationBus::default();
        bus.publish(
            item("nav")
                .with_action(NotificationAction::new("Open").primary().navigate_to("/scene"))
                .with_action(NotificationAction::new("Close")),
        );

        let effect = bus.invoke_action("nav", 0);
        assert_eq!(effect, Some(ActionEffect::Navigate("/scene".into())));
        assert!(!bus.is_active("nav"));
    }

    #[tokio::test]
    async fn keep_open_action_leaves_item() {
        let bus = NotificationBus::default();
        bus.publish(item("keep").with_action(NotificationAction::new("Details").keep_open()));

        assert_eq!(bus.invoke_action("keep", 0), Some(ActionEffect::None));
        assert!(bus.is_active("keep"));
        assert_eq!(bus.invoke_action("keep", 5), None);
        assert_eq!(bus.invoke_action("missing", 0), None);
    }
}
