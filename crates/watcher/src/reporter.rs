//! Logs every notification the bus delivers.
//!
//! The daemon has no screen; [`NotificationReporter`] is its toast layer.
//! It subscribes to the [`NotificationBus`](pstudio_events::NotificationBus)
//! and turns each published item into one structured log line.

use pstudio_events::{NotificationEvent, NotificationItem, NotificationKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Background service that reports notifications through `tracing`.
pub struct NotificationReporter;

impl NotificationReporter {
    /// Run until `cancel` fires or the bus is dropped. Returns the number of
    /// notifications reported.
    pub async fn run(
        mut receiver: broadcast::Receiver<NotificationEvent>,
        cancel: CancellationToken,
    ) -> usize {
        let mut reported = 0;
        loop {
            // Buffered notifications are logged before honouring shutdown.
            let event = tokio::select! {
                biased;
                event = receiver.recv() => event,
                _ = cancel.cancelled() => break,
            };

            match event {
                Ok(NotificationEvent::Published(item)) => {
                    Self::report(&item);
                    reported += 1;
                }
                Ok(NotificationEvent::Removed { id, reason }) => {
                    tracing::debug!(id = %id, ?reason, "Notification removed");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification reporter lagged, some notifications were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification bus closed, reporter shutting down");
                    break;
                }
            }
        }
        reported
    }

    fn report(item: &NotificationItem) {
        let route = item.actions.iter().find_map(|a| a.target.as_deref());
        match item.kind {
            NotificationKind::Error => tracing::warn!(
                id = %item.id,
                source = item.source.as_deref(),
                route,
                "{}",
                summary(item),
            ),
            NotificationKind::Success | NotificationKind::Info => tracing::info!(
                id = %item.id,
                source = item.source.as_deref(),
                route,
                "{}",
                summary(item),
            ),
        }
    }
}

/// One-line rendering of a notification, e.g.
/// `"Photoshoot ready: Frames ready: 2 (Lookbook · TORSO)"`.
pub fn summary(item: &NotificationItem) -> String {
    let mut line = item.title.clone();
    if !item.message.is_empty() {
        line.push_str(": ");
        line.push_str(&item.message);
    }
    if let Some(source) = item.source.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!(" ({source})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use pstudio_events::NotificationBus;

    use super::*;

    #[test]
    fn summary_includes_message_and_source() {
        let item = NotificationItem::new(NotificationKind::Success, "Photoshoot ready")
            .with_message("Frames ready: 2")
            .with_source("Lookbook · TORSO");
        assert_eq!(summary(&item), "Photoshoot ready: Frames ready: 2 (Lookbook · TORSO)");

        let bare = NotificationItem::new(NotificationKind::Info, "Hello");
        assert_eq!(summary(&bare), "Hello");
    }

    #[tokio::test]
    async fn counts_published_items_until_cancelled() {
        let bus = NotificationBus::default();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(NotificationReporter::run(bus.subscribe(), cancel.clone()));

        bus.publish(NotificationItem::new(NotificationKind::Success, "a").with_id("a"));
        bus.publish(NotificationItem::new(NotificationKind::Error, "b").with_id("b"));
        bus.dismiss("a");
        tokio::task::yield_now().await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), 2);
    }
}
