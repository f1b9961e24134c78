//! Photo-studio notification infrastructure.
//!
//! - [`NotificationBus`]: process-wide publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, with a bounded, self-expiring inbox of
//!   active notifications deduplicated by id.
//! - [`NotificationItem`]: a user-visible notification (toast).

pub mod bus;
pub mod notification;

pub use bus::{ActionEffect, NotificationBus, NotificationEvent, RemovalReason};
pub use notification::{NotificationAction, NotificationItem, NotificationKind};
