//! Job lifecycle engine for the photo studio.
//!
//! Tracks long-running generation jobs executed by the remote engine:
//! persists a pointer per `(scope, domain, subkey)` so jobs survive
//! restarts, polls status until a terminal state, and publishes exactly one
//! notification per finished job on the [`NotificationBus`].
//!
//! - [`JobTracker`]: the entry point with `track`, `resume`, `settle`.
//! - [`Supervisor`]: background reconciliation of unwatched pointers.
//! - [`PointerStore`]: durable pointers over a [`StorageBackend`].
//! - [`StatusSource`] / [`HttpStatusClient`]: remote status queries.
//! - [`FetchGuard`]: stale-response protection for re-fetched resources.
//!
//! [`NotificationBus`]: pstudio_events::NotificationBus

pub mod config;
pub mod guard;
pub mod http;
pub mod notice;
pub mod status;
pub mod store;
pub mod supervisor;
pub mod tracker;
pub mod watcher;

pub use config::{ConfigError, TrackerConfig};
pub use guard::{FetchGuard, Generation};
pub use http::HttpStatusClient;
pub use status::{StatusSource, TransportError};
pub use store::{FileBackend, MemoryBackend, PointerStore, StorageBackend, StorageError};
pub use supervisor::{Supervisor, TickReport};
pub use tracker::JobTracker;
pub use watcher::{JobCallbacks, WatcherHandle, WatcherState};
