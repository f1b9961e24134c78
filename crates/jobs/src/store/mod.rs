//! Persistent job pointer storage.
//!
//! [`PointerStore`] maps `(account scope, domain, subkey)` to the job that
//! is currently running there, on top of a pluggable [`StorageBackend`].

pub mod backend;
pub mod pointer;

pub use backend::{FileBackend, MemoryBackend, StorageBackend, StorageError};
pub use pointer::PointerStore;
