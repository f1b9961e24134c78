//! Stale-response protection for re-fetched resources.
//!
//! When a resource (e.g. the lookbook session of the selected mode) is
//! fetched again before the previous request returned, the slower answer
//! must not overwrite the newer state. [`FetchGuard`] hands out a
//! generation per request; only the most recently *issued* generation may
//! apply its response.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generation captured when a read was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic generation counter for one logical resource.
#[derive(Debug, Default)]
pub struct FetchGuard {
    current: AtomicU64,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new read. Every earlier generation becomes stale.
    pub fn issue(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// True iff no read was issued after `generation`.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current.load(Ordering::Acquire) == generation.0
    }

    /// Issue a generation, await `fetch`, and return its output only if no
    /// newer read was issued meanwhile.
    pub async fn guard<F, T>(&self, fetch: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let generation = self.issue();
        let output = fetch.await;
        if self.is_current(generation) {
            Some(output)
        } else {
            tracing::debug!(generation = generation.value(), "Discarding stale response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_issue_is_current() {
        let guard = FetchGuard::new();
        let g1 = guard.issue();
        assert!(guard.is_current(g1));

        let g2 = guard.issue();
        assert!(!guard.is_current(g1));
        assert!(guard.is_current(g2));
        assert!(g2 > g1);
    }

    #[tokio::test]
    async fn guard_returns_output_when_uncontested() {
        let guard = FetchGuard::new();
        assert_eq!(guard.guard(async { 7 }).await, Some(7));
    }
}
