//! The job tracker: the entry point the UI layer talks to.
//!
//! Owns the pointer store, the notification bus, the status source, the
//! registry of live watchers and the record of settled jobs. Watchers and
//! the supervisor both funnel terminal outcomes through [`JobTracker::settle`],
//! which is what guarantees a single notification per job.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pstudio_core::job::{JobOutcome, JobReference};
use pstudio_core::types::AccountScope;
use pstudio_events::NotificationBus;
use tokio::sync::watch;

use crate::config::TrackerConfig;
use crate::http::HttpStatusClient;
use crate::notice::job_notification;
use crate::status::{StatusSource, TransportError};
use crate::store::{FileBackend, PointerStore};
use crate::supervisor::Supervisor;
use crate::watcher::{spawn_watcher, JobCallbacks, OutcomeSink, WatcherContext, WatcherHandle};

/// Default delay between two status queries of one job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Settled job ids remembered for deduplication; oldest forgotten first.
const SETTLED_HISTORY_LIMIT: usize = 1024;

/// Façade over the job lifecycle services. Cheap to clone.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

pub(crate) struct TrackerInner {
    store: Arc<PointerStore>,
    bus: NotificationBus,
    source: Arc<dyn StatusSource>,
    poll_interval: Duration,
    registry: Mutex<Registry>,
    settled: Mutex<SettledJobs>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Live watchers by job id.
    by_job: HashMap<String, WatcherHandle>,
    /// Job id currently watched in each slot.
    by_slot: HashMap<SlotKey, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    scope: AccountScope,
    domain: String,
    subkey: String,
}

impl SlotKey {
    fn of(scope: &AccountScope, job: &JobReference) -> Self {
        Self {
            scope: scope.clone(),
            domain: job.domain.clone(),
            subkey: job.subkey.clone(),
        }
    }
}

#[derive(Default)]
struct SettledJobs {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SettledJobs {
    /// Record `job_id`; returns `false` if it was already recorded.
    fn insert(&mut self, job_id: &str) -> bool {
        if !self.ids.insert(job_id.to_string()) {
            return false;
        }
        self.order.push_back(job_id.to_string());
        while self.order.len() > SETTLED_HISTORY_LIMIT {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }
}

impl JobTracker {
    pub fn new(
        store: Arc<PointerStore>,
        bus: NotificationBus,
        source: Arc<dyn StatusSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                store,
                bus,
                source,
                poll_interval,
                registry: Mutex::new(Registry::default()),
                settled: Mutex::new(SettledJobs::default()),
            }),
        }
    }

    /// Build the production wiring from configuration: a file-backed
    /// pointer store when a path is configured, an HTTP status client and a
    /// bus with the configured inbox capacity.
    ///
    /// An unreadable pointer file degrades to an in-memory store.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TransportError> {
        let store = match &config.pointer_store_path {
            Some(path) => match FileBackend::open(path) {
                Ok(backend) => PointerStore::new(Arc::new(backend)),
                Err(e) => {
                    tracing::warn!(error = %e, "Pointer file unusable, falling back to memory");
                    PointerStore::in_memory()
                }
            },
            None => PointerStore::in_memory(),
        };

        let source = HttpStatusClient::new(&config.api_base_url, config.request_timeout)?;

        Ok(Self::new(
            Arc::new(store),
            NotificationBus::new(config.inbox_capacity),
            Arc::new(source),
            config.poll_interval,
        ))
    }

    pub fn store(&self) -> &PointerStore {
        &self.inner.store
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    pub(crate) fn source(&self) -> &dyn StatusSource {
        self.inner.source.as_ref()
    }

    /// Start observing a freshly launched job.
    ///
    /// Persists the pointer (best effort) so the job can be resumed after a
    /// restart, cancels the watcher of an older job in the same slot, and
    /// starts polling.
    pub fn track(
        &self,
        scope: &AccountScope,
        job: JobReference,
        callbacks: JobCallbacks,
    ) -> WatcherHandle {
        self.inner.store.put(scope, &job);
        tracing::info!(
            job_id = %job.job_id,
            domain = %job.domain,
            subkey = %job.subkey,
            scope = %scope,
            "Tracking job",
        );
        self.watch(scope, job, callbacks)
    }

    /// Resume observing the job stored for a slot, if any.
    ///
    /// Idempotent: if that job is already watched, its handle is returned
    /// and `callbacks` are attached to it.
    pub fn resume(
        &self,
        scope: &AccountScope,
        domain: &str,
        subkey: &str,
        callbacks: JobCallbacks,
    ) -> Option<WatcherHandle> {
        let job = self.inner.store.get(scope, domain, subkey)?;
        tracing::debug!(job_id = %job.job_id, domain, subkey, "Resuming stored job");
        Some(self.watch(scope, job, callbacks))
    }

    /// Like [`resume`](Self::resume), falling back to the id of a job the
    /// server reports as running for this slot when no pointer is stored.
    /// A fallback job is persisted as if it had been tracked.
    pub fn resume_with_hint(
        &self,
        scope: &AccountScope,
        domain: &str,
        subkey: &str,
        running_job_id: Option<&str>,
        callbacks: JobCallbacks,
    ) -> Option<WatcherHandle> {
        if let Some(job) = self.inner.store.get(scope, domain, subkey) {
            return Some(self.watch(scope, job, callbacks));
        }

        let job_id = running_job_id.map(str::trim).filter(|id| !id.is_empty())?;
        if self.lock_settled().contains(job_id) {
            tracing::debug!(job_id, "Running-job hint already settled, ignoring");
            return None;
        }
        Some(self.track(scope, JobReference::new(domain, subkey, job_id), callbacks))
    }

    /// Reconcile a terminal outcome: retire the pointer and publish the
    /// notification, once per job id.
    ///
    /// Returns `true` only for the first call for a job; later calls (from
    /// another watcher or the supervisor) have no effect beyond making sure
    /// the pointer is gone.
    pub fn settle(&self, scope: &AccountScope, job: &JobReference, outcome: &JobOutcome) -> bool {
        self.inner.settle(scope, job, outcome)
    }

    /// Whether a live watcher is polling `job_id`.
    pub fn is_watching(&self, job_id: &str) -> bool {
        self.inner
            .lock_registry()
            .by_job
            .get(job_id)
            .is_some_and(WatcherHandle::is_active)
    }

    /// Handle of the live watcher for `job_id`.
    pub fn watcher(&self, job_id: &str) -> Option<WatcherHandle> {
        self.inner
            .lock_registry()
            .by_job
            .get(job_id)
            .filter(|h| h.is_active())
            .cloned()
    }

    /// Supervisor observing the scope published on `scope`.
    pub fn supervisor(&self, scope: watch::Receiver<AccountScope>) -> Supervisor {
        Supervisor::new(self.clone(), scope)
    }

    /// Cancel every live watcher. Pointers are kept.
    pub fn cancel_all(&self) {
        let handles: Vec<WatcherHandle> =
            self.inner.lock_registry().by_job.values().cloned().collect();
        for handle in handles {
            handle.cancel();
        }
    }

    // ---- private helpers ----

    fn watch(&self, scope: &AccountScope, job: JobReference, callbacks: JobCallbacks) -> WatcherHandle {
        let mut registry = self.inner.lock_registry();

        if let Some(existing) = registry.by_job.get(&job.job_id) {
            if existing.is_active() && existing.scope() == scope {
                let existing = existing.clone();
                drop(registry);
                if let Some(late) = existing.attach(callbacks) {
                    tracing::debug!(job_id = %job.job_id, "Outcome already delivered, running late callbacks");
                    late.deliver();
                }
                return existing;
            }
        }

        let slot = SlotKey::of(scope, &job);

        if let Some(previous_id) = registry.by_slot.get(&slot).cloned() {
            if previous_id != job.job_id {
                if let Some(previous) = registry.by_job.get(&previous_id) {
                    tracing::info!(
                        previous_job_id = %previous_id,
                        job_id = %job.job_id,
                        "Job superseded in its slot, cancelling older watcher",
                    );
                    previous.cancel();
                }
            }
        }

        registry.next_id += 1;
        let id = registry.next_id;
        let job_id = job.job_id.clone();
        let handle = spawn_watcher(
            id,
            scope.clone(),
            job,
            callbacks,
            WatcherContext {
                source: Arc::clone(&self.inner.source),
                sink: Arc::clone(&self.inner) as Arc<dyn OutcomeSink>,
                poll_interval: self.inner.poll_interval,
            },
        );

        registry.by_slot.insert(slot, job_id.clone());
        registry.by_job.insert(job_id, handle.clone());
        handle
    }

    fn lock_settled(&self) -> MutexGuard<'_, SettledJobs> {
        self.inner.settled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrackerInner {
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutcomeSink for TrackerInner {
    fn settle(&self, scope: &AccountScope, job: &JobReference, outcome: &JobOutcome) -> bool {
        let mut settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.remove_if(scope, job);

        if !settled.insert(&job.job_id) {
            tracing::debug!(job_id = %job.job_id, "Job already settled");
            return false;
        }

        let delivered = self.bus.publish(job_notification(job, outcome));
        tracing::info!(
            job_id = %job.job_id,
            domain = %job.domain,
            subkey = %job.subkey,
            success = outcome.is_success(),
            delivered,
            "Job settled",
        );
        true
    }

    fn watcher_finished(&self, watcher_id: u64, job_id: &str) {
        let mut registry = self.lock_registry();
        if registry.by_job.get(job_id).is_some_and(|h| h.id() == watcher_id) {
            registry.by_job.remove(job_id);
            registry.by_slot.retain(|_, id| id.as_str() != job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_history_is_bounded() {
        let mut settled = SettledJobs::default();
        for i in 0..SETTLED_HISTORY_LIMIT + 10 {
            assert!(settled.insert(&i.to_string()));
        }
        assert!(!settled.contains("0"));
        assert!(settled.contains(&(SETTLED_HISTORY_LIMIT + 9).to_string()));
        assert!(!settled.insert(&(SETTLED_HISTORY_LIMIT + 9).to_string()));
        assert_eq!(settled.ids.len(), SETTLED_HISTORY_LIMIT);
    }
}
