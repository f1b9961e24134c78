#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pstudio_core::job::{JobReference, JobStatus};
use pstudio_events::{NotificationBus, NotificationEvent, NotificationItem};
use pstudio_jobs::{JobTracker, PointerStore, StatusSource, StorageBackend, StorageError, TransportError};
use serde_json::Value;
use tokio::sync::broadcast;

/// Poll interval used by test trackers.
pub const POLL: Duration = Duration::from_millis(2000);

/// One scripted answer of the fake engine.
#[derive(Debug, Clone)]
pub enum Reply {
    Queued,
    Running(Option<u8>),
    Done(Value),
    /// Done, with the action the engine recorded for the job.
    DoneWithAction(Value, &'static str),
    Error(Option<String>),
    /// Transport failure (network down, 5xx).
    Fail,
    /// Answer only after the given delay.
    Slow(Duration, Box<Reply>),
}

/// Fake status source answering from a per-job script.
///
/// Replies are consumed in order; the last one repeats forever. Jobs without
/// a script are reported as running.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, job_id: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), replies.into());
    }

    /// Status queries issued for a job so far.
    pub fn calls(&self, job_id: &str) -> usize {
        self.calls.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }

    /// Highest number of queries that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, job_id: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(job_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Running(None)),
            None => Reply::Running(None),
        }
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, job: &JobReference) -> Result<JobStatus, TransportError> {
        *self.calls.lock().unwrap().entry(job.job_id.clone()).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut reply = self.next_reply(&job.job_id);
        while let Reply::Slow(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Reply::Queued => Ok(JobStatus::Queued { progress: None }),
            Reply::Running(progress) => Ok(JobStatus::Running { progress }),
            Reply::Done(result) => Ok(JobStatus::Done { result, action: None }),
            Reply::DoneWithAction(result, action) => Ok(JobStatus::Done {
                result,
                action: Some(action.to_string()),
            }),
            Reply::Error(message) => Ok(JobStatus::Error { message }),
            Reply::Fail => Err(TransportError::Unavailable("connection refused".into())),
            Reply::Slow(..) => unreachable!(),
        }
    }
}

/// Storage backend whose every operation fails.
pub struct BrokenBackend;

impl StorageBackend for BrokenBackend {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }
}

/// Tracker over an in-memory store and a fresh bus.
pub fn tracker(source: Arc<ScriptedSource>) -> JobTracker {
    tracker_with_store(source, PointerStore::in_memory())
}

pub fn tracker_with_store(source: Arc<ScriptedSource>, store: PointerStore) -> JobTracker {
    JobTracker::new(Arc::new(store), NotificationBus::default(), source, POLL)
}

/// Every item published on the bus since the receiver was created.
pub fn published(rx: &mut broadcast::Receiver<NotificationEvent>) -> Vec<NotificationItem> {
    let mut items = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let NotificationEvent::Published(item) = event {
            items.push(item);
        }
    }
    items
}
