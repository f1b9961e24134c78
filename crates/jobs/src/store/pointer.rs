//! Durable pointers from `(account scope, domain, subkey)` to active jobs.
//!
//! Every operation is best effort: backend failures are logged and treated
//! as "nothing stored", so callers lose resumability but never fail.
//!
//! # Layout
//!
//! | Key                                   | Value                              |
//! |---------------------------------------|------------------------------------|
//! | `ps_job_v2:{scope}:{domain}:{subkey}` | `{"jobId": "...", "action": "..."}` |
//! | `ps_lb_activeJob_v1:{scope}:{MODE}`   | bare job id (legacy lookbook)      |
//! | `ps_sc_activeJob_v1:{scope}:{kind}`   | JSON record or bare id (legacy scene) |
//!
//! Legacy entries are read and retired but never written.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use pstudio_core::job::JobReference;
use pstudio_core::studio::{DOMAIN_LOOKBOOK, DOMAIN_SCENE};
use pstudio_core::types::AccountScope;
use serde::Serialize;
use serde_json::Value;

use super::backend::{MemoryBackend, StorageBackend};

/// Prefix of the current key layout.
pub const POINTER_KEY_PREFIX: &str = "ps_job_v2";

/// Prefix used by the previous client for lookbook jobs.
pub const LEGACY_LOOKBOOK_PREFIX: &str = "ps_lb_activeJob_v1";

/// Prefix used by the previous client for scene jobs.
pub const LEGACY_SCENE_PREFIX: &str = "ps_sc_activeJob_v1";

// ---------------------------------------------------------------------------
// Stored value decoding
// ---------------------------------------------------------------------------

/// A pointer value as found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredPointer {
    /// `{ "jobId": ..., "action": ... }`.
    Record { job_id: String, action: String },
    /// A bare job id written by an older client.
    BareId(String),
}

impl StoredPointer {
    fn decode(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => {
                let job_id = map.get("jobId").and_then(scalar_string)?;
                let action = map
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(StoredPointer::Record { job_id, action })
            }
            Ok(value @ (Value::String(_) | Value::Number(_))) => {
                scalar_string(&value).map(StoredPointer::BareId)
            }
            Ok(_) => None,
            Err(_) if looks_like_job_id(trimmed) => Some(StoredPointer::BareId(trimmed.to_string())),
            Err(_) => None,
        }
    }

    fn into_reference(self, domain: &str, subkey: &str) -> JobReference {
        match self {
            StoredPointer::Record { job_id, action } => {
                JobReference::new(domain, subkey, job_id).with_action(action)
            }
            StoredPointer::BareId(job_id) => JobReference::new(domain, subkey, job_id),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PointerRecord<'a> {
    job_id: &'a str,
    action: &'a str,
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn looks_like_job_id(s: &str) -> bool {
    !s.starts_with('{') && !s.starts_with('[') && !s.chars().any(char::is_whitespace)
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

fn pointer_key(scope: &AccountScope, domain: &str, subkey: &str) -> String {
    format!("{POINTER_KEY_PREFIX}:{scope}:{domain}:{subkey}")
}

/// Legacy key for a slot, if the domain ever had one.
fn legacy_key(scope: &AccountScope, domain: &str, subkey: &str) -> Option<String> {
    match domain {
        DOMAIN_LOOKBOOK => Some(format!(
            "{LEGACY_LOOKBOOK_PREFIX}:{scope}:{}",
            subkey.to_uppercase()
        )),
        DOMAIN_SCENE => Some(format!(
            "{LEGACY_SCENE_PREFIX}:{scope}:{}",
            subkey.to_lowercase()
        )),
        _ => None,
    }
}

/// Split a key belonging to `scope` into `(domain, subkey)`.
fn parse_key(key: &str, scope: &AccountScope) -> Option<(String, String)> {
    let current = format!("{POINTER_KEY_PREFIX}:{scope}:");
    if let Some(rest) = key.strip_prefix(&current) {
        let (domain, subkey) = rest.split_once(':')?;
        if domain.is_empty() {
            return None;
        }
        return Some((domain.to_string(), subkey.to_string()));
    }

    let lookbook = format!("{LEGACY_LOOKBOOK_PREFIX}:{scope}:");
    if let Some(mode) = key.strip_prefix(&lookbook).filter(|m| !m.is_empty()) {
        return Some((DOMAIN_LOOKBOOK.to_string(), mode.to_uppercase()));
    }

    let scene = format!("{LEGACY_SCENE_PREFIX}:{scope}:");
    if let Some(kind) = key.strip_prefix(&scene).filter(|k| !k.is_empty()) {
        return Some((DOMAIN_SCENE.to_string(), kind.to_lowercase()));
    }

    None
}

// ---------------------------------------------------------------------------
// PointerStore
// ---------------------------------------------------------------------------

/// Best-effort durable map of active job pointers.
///
/// Holds at most one pointer per `(scope, domain, subkey)`; `put` replaces.
pub struct PointerStore {
    backend: Arc<dyn StorageBackend>,
    /// Serializes read-modify-write sequences across watchers.
    op_lock: Mutex<()>,
}

impl PointerStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            op_lock: Mutex::new(()),
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Store or replace the pointer for the reference's slot.
    pub fn put(&self, scope: &AccountScope, job: &JobReference) {
        let _guard = self.lock();
        let key = pointer_key(scope, &job.domain, &job.subkey);
        let record = PointerRecord {
            job_id: &job.job_id,
            action: &job.action,
        };

        let value = match serde_json::to_string(&record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to encode job pointer");
                return;
            }
        };

        if let Err(e) = self.backend.set(&key, &value) {
            tracing::warn!(error = %e, key, "Failed to store job pointer, resume disabled");
            return;
        }

        if let Some(legacy) = legacy_key(scope, &job.domain, &job.subkey) {
            self.remove_key(&legacy);
        }
    }

    /// Pointer currently stored for a slot.
    pub fn get(&self, scope: &AccountScope, domain: &str, subkey: &str) -> Option<JobReference> {
        let _guard = self.lock();
        self.read_slot(scope, domain, subkey)
    }

    /// Forget the pointer for a slot.
    pub fn remove(&self, scope: &AccountScope, domain: &str, subkey: &str) {
        let _guard = self.lock();
        self.clear_slot(scope, domain, subkey);
    }

    /// Forget the pointer for the reference's slot only if it still names
    /// the same job. Returns whether a pointer was removed.
    pub fn remove_if(&self, scope: &AccountScope, job: &JobReference) -> bool {
        let _guard = self.lock();
        match self.read_slot(scope, &job.domain, &job.subkey) {
            Some(stored) if stored.job_id == job.job_id => {
                self.clear_slot(scope, &job.domain, &job.subkey);
                true
            }
            _ => false,
        }
    }

    /// Every decodable pointer of a scope.
    ///
    /// Malformed entries are skipped. When a slot has both a current and a
    /// legacy entry, the current one wins.
    pub fn list_all(&self, scope: &AccountScope) -> Vec<JobReference> {
        let _guard = self.lock();
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, scope = %scope, "Failed to enumerate job pointers");
                return Vec::new();
            }
        };

        // Current-layout keys first so they shadow legacy ones.
        let (mut ordered, legacy): (Vec<_>, Vec<_>) = keys
            .into_iter()
            .partition(|k| k.starts_with(POINTER_KEY_PREFIX));
        ordered.extend(legacy);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in ordered {
            let Some((domain, subkey)) = parse_key(&key, scope) else {
                continue;
            };
            if seen.contains(&(domain.clone(), subkey.clone())) {
                continue;
            }
            let Some(pointer) = self.read_key(&key) else {
                tracing::debug!(key, "Skipping malformed job pointer");
                continue;
            };
            seen.insert((domain.clone(), subkey.clone()));
            out.push(pointer.into_reference(&domain, &subkey));
        }
        out
    }

    // ---- private helpers ----

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_slot(&self, scope: &AccountScope, domain: &str, subkey: &str) -> Option<JobReference> {
        let current = pointer_key(scope, domain, subkey);
        let pointer = self.read_key(&current).or_else(|| {
            legacy_key(scope, domain, subkey).and_then(|legacy| self.read_key(&legacy))
        })?;
        Some(pointer.into_reference(domain, subkey))
    }

    fn clear_slot(&self, scope: &AccountScope, domain: &str, subkey: &str) {
        self.remove_key(&pointer_key(scope, domain, subkey));
        if let Some(legacy) = legacy_key(scope, domain, subkey) {
            self.remove_key(&legacy);
        }
    }

    fn read_key(&self, key: &str) -> Option<StoredPointer> {
        match self.backend.get(key) {
            Ok(raw) => raw.as_deref().and_then(StoredPointer::decode),
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to read job pointer");
                None
            }
        }
    }

    fn remove_key(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            tracing::warn!(error = %e, key, "Failed to remove job pointer");
        }
    }
}
