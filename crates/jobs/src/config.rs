use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pstudio_core::types::AccountScope;

use crate::tracker::DEFAULT_POLL_INTERVAL;

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Job tracker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a server
/// on `localhost:8000`.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Server root for the status endpoints (default: `http://localhost:8000`).
    pub api_base_url: String,
    /// Delay between two status queries of one job, also the supervisor
    /// cadence (default: 2 s).
    pub poll_interval: Duration,
    /// Per-request HTTP timeout (default: 15 s).
    pub request_timeout: Duration,
    /// Maximum number of notifications shown at once (default: `4`).
    pub inbox_capacity: usize,
    /// Pointer file; `None` keeps pointers in memory only.
    pub pointer_store_path: Option<PathBuf>,
    /// Account scope observed by the daemon (default: `guest`).
    pub account_scope: AccountScope,
    /// Emit logs as JSON lines (default: `false`).
    pub log_json: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(15),
            inbox_capacity: 4,
            pointer_store_path: None,
            account_scope: AccountScope::guest(),
            log_json: false,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `PS_API_BASE_URL`         | `http://localhost:8000`  |
    /// | `PS_POLL_INTERVAL_MS`     | `2000`                   |
    /// | `PS_REQUEST_TIMEOUT_SECS` | `15`                     |
    /// | `PS_INBOX_CAPACITY`       | `4`                      |
    /// | `PS_POINTER_STORE_PATH`   | unset (in-memory)        |
    /// | `PS_ACCOUNT_SCOPE`        | `guest`                  |
    /// | `PS_LOG_JSON`             | `false`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = var("PS_API_BASE_URL").unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "PS_API_BASE_URL",
                expected: "an http(s) URL",
                value: api_base_url,
            });
        }

        let poll_interval_ms: u64 = parse_positive(
            "PS_POLL_INTERVAL_MS",
            var("PS_POLL_INTERVAL_MS"),
            defaults.poll_interval.as_millis() as u64,
        )?;
        let request_timeout_secs: u64 = parse_positive(
            "PS_REQUEST_TIMEOUT_SECS",
            var("PS_REQUEST_TIMEOUT_SECS"),
            defaults.request_timeout.as_secs(),
        )?;
        let inbox_capacity: usize =
            parse_positive("PS_INBOX_CAPACITY", var("PS_INBOX_CAPACITY"), defaults.inbox_capacity)?;

        let pointer_store_path = var("PS_POINTER_STORE_PATH").map(PathBuf::from);

        let account_scope = var("PS_ACCOUNT_SCOPE")
            .map(AccountScope::new)
            .unwrap_or(defaults.account_scope);

        let log_json = match var("PS_LOG_JSON").as_deref() {
            None => false,
            Some("1" | "true" | "TRUE" | "yes") => true,
            Some("0" | "false" | "FALSE" | "no") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "PS_LOG_JSON",
                    expected: "a boolean",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_base_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            inbox_capacity,
            pointer_store_path,
            account_scope,
            log_json,
        })
    }
}

fn parse_positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a positive integer",
            value: raw,
        }),
    }
}
