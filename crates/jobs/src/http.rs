//! HTTP implementation of [`StatusSource`].
//!
//! Queries `GET {base_url}/api/{domain}/jobs/{job_id}` using [`reqwest`].
//! Every domain's engine answers with the same status shape, decoded by
//! [`decode_status`].

use std::time::Duration;

use async_trait::async_trait;
use pstudio_core::job::{JobReference, JobStatus};

use crate::status::{decode_status, StatusSource, TransportError};

/// HTTP client for the job status endpoints.
pub struct HttpStatusClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatusClient {
    /// Create a client with its own connection pool.
    ///
    /// * `base_url` - Server root, e.g. `http://localhost:8000`.
    /// * `timeout`  - Per-request timeout; a timed-out query is retried.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`] (e.g. one
    /// that already carries the session cookie).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Status URL for a job.
    pub fn status_url(&self, job: &JobReference) -> String {
        format!("{}/api/{}/jobs/{}", self.base_url, job.domain, job.job_id)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise turn it
    /// into a [`TransportError::Http`] carrying the body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl StatusSource for HttpStatusClient {
    async fn fetch_status(&self, job: &JobReference) -> Result<JobStatus, TransportError> {
        let response = self.client.get(self.status_url(job)).send().await?;
        let response = Self::ensure_success(response).await?;
        let body: serde_json::Value = response.json().await?;
        decode_status(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_url_is_per_domain() {
        let client = HttpStatusClient::with_client(reqwest::Client::new(), "http://host:8000/");
        let job = JobReference::new("scene", "model", "sc_9");
        assert_eq!(client.status_url(&job), "http://host:8000/api/scene/jobs/sc_9");
    }
}
