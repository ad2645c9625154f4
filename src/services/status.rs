use async_trait::async_trait;
use std::time::Duration;

use crate::models::job::{CancelReceipt, DetailedStatus, JobId, JobList, JobStatus};
use crate::services::http::{self, ApiHttp};

/// Anything that can answer "what is this job doing right now".
///
/// The poll scheduler only depends on this trait, so tests can drive it with
/// scripted responses instead of a live backend.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, StatusFetchError>;
}

/// Single-shot status lookups against the processing backend.
pub struct JobStatusClient {
    http: ApiHttp,
}

impl JobStatusClient {
    pub fn new(http: ApiHttp) -> Self {
        Self { http }
    }

    /// GET the current status of a job. Never retries.
    pub async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, StatusFetchError> {
        let url = self.http.endpoints().status(job_id.as_str());
        self.fetch(self.http.get(url)).await
    }

    /// GET the status with elapsed time, remaining estimate and stage breakdown.
    pub async fn fetch_detailed(&self, job_id: &JobId) -> Result<DetailedStatus, StatusFetchError> {
        let url = self.http.endpoints().detailed_status(job_id.as_str());
        self.fetch(self.http.get(url)).await
    }

    /// GET every job the backend knows about, newest first, with counts.
    pub async fn list_jobs(&self) -> Result<JobList, StatusFetchError> {
        let url = self.http.endpoints().all_jobs();
        self.fetch(self.http.get(url)).await
    }

    /// POST a cancellation for a queued or processing job.
    ///
    /// A live poll session sees the job as `cancelled` on its next tick and
    /// ends; stop it first to end tracking immediately.
    pub async fn cancel(&self, job_id: &JobId) -> Result<CancelReceipt, StatusFetchError> {
        let url = self.http.endpoints().cancel(job_id.as_str());
        let receipt: CancelReceipt = self.fetch(self.http.post(url)).await?;
        tracing::info!(job_id = %job_id, status = %receipt.status, "Cancelled job");
        Ok(receipt)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StatusFetchError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusFetchError::Http {
                status: status.as_u16(),
                message: http::error_message(response, "Status request failed").await,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl StatusSource for JobStatusClient {
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, StatusFetchError> {
        JobStatusClient::fetch_status(self, job_id).await
    }
}

/// A single poll that failed to reach or parse the backend. Transient: the
/// scheduler logs it and tries again on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum StatusFetchError {
    #[error("Status request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Status endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed status response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Status request timed out after {0:?}")]
    Timeout(Duration),
}

impl StatusFetchError {
    /// HTTP status code, when the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StatusFetchError::Http { status, .. } => Some(*status),
            StatusFetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            StatusFetchError::Parse(_) | StatusFetchError::Timeout(_) => None,
        }
    }
}
