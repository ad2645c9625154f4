use serde::de::DeserializeOwned;

use crate::models::analysis::{AnalysisReport, QualityReport, ReferenceComparison, SurfaceMetricsReport};
use crate::models::job::JobId;
use crate::services::http::{self, ApiHttp};

/// Quality metrics and terrain assessment for completed jobs.
pub struct AnalysisClient {
    http: ApiHttp,
}

impl AnalysisClient {
    pub fn new(http: ApiHttp) -> Self {
        Self { http }
    }

    /// GET /api/analysis/{job_id}/quality
    pub async fn quality(&self, job_id: &JobId) -> Result<QualityReport, AnalysisError> {
        self.fetch(job_id, "quality").await
    }

    /// GET /api/analysis/{job_id}/metrics
    pub async fn surface_metrics(&self, job_id: &JobId) -> Result<SurfaceMetricsReport, AnalysisError> {
        self.fetch(job_id, "metrics").await
    }

    /// GET /api/analysis/{job_id}/report
    pub async fn report(&self, job_id: &JobId) -> Result<AnalysisReport, AnalysisError> {
        self.fetch(job_id, "report").await
    }

    /// GET /api/analysis/{job_id}/compare
    pub async fn compare_with_reference(&self, job_id: &JobId) -> Result<ReferenceComparison, AnalysisError> {
        self.fetch(job_id, "compare").await
    }

    async fn fetch<T: DeserializeOwned>(&self, job_id: &JobId, report: &str) -> Result<T, AnalysisError> {
        let url = self.http.endpoints().analysis(job_id.as_str(), report);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = http::error_message(response, "Analysis request failed").await;
            tracing::debug!(job_id = %job_id, report, status = status.as_u16(), error = %message, "Analysis unavailable");
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Analysis endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed analysis response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AnalysisError {
    /// The job exists but has not completed, so there is nothing to analyse yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, AnalysisError::Http { status: 400, .. })
    }
}
