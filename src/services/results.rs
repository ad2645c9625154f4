use std::path::{Path, PathBuf};

use crate::models::job::JobId;
use crate::models::results::{JobResult, ResultFileListing};
use crate::services::http::{self, ApiHttp};

/// Retrieval of generated DEM artifacts for completed jobs.
pub struct ResultsClient {
    http: ApiHttp,
}

impl ResultsClient {
    pub fn new(http: ApiHttp) -> Self {
        Self { http }
    }

    /// GET /api/results/{job_id}/summary
    pub async fn summary(&self, job_id: &JobId) -> Result<JobResult, ResultsError> {
        let response = self.get(job_id, &["summary"]).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET /api/results/{job_id}/files
    pub async fn list_files(&self, job_id: &JobId) -> Result<ResultFileListing, ResultsError> {
        let response = self.get(job_id, &["files"]).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET /api/results/{job_id}/download — ZIP of every output.
    pub async fn download_archive(&self, job_id: &JobId) -> Result<Vec<u8>, ResultsError> {
        let response = self.get(job_id, &["download"]).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// GET /api/results/{job_id}/files/{filename}
    pub async fn download_file(&self, job_id: &JobId, filename: &str) -> Result<Vec<u8>, ResultsError> {
        let response = self.get(job_id, &["files", filename]).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download the archive into `dir` as `luna_results_{job_id}.zip`.
    pub async fn save_archive(&self, job_id: &JobId, dir: impl AsRef<Path>) -> Result<PathBuf, ResultsError> {
        let archive = self.download_archive(job_id).await?;
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("luna_results_{}.zip", sanitize(job_id.as_str())));
        tokio::fs::write(&path, &archive).await?;

        tracing::info!(job_id = %job_id, path = %path.display(), bytes = archive.len(), "Saved result archive");
        Ok(path)
    }

    /// DELETE /api/results/{result_id}. Requires a bearer token.
    pub async fn delete_result(&self, result_id: &str) -> Result<(), ResultsError> {
        if !self.http.has_token() {
            return Err(ResultsError::Unauthenticated);
        }

        let url = self.http.endpoints().results(result_id, &[]);
        let response = self.http.delete(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResultsError::Http {
                status: status.as_u16(),
                message: http::error_message(response, "Failed to delete result").await,
            });
        }

        tracing::info!(result_id, "Deleted stored result");
        Ok(())
    }

    async fn get(&self, job_id: &JobId, tail: &[&str]) -> Result<reqwest::Response, ResultsError> {
        let url = self.http.endpoints().results(job_id.as_str(), tail);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResultsError::Http {
                status: status.as_u16(),
                message: http::error_message(response, "Results request failed").await,
            });
        }
        Ok(response)
    }
}

/// Keep job ids from escaping the output directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("Results request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Results endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed results response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication token required")]
    Unauthenticated,
}
