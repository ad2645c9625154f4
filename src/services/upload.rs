use reqwest::multipart;

use crate::models::upload::{
    ImageMime, RemoteValidation, UploadFormats, UploadReceipt, UploadRequest, ValidationError,
};
use crate::services::http::{self, ApiHttp};

/// Validates and transmits images, yielding the job id to track.
///
/// Submitting never starts polling; callers compose this with a
/// [`PollScheduler`](crate::tracker::PollScheduler).
pub struct UploadSubmitter {
    http: ApiHttp,
    field_name: String,
}

impl UploadSubmitter {
    pub fn new(http: ApiHttp, field_name: impl Into<String>) -> Self {
        Self {
            http,
            field_name: field_name.into(),
        }
    }

    /// Validate the file locally, then send it as a multipart upload.
    pub async fn submit(&self, request: UploadRequest) -> Result<UploadReceipt, UploadError> {
        let mime = match request.validate() {
            Ok(mime) => mime,
            Err(e) => {
                metrics::counter!("job_uploads_total", "outcome" => "invalid").increment(1);
                tracing::warn!(file = %request.file_name, error = %e, "Upload rejected before sending");
                return Err(UploadError::Validation(e));
            }
        };

        let file_name = request.file_name.clone();
        let result = self.transmit(request, mime).await;

        metrics::counter!("job_uploads_total", "outcome" => outcome_label(&result)).increment(1);

        match &result {
            Ok(receipt) => tracing::info!(file = %file_name, job_id = %receipt.job_id, "Upload accepted"),
            Err(e) => tracing::warn!(file = %file_name, error = %e, "Upload failed"),
        }
        result
    }

    /// GET the backend's accepted formats and size limit.
    pub async fn supported_formats(&self) -> Result<UploadFormats, UploadError> {
        let response = self.http.get(self.http.endpoints().upload_formats()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: http::error_message(response, "Format query failed").await,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UploadError::MalformedResponse(e.to_string()))
    }

    /// Ask the backend whether it would accept `request`, without starting a job.
    ///
    /// No local checks run first; a refusal comes back as `valid: false`
    /// rather than an error.
    pub async fn check_remote(&self, request: UploadRequest) -> Result<RemoteValidation, UploadError> {
        let part = multipart::Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)?;
        let form = multipart::Form::new().part(self.field_name.clone(), part);

        let response = self
            .http
            .post(self.http.endpoints().upload_validate())
            .multipart(form)
            .send()
            .await?;

        // A refused file is reported as 400 with the same body shape
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: http::error_message(response, "Validation request failed").await,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UploadError::MalformedResponse(e.to_string()))
    }

    async fn transmit(&self, request: UploadRequest, mime: ImageMime) -> Result<UploadReceipt, UploadError> {
        let size = request.size();
        let part = multipart::Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str(&mime.to_string())?;
        let form = multipart::Form::new().part(self.field_name.clone(), part);

        tracing::info!(file = %request.file_name, size, mime = %mime, "Uploading image");

        let response = self
            .http
            .post(self.http.endpoints().upload())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: http::error_message(response, "Upload failed").await,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UploadError::MalformedResponse(e.to_string()))
    }
}

/// `job_uploads_total` label for a submission that passed local validation.
fn outcome_label(result: &Result<UploadReceipt, UploadError>) -> &'static str {
    match result {
        Ok(_) => "accepted",
        Err(UploadError::Rejected { .. }) => "rejected",
        Err(_) => "error",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upload rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected upload response: {0}")]
    MalformedResponse(String),
}
