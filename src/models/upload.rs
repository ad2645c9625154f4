use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::models::job::JobId;

/// Largest image the backend accepts (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Image types the processing pipeline can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum ImageMime {
    #[strum(to_string = "image/png")]
    Png,
    #[strum(to_string = "image/jpeg")]
    Jpeg,
    #[strum(to_string = "image/tiff")]
    Tiff,
}

impl ImageMime {
    /// Parse a declared content type, ignoring parameters such as `; charset=`.
    pub fn parse(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        Self::from_str(essence).ok()
    }
}

/// A file queued for upload. Validated before any network call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Build a request from bytes, inferring the MIME type from the file
    /// extension and then from the content itself.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = image::ImageFormat::from_path(&file_name)
            .or_else(|_| image::guess_format(&bytes))
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        Self {
            file_name,
            bytes,
            mime_type,
        }
    }

    /// Read an image from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check the client-side constraints: allowed type, non-empty, size limit.
    ///
    /// The type is checked first, so a disallowed file fails on type at any size.
    pub fn validate(&self) -> Result<ImageMime, ValidationError> {
        let mime = ImageMime::parse(&self.mime_type).ok_or_else(|| {
            ValidationError::UnsupportedType {
                mime_type: self.mime_type.clone(),
            }
        })?;

        if self.bytes.is_empty() {
            return Err(ValidationError::EmptyFile);
        }

        if self.size() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::TooLarge {
                size: self.size(),
                max: MAX_UPLOAD_BYTES,
            });
        }

        Ok(mime)
    }
}

/// Backend response to a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub job_id: JobId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Formats and limits advertised by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFormats {
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub max_file_size_mb: f64,
    #[serde(default)]
    pub recommended_formats: Vec<String>,
    #[serde(default)]
    pub compatible_missions: Vec<String>,
    #[serde(default)]
    pub processing_capabilities: Vec<String>,
}

impl UploadFormats {
    /// True if the backend lists `extension` (with or without the dot).
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.supported_formats
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Backend verdict on a file, without starting a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteValidation {
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("No image data provided")]
    EmptyFile,

    #[error("Unsupported file type {mime_type}; allowed: image/png, image/jpeg, image/tiff")]
    UnsupportedType { mime_type: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}
