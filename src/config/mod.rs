use garde::Validate;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientConfig {
    /// Backend origin (e.g., "http://localhost:5000")
    #[serde(default = "default_api_base_url")]
    #[garde(length(min = 1))]
    pub api_base_url: String,

    /// Bearer token issued by the auth service
    #[serde(default)]
    #[garde(skip)]
    pub auth_token: Option<String>,

    /// Optional API key sent alongside the bearer token
    #[serde(default)]
    #[garde(skip)]
    pub api_key: Option<String>,

    /// Delay between status polls
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 100, max = 600_000))]
    pub poll_interval_ms: u64,

    /// Give up tracking after this many polls without a terminal status
    #[serde(default)]
    #[garde(range(min = 1))]
    pub max_poll_attempts: Option<u32>,

    /// Per-poll request timeout
    #[serde(default)]
    #[garde(range(min = 1))]
    pub request_timeout_ms: Option<u64>,

    #[serde(default = "default_upload_path")]
    #[garde(length(min = 1))]
    pub upload_path: String,

    /// Multipart field carrying the image
    #[serde(default = "default_upload_field")]
    #[garde(length(min = 1))]
    pub upload_field: String,

    #[serde(default = "default_status_path")]
    #[garde(length(min = 1))]
    pub status_path: String,

    #[serde(default = "default_results_path")]
    #[garde(length(min = 1))]
    pub results_path: String,

    #[serde(default = "default_analysis_path")]
    #[garde(length(min = 1))]
    pub analysis_path: String,

    /// Advertised formats and size limit
    #[serde(default = "default_upload_formats_path")]
    #[garde(length(min = 1))]
    pub upload_formats_path: String,

    /// Server-side dry-run validation of a file
    #[serde(default = "default_upload_validate_path")]
    #[garde(length(min = 1))]
    pub upload_validate_path: String,

    /// Where the driver binary writes result archives
    #[serde(default = "default_output_dir")]
    #[garde(skip)]
    pub output_dir: String,

    /// Prometheus exporter listener (e.g., "127.0.0.1:9000"). Disabled when unset.
    #[serde(default)]
    #[garde(skip)]
    pub metrics_bind_addr: Option<String>,
}

fn default_api_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_upload_path() -> String {
    "/api/upload".to_string()
}

fn default_upload_field() -> String {
    "image".to_string()
}

fn default_status_path() -> String {
    "/api/status".to_string()
}

fn default_results_path() -> String {
    "/api/results".to_string()
}

fn default_analysis_path() -> String {
    "/api/analysis".to_string()
}

fn default_upload_formats_path() -> String {
    "/api/upload/formats".to_string()
}

fn default_upload_validate_path() -> String {
    "/api/upload/validate".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults pointed at `api_base_url`; used by tests and embedders.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth_token: None,
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: None,
            request_timeout_ms: None,
            upload_path: default_upload_path(),
            upload_field: default_upload_field(),
            status_path: default_status_path(),
            results_path: default_results_path(),
            analysis_path: default_analysis_path(),
            upload_formats_path: default_upload_formats_path(),
            upload_validate_path: default_upload_validate_path(),
            output_dir: default_output_dir(),
            metrics_bind_addr: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Ok(Endpoints::new(
            &self.api_base_url,
            &self.upload_path,
            &self.status_path,
            &self.results_path,
        )?
        .with_analysis_path(&self.analysis_path)
        .with_upload_info_paths(&self.upload_formats_path, &self.upload_validate_path))
    }
}

/// Resolves backend URLs from the configured base and path prefixes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    upload: Vec<String>,
    status: Vec<String>,
    results: Vec<String>,
    analysis: Vec<String>,
    upload_formats: Vec<String>,
    upload_validate: Vec<String>,
}

impl Endpoints {
    pub fn new(
        base_url: &str,
        upload_path: &str,
        status_path: &str,
        results_path: &str,
    ) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url).map_err(|e| ConfigError::BaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::BaseUrl(format!(
                "{} cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            base,
            upload: split_path(upload_path),
            status: split_path(status_path),
            results: split_path(results_path),
            analysis: split_path(&default_analysis_path()),
            upload_formats: split_path(&default_upload_formats_path()),
            upload_validate: split_path(&default_upload_validate_path()),
        })
    }

    pub fn with_analysis_path(mut self, analysis_path: &str) -> Self {
        self.analysis = split_path(analysis_path);
        self
    }

    pub fn with_upload_info_paths(mut self, formats_path: &str, validate_path: &str) -> Self {
        self.upload_formats = split_path(formats_path);
        self.upload_validate = split_path(validate_path);
        self
    }

    pub fn upload(&self) -> Url {
        self.join(&self.upload, &[])
    }

    pub fn upload_formats(&self) -> Url {
        self.join(&self.upload_formats, &[])
    }

    pub fn upload_validate(&self) -> Url {
        self.join(&self.upload_validate, &[])
    }

    pub fn status(&self, job_id: &str) -> Url {
        self.join(&self.status, &[job_id])
    }

    pub fn detailed_status(&self, job_id: &str) -> Url {
        self.join(&self.status, &[job_id, "detailed"])
    }

    pub fn cancel(&self, job_id: &str) -> Url {
        self.join(&self.status, &[job_id, "cancel"])
    }

    /// Every job the backend knows about.
    pub fn all_jobs(&self) -> Url {
        self.join(&self.status, &["all"])
    }

    /// `report` is one of `quality`, `metrics`, `report`, `compare`.
    pub fn analysis(&self, job_id: &str, report: &str) -> Url {
        self.join(&self.analysis, &[job_id, report])
    }

    pub fn results(&self, id: &str, tail: &[&str]) -> Url {
        let mut segments = vec![id];
        segments.extend_from_slice(tail);
        self.join(&self.results, &segments)
    }

    fn join(&self, prefix: &[String], segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in new(), so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(prefix.iter().map(String::as_str));
            path.extend(segments.iter().copied());
        }
        url
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    #[error("Invalid API base URL: {0}")]
    BaseUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
