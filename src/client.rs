use std::sync::Arc;

use crate::config::{ClientConfig, ConfigError};
use crate::services::{
    analysis::AnalysisClient,
    http::ApiHttp,
    results::ResultsClient,
    status::{JobStatusClient, StatusSource},
    upload::UploadSubmitter,
};
use crate::tracker::{PollPolicy, PollScheduler};

/// Shared handle to every backend service, cheap to clone.
#[derive(Clone)]
pub struct LunaClient {
    pub status: Arc<JobStatusClient>,
    pub uploads: Arc<UploadSubmitter>,
    pub results: Arc<ResultsClient>,
    pub analysis: Arc<AnalysisClient>,
    policy: PollPolicy,
}

impl LunaClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http = ApiHttp::new(config)?;

        Ok(Self {
            status: Arc::new(JobStatusClient::new(http.clone())),
            uploads: Arc::new(UploadSubmitter::new(http.clone(), config.upload_field.clone())),
            results: Arc::new(ResultsClient::new(http.clone())),
            analysis: Arc::new(AnalysisClient::new(http)),
            policy: PollPolicy::from_config(config),
        })
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// A fresh scheduler polling through this client's status service.
    pub fn scheduler(&self) -> PollScheduler {
        self.scheduler_with(self.policy.clone())
    }

    pub fn scheduler_with(&self, policy: PollPolicy) -> PollScheduler {
        let source: Arc<dyn StatusSource> = self.status.clone();
        PollScheduler::new(source, policy)
    }
}
