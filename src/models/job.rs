use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Opaque job identifier assigned by the backend at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Job id must not be empty")]
pub struct InvalidJobId;

impl JobId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidJobId> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidJobId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a processing job as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    /// Also what a backend `cancelled` reads as: the job ended without results.
    #[serde(alias = "cancelled")]
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One status snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "current_step")]
    pub step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_filename: Option<String>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Backend-reported failure reason, falling back to the stage message.
    pub fn failure_reason(&self) -> Option<&str> {
        if self.status != JobState::Failed {
            return None;
        }
        self.error_message
            .as_deref()
            .or(self.message.as_deref())
    }
}

/// Status with elapsed/remaining estimates and per-stage progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedStatus {
    #[serde(flatten)]
    pub status: JobStatus,
    #[serde(default)]
    pub elapsed_time_seconds: f64,
    #[serde(default)]
    pub estimated_remaining_seconds: f64,
    #[serde(default)]
    pub processing_steps: Vec<ProcessingStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStep {
    pub step: String,
    #[serde(deserialize_with = "deserialize_progress")]
    pub progress: u8,
}

/// Every job the backend tracks, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub total_jobs: usize,
    #[serde(default)]
    pub active_jobs: usize,
    #[serde(default)]
    pub completed_jobs: usize,
    #[serde(default)]
    pub failed_jobs: usize,
    #[serde(default)]
    pub jobs: Vec<JobStatus>,
}

impl JobList {
    pub fn in_state(&self, state: JobState) -> impl Iterator<Item = &JobStatus> {
        self.jobs.iter().filter(move |job| job.status == state)
    }
}

/// Backend acknowledgement of a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReceipt {
    pub job_id: JobId,
    /// Raw backend state, normally `cancelled`.
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// The backend reports progress as a float; clamp into 0..=100.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(p) if p.is_finite() => p.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    })
}

/// Accepts RFC 3339 or naive ISO-8601 (read as UTC). Anything else is dropped.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_timestamp(&s)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
