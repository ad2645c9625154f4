//! Job status tracking: a poll scheduler that owns one session at a time,
//! and the observer registry that fans each status out to listeners.

pub mod observer;
pub mod scheduler;
pub mod session;

pub use observer::{ObserverRegistry, StatusCallback};
pub use scheduler::{PollPolicy, PollScheduler, TimeoutCallback, DEFAULT_POLL_INTERVAL};
pub use session::{PollingSession, SessionEnd};

use crate::models::job::{JobId, JobState, JobStatus};

/// Track `job_id` until its session ends and turn the ending into a result.
///
/// A backend-reported failure is a terminal business outcome, surfaced as
/// [`TrackError::JobFailed`] after the observer has seen it once. A job
/// cancelled on the backend ends the same way, with the cancellation message.
pub async fn wait_for_outcome(
    scheduler: &mut PollScheduler,
    job_id: JobId,
    on_update: Option<StatusCallback>,
) -> Result<JobStatus, TrackError> {
    scheduler.start_polling(job_id.clone(), on_update);

    let Some(mut outcome) = scheduler.outcome() else {
        return Err(TrackError::Stopped { job_id });
    };
    let end = match outcome.wait_for(Option::is_some).await {
        Ok(end) => end.clone(),
        Err(_) => None,
    };

    match end {
        Some(SessionEnd::Terminal(status)) if status.status == JobState::Completed => Ok(status),
        Some(SessionEnd::Terminal(status)) => Err(TrackError::JobFailed {
            message: status
                .failure_reason()
                .unwrap_or("Processing failed")
                .to_string(),
            job_id,
        }),
        Some(SessionEnd::TimedOut { attempts }) => Err(TrackError::TimedOut { job_id, attempts }),
        Some(SessionEnd::Stopped) | None => Err(TrackError::Stopped { job_id }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: JobId, message: String },

    #[error("Job {job_id} did not finish after {attempts} status checks")]
    TimedOut { job_id: JobId, attempts: u32 },

    #[error("Tracking of job {job_id} was stopped")]
    Stopped { job_id: JobId },
}
