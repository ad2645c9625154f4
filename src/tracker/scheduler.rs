use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::models::job::{JobId, JobStatus};
use crate::services::status::StatusSource;
use crate::tracker::observer::StatusCallback;
use crate::tracker::session::{PollingSession, SessionEnd};

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Invoked once when a session exhausts `max_attempts`.
pub type TimeoutCallback = Arc<dyn Fn(&JobId, u32) + Send + Sync + 'static>;

/// Timing and give-up rules for a polling session.
#[derive(Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Stop after this many polls without a terminal status. Unlimited when `None`.
    pub max_attempts: Option<u32>,
    /// Per-poll deadline; an expired poll counts as a transient failure.
    pub request_timeout: Option<Duration>,
    pub on_timeout: Option<TimeoutCallback>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            request_timeout: None,
            on_timeout: None,
        }
    }
}

impl fmt::Debug for PollPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollPolicy")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

impl PollPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
            request_timeout: config.request_timeout(),
            on_timeout: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn on_timeout(mut self, callback: impl Fn(&JobId, u32) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Arc::new(callback));
        self
    }
}

/// Owns the polling loop for at most one job at a time.
///
/// Starting a new session tears down the previous one first. Use one
/// scheduler per job when several jobs must be tracked concurrently.
/// Dropping the scheduler stops its session.
pub struct PollScheduler {
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
    session: Option<PollingSession>,
}

impl PollScheduler {
    pub fn new(source: Arc<dyn StatusSource>, policy: PollPolicy) -> Self {
        Self {
            source,
            policy,
            session: None,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Begin tracking `job_id`. The first poll is issued immediately; later
    /// polls follow at the policy interval, each one only after the previous
    /// poll and its callbacks have finished.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_polling(&mut self, job_id: JobId, on_update: Option<StatusCallback>) {
        self.stop_polling();

        tracing::info!(job_id = %job_id, interval_ms = self.policy.interval.as_millis() as u64, "Starting job status polling");
        self.session = Some(PollingSession::spawn(
            job_id,
            Arc::clone(&self.source),
            self.policy.clone(),
            on_update,
        ));
    }

    /// Cancel the current session. Safe to call when nothing is running.
    /// No callback fires after this returns, even for a poll already in flight.
    pub fn stop_polling(&mut self) {
        if let Some(session) = self.session.take() {
            if session.is_live() {
                tracing::info!(job_id = %session.job_id(), attempts = session.attempts(), "Stopping job status polling");
            }
            session.stop();
        }
    }

    /// True while a session is polling.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(PollingSession::is_live)
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.session.as_ref().map(PollingSession::job_id)
    }

    /// Polls issued by the current (or last finished) session.
    pub fn attempts(&self) -> u32 {
        self.session.as_ref().map_or(0, PollingSession::attempts)
    }

    pub fn latest(&self) -> Option<JobStatus> {
        self.session.as_ref().and_then(PollingSession::latest)
    }

    /// Add a listener to the live session.
    pub fn subscribe(&self, callback: StatusCallback) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.subscribe(callback))
    }

    /// Watch for the end of the current session.
    pub fn outcome(&self) -> Option<watch::Receiver<Option<SessionEnd>>> {
        self.session.as_ref().map(PollingSession::outcome)
    }
}
