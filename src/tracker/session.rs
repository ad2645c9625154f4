use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::job::{JobId, JobStatus};
use crate::services::status::{StatusFetchError, StatusSource};
use crate::tracker::observer::{ObserverRegistry, StatusCallback};
use crate::tracker::scheduler::{PollPolicy, TimeoutCallback};

/// How a polling session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The job reported `completed` or `failed` (a backend cancellation reads as `failed`).
    Terminal(JobStatus),
    /// The attempt limit ran out before a terminal status arrived.
    TimedOut { attempts: u32 },
    /// The session was stopped, replaced or dropped.
    Stopped,
}

impl SessionEnd {
    fn label(&self) -> &'static str {
        match self {
            SessionEnd::Terminal(_) => "terminal",
            SessionEnd::TimedOut { .. } => "timed_out",
            SessionEnd::Stopped => "stopped",
        }
    }
}

struct SessionState {
    live: bool,
    observers: ObserverRegistry,
    latest: Option<JobStatus>,
    attempts: u32,
}

enum Delivery {
    Continue,
    Finished,
    Stopped,
}

/// State shared between a session handle and its polling task.
///
/// The mutex is held while observers run, and `stop` clears `live` under the
/// same lock: once `stop` returns, no observer can start.
struct SessionShared {
    state: Mutex<SessionState>,
    outcome: watch::Sender<Option<SessionEnd>>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a new attempt, or `None` if the session is no longer live.
    fn begin_attempt(&self) -> Option<u32> {
        let mut state = self.lock();
        if !state.live {
            return None;
        }
        state.attempts += 1;
        Some(state.attempts)
    }

    fn deliver(&self, status: JobStatus) -> Delivery {
        let mut state = self.lock();
        if !state.live {
            return Delivery::Stopped;
        }

        state.latest = Some(status.clone());
        state.observers.notify(&status);

        if !status.is_terminal() {
            return Delivery::Continue;
        }

        state.live = false;
        state.observers.clear();
        drop(state);

        self.finish(SessionEnd::Terminal(status));
        Delivery::Finished
    }

    fn time_out(&self, job_id: &JobId, attempts: u32, on_timeout: Option<&TimeoutCallback>) {
        let mut state = self.lock();
        if !state.live {
            return;
        }
        state.live = false;
        state.observers.clear();
        if let Some(callback) = on_timeout {
            callback(job_id, attempts);
        }
        drop(state);

        self.finish(SessionEnd::TimedOut { attempts });
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.live = false;
        state.observers.clear();
        drop(state);

        self.finish(SessionEnd::Stopped);
    }

    /// Publish the end of the session. Only the first call wins.
    fn finish(&self, end: SessionEnd) {
        let label = end.label();
        let published = self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(end);
            true
        });
        if published {
            metrics::counter!("job_sessions_total", "end" => label).increment(1);
        }
    }
}

/// Marks the session stopped if the polling task exits without publishing an
/// outcome (abort, or a panicking observer).
struct EndGuard(Arc<SessionShared>);

impl Drop for EndGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Bookkeeping for one tracked job: owns the polling task and its listeners.
///
/// Dropping the session stops it.
pub struct PollingSession {
    job_id: JobId,
    shared: Arc<SessionShared>,
    timer: JoinHandle<()>,
}

impl PollingSession {
    /// Spawn the polling task. The first poll runs without delay.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        job_id: JobId,
        source: Arc<dyn StatusSource>,
        policy: PollPolicy,
        on_update: Option<StatusCallback>,
    ) -> Self {
        let mut observers = ObserverRegistry::new();
        if let Some(callback) = on_update {
            observers.register(callback);
        }

        let (outcome, _) = watch::channel(None);
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState {
                live: true,
                observers,
                latest: None,
                attempts: 0,
            }),
            outcome,
        });

        let timer = tokio::spawn(run(Arc::clone(&shared), source, job_id.clone(), policy));

        Self {
            job_id,
            shared,
            timer,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// True until the session is stopped or reaches an end.
    pub fn is_live(&self) -> bool {
        self.shared.lock().live
    }

    pub fn attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    /// Most recent status delivered to observers.
    pub fn latest(&self) -> Option<JobStatus> {
        self.shared.lock().latest.clone()
    }

    /// Attach another listener. Returns false if the session already ended.
    pub fn subscribe(&self, callback: StatusCallback) -> bool {
        let mut state = self.shared.lock();
        if !state.live {
            return false;
        }
        state.observers.register(callback);
        true
    }

    pub fn outcome(&self) -> watch::Receiver<Option<SessionEnd>> {
        self.shared.outcome.subscribe()
    }

    /// Stop polling. Idempotent; no observer runs after this returns.
    pub fn stop(&self) {
        self.shared.stop();
        self.timer.abort();
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    shared: Arc<SessionShared>,
    source: Arc<dyn StatusSource>,
    job_id: JobId,
    policy: PollPolicy,
) {
    let _guard = EndGuard(Arc::clone(&shared));

    loop {
        let Some(attempt) = shared.begin_attempt() else {
            return;
        };

        let started = Instant::now();
        let result = match policy.request_timeout {
            Some(limit) => tokio::time::timeout(limit, source.fetch_status(&job_id))
                .await
                .unwrap_or_else(|_| Err(StatusFetchError::Timeout(limit))),
            None => source.fetch_status(&job_id).await,
        };
        metrics::histogram!("job_status_poll_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(status) => {
                metrics::counter!("job_status_polls_total", "outcome" => "ok").increment(1);
                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    status = %status.status,
                    progress = status.progress,
                    "Polled job status"
                );

                match shared.deliver(status) {
                    Delivery::Continue => {}
                    Delivery::Finished | Delivery::Stopped => return,
                }
            }
            Err(e) => {
                metrics::counter!("job_status_polls_total", "outcome" => "error").increment(1);
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    status_code = ?e.status_code(),
                    error = %e,
                    "Status poll failed, retrying on next tick"
                );
            }
        }

        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                tracing::warn!(job_id = %job_id, attempts = attempt, "Giving up on job after max attempts");
                shared.time_out(&job_id, attempt, policy.on_timeout.as_ref());
                return;
            }
        }

        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobState;
    use crate::tracker::scheduler::tests::{recorder, status};

    fn shared_with(callback: StatusCallback) -> SessionShared {
        let mut observers = ObserverRegistry::new();
        observers.register(callback);
        let (outcome, _) = watch::channel(None);
        SessionShared {
            state: Mutex::new(SessionState {
                live: true,
                observers,
                latest: None,
                attempts: 0,
            }),
            outcome,
        }
    }

    #[test]
    fn test_response_after_stop_is_not_delivered() {
        let job_id = JobId::new("abc123").unwrap();
        let (seen, callback) = recorder();
        let shared = shared_with(callback);

        assert_eq!(shared.begin_attempt(), Some(1));
        shared.stop();

        assert!(matches!(
            shared.deliver(status(&job_id, JobState::Completed, 100)),
            Delivery::Stopped
        ));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(shared.begin_attempt(), None);
    }

    #[test]
    fn test_first_end_wins() {
        let job_id = JobId::new("abc123").unwrap();
        let (_, callback) = recorder();
        let shared = shared_with(callback);
        let outcome = shared.outcome.subscribe();

        let done = status(&job_id, JobState::Failed, 40);
        assert!(matches!(shared.deliver(done.clone()), Delivery::Finished));
        shared.stop();
        shared.time_out(&job_id, 9, None);

        assert_eq!(*outcome.borrow(), Some(SessionEnd::Terminal(done)));
    }
}
