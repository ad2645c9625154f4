use crate::models::job::JobStatus;

/// Callback invoked with each status a session receives.
///
/// Callbacks run on the polling task while the session lock is held, and
/// `stop_polling` waits on that same lock. Keep them short and non-blocking,
/// and hand heavy work off to a channel or another task.
pub type StatusCallback = Box<dyn FnMut(&JobStatus) + Send + 'static>;

/// Listeners for one polling session.
///
/// Sessions register at most one callback through `start_polling`; further
/// listeners can be attached with `subscribe` without touching the scheduler.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<StatusCallback>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: StatusCallback) {
        self.observers.push(callback);
    }

    /// Invoke every listener in registration order.
    pub fn notify(&mut self, status: &JobStatus) {
        for observer in self.observers.iter_mut() {
            observer(status);
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
