//! Tokio-backed one-shot timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::capability::{TimerHost, TimerId};
use crate::driver::{DriverHandle, DriverMessage};

/// Timer host that parks one task per armed timer. Expiry comes back
/// through the driver channel, so it lands on the engine in order with
/// everything else.
#[derive(Debug)]
pub struct TokioTimerHost {
    handle: DriverHandle,
    next: u64,
    tasks: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioTimerHost {
    /// New host reporting into the given driver. Must be created and
    /// used inside a tokio runtime.
    #[must_use]
    pub fn new(handle: DriverHandle) -> Self {
        Self {
            handle,
            next: 0,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Timers currently armed.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl TimerHost for TokioTimerHost {
    fn arm(&mut self, delay: Duration) -> TimerId {
        self.next += 1;
        let id = TimerId(self.next);
        let handle = self.handle.clone();
        let tasks = Arc::clone(&self.tasks);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().remove(&id);
            handle.send(DriverMessage::TimerFired(id));
        });
        self.tasks.lock().insert(id, task.abort_handle());
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.tasks.lock().remove(&timer) {
            task.abort();
        }
    }
}
