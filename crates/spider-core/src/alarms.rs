//! Named one-shot wake-ups.
//!
//! A wake-up fires once at an absolute time. Creating a wake-up under a name
//! that is already pending replaces the earlier one, so at most one wake-up
//! per name is ever outstanding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::Clock;

pub trait Alarms: Send + Sync {
    /// Register (or replace) the wake-up `name` to fire at `when`.
    fn create(&self, name: &str, when: DateTime<Utc>);

    /// Cancel the wake-up `name`. Returns whether one was pending.
    fn clear(&self, name: &str) -> bool;
}

/// Wake-ups backed by tokio timers. Fired names arrive on the receiver
/// returned from [`TokioAlarms::new`].
pub struct TokioAlarms {
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
    fired: mpsc::UnboundedSender<String>,
}

impl TokioAlarms {
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let alarms = Self {
            clock,
            pending: Mutex::new(HashMap::new()),
            fired,
        };
        (alarms, rx)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Alarms for TokioAlarms {
    fn create(&self, name: &str, when: DateTime<Utc>) {
        // Times in the past fire immediately.
        let delay = (when - self.clock.now()).to_std().unwrap_or_default();
        let fired = self.fired.clone();
        let alarm_name = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(alarm = %alarm_name, "Wake-up fired");
            // The receiver is gone only during shutdown.
            let _ = fired.send(alarm_name);
        });

        if let Some(previous) = self.lock().insert(name.to_string(), handle) {
            previous.abort();
        }
        debug!(alarm = %name, when = %when, delay_secs = delay.as_secs(), "Wake-up scheduled");
    }

    fn clear(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }
}

impl Drop for TokioAlarms {
    fn drop(&mut self) {
        for (_, handle) in self.lock().drain() {
            handle.abort();
        }
    }
}
