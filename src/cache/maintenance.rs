//! Periodic Background Tasks
//!
//! A task owns a tokio interval loop and the token that stops it. Tasks are
//! held by the component they maintain and are stopped by that component's
//! `close`, so no timer outlives its owner.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Handle to a running interval loop
pub struct PeriodicTask {
    name: String,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period` on the current tokio runtime
    ///
    /// The first tick fires one full period after spawning. The loop ends
    /// when the task is stopped or when `tick` returns `Break`.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let name = name.into();
        if period.is_zero() {
            return Err(Error::Configuration(format!(
                "task {} needs a non-zero period",
                name
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("task {} needs a tokio runtime: {}", name, e)))?;

        let token = CancellationToken::new();
        let child = token.clone();
        let task_name = name.clone();

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        trace!(task = %task_name, "Periodic task tick");
                        if tick().await.is_break() {
                            break;
                        }
                    }
                }
            }
            debug!(task = %task_name, "Periodic task stopped");
        });

        debug!(task = %name, period_ms = period.as_millis() as u64, "Periodic task started");

        Ok(Self {
            name,
            token,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the loop; calling again is a no-op
    pub fn stop(&self) {
        self.token.cancel();
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Whether the loop is still scheduled
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
