//! Periodic reaping of dead memory sessions

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::MemoryStore;
use crate::error::{Result, SessionError};

/// Default interval between sweep passes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Background task owned by a memory provider
///
/// Stops when cancelled through [`Sweeper::stop`] or when dropped.
#[derive(Debug)]
pub(crate) struct Sweeper {
    interval: Duration,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime
    pub(crate) fn spawn(store: Arc<MemoryStore>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SessionError::Config(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SessionError::Config("memory provider requires a running tokio runtime".to_string())
        })?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = store.sweep();
                        if reaped > 0 {
                            debug!(reaped, remaining = store.len(), "Swept expired sessions");
                        } else {
                            trace!("Session sweep found nothing to reap");
                        }
                    }
                }
            }
            info!("Session sweeper stopped");
        });

        debug!(interval_secs = interval.as_secs(), "Session sweeper started");
        Ok(Self {
            interval,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the loop and wait for it to exit
    pub(crate) async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
