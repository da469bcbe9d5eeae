//! Blocking-work offloader
//!
//! Runs blocking side effects (writing payloads to disk) on tokio's blocking
//! pool so they never stall the tasks waiting on the network. The offloader has
//! its own permit count, independent of the fetch [`ConcurrencyGate`]; a burst of
//! successful fetches queues cheap futures here instead of spawning unbounded
//! threads.
//!
//! Submission is fire-and-forget. A failing operation is logged and broadcast as
//! [`Event::PersistFailed`], and counted in [`BlockingOffloader::failures`]; it is
//! never reported back to the submitter.
//!
//! [`ConcurrencyGate`]: crate::gate::ConcurrencyGate

use crate::error::{Error, Result};
use crate::types::Event;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::task::TaskTracker;

/// Bounded pool for blocking operations
#[derive(Clone, Debug)]
pub struct BlockingOffloader {
    permits: Arc<Semaphore>,
    workers: usize,
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
    event_tx: broadcast::Sender<Event>,
}

impl BlockingOffloader {
    /// Create an offloader that runs at most `workers` operations at once
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `workers` is zero.
    pub fn new(workers: usize, event_tx: broadcast::Sender<Event>) -> Result<Self> {
        if workers == 0 {
            return Err(Error::config(
                "blocking_workers",
                "blocking worker pool needs at least one worker",
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            tracker: TaskTracker::new(),
            failures: Arc::new(AtomicU64::new(0)),
            event_tx,
        })
    }

    /// Schedule `op` and return immediately
    ///
    /// `label` names the work in logs and in [`Event::PersistFailed`].
    /// Must be called from within a tokio runtime.
    pub fn submit<F, E>(&self, label: impl Into<String>, op: F)
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let label = label.into();
        let permits = Arc::clone(&self.permits);
        let failures = Arc::clone(&self.failures);
        let event_tx = self.event_tx.clone();

        self.tracker.spawn(async move {
            // Held until the blocking operation returns
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    report_failure(&failures, &event_tx, label, "blocking pool is closed".into());
                    return;
                }
            };

            match tokio::task::spawn_blocking(op).await {
                Ok(Ok(())) => {
                    tracing::debug!(name = %label, "blocking operation finished");
                }
                Ok(Err(e)) => {
                    report_failure(&failures, &event_tx, label, e.to_string());
                }
                Err(e) => {
                    report_failure(
                        &failures,
                        &event_tx,
                        label,
                        format!("blocking operation panicked: {e}"),
                    );
                }
            }
        });
    }

    /// Maximum number of operations running at once
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Operations submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Operations that returned an error or panicked
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Wait until every operation submitted so far has finished
    ///
    /// The offloader stays usable afterwards.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

fn report_failure(
    failures: &AtomicU64,
    event_tx: &broadcast::Sender<Event>,
    name: String,
    error: String,
) {
    failures.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(name = %name, error = %error, "blocking operation failed");
    event_tx.send(Event::PersistFailed { name, error }).ok();
}
