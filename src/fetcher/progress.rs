//! Progress reporting -- coarse completion counts rendered off the drain loop.
//!
//! The orchestrator publishes the completed count on a `watch` channel and never
//! waits on the renderer. If rendering falls behind, intermediate counts are
//! coalesced; the channel holds a single value, so nothing queues up.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// Receives "done out of total" updates while a run drains.
///
/// Values of `done` only ever increase. Implementations should return quickly;
/// they run on the async runtime.
pub trait ProgressSink: Send + Sync + 'static {
    /// Render the current position
    fn render(&self, done: usize, total: usize);
}

/// Logs progress through `tracing` every 10 percent
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: AtomicUsize,
}

impl ProgressSink for LogProgress {
    fn render(&self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let decile = done * 10 / total;
        let previous = self.last_decile.fetch_max(decile, Ordering::Relaxed);
        if decile > previous || done == 0 {
            tracing::info!(
                done,
                total,
                "progress: {done}/{total} ({}%)",
                done * 100 / total
            );
        }
    }
}

/// Background task feeding a [`ProgressSink`] from the orchestrator's counter.
pub(crate) struct ProgressReporter {
    tx: watch::Sender<usize>,
    task: tokio::task::JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawn the reporter; it renders `0/total` straight away.
    pub(crate) fn spawn(sink: Arc<dyn ProgressSink>, total: usize) -> Self {
        let (tx, mut rx) = watch::channel(0usize);

        let task = tokio::spawn(async move {
            let mut rendered = 0;
            sink.render(rendered, total);

            while rx.changed().await.is_ok() {
                let done = *rx.borrow_and_update();
                if done > rendered {
                    rendered = done;
                    sink.render(rendered, total);
                }
            }

            // Sender dropped; make sure the final position is shown
            let done = *rx.borrow();
            if done > rendered {
                sink.render(done, total);
            }
        });

        Self { tx, task }
    }

    /// Publish a new completed count. Never blocks.
    pub(crate) fn advance(&self, done: usize) {
        self.tx.send_replace(done);
    }

    /// Close the channel and wait for the last render.
    pub(crate) async fn finish(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "progress reporter task failed");
        }
    }
}
