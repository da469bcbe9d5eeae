//! Batch orchestration split into focused submodules.
//!
//! - [`classify`] - Status code to outcome mapping
//! - [`worker`] - Gated fetch, classification and persistence hand-off for one identifier
//! - [`progress`] - Coarse progress rendering off the drain loop
//!
//! [`BatchFetcher`] ties them together: it spawns one worker task per identifier,
//! drains completions in the order they finish and tallies the outcomes.

mod classify;
mod progress;
mod worker;


pub use progress::{LogProgress, ProgressSink};

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinError;

use crate::client::{ReqwestClient, ResourceClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::ConcurrencyGate;
use crate::offload::BlockingOffloader;
use crate::storage::{FileStore, Store};
use crate::types::{AggregateCounts, Event, FetchResult, Identifier, IdentifierSet, RunState};

use progress::ProgressReporter;
use worker::{WorkerContext, fetch_one};

/// Runs one batch: bounded concurrent fetches, offloaded persistence, aggregated counts.
///
/// A fetcher is single-use; [`BatchFetcher::run`] consumes it.
pub struct BatchFetcher {
    config: Arc<Config>,
    client: Arc<dyn ResourceClient>,
    store: Arc<dyn Store>,
    gate: ConcurrencyGate,
    offloader: BlockingOffloader,
    event_tx: broadcast::Sender<Event>,
    state_tx: watch::Sender<RunState>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
}

impl BatchFetcher {
    /// Create a fetcher using reqwest and writing files to `config.output_dir`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use batch_dl::{BatchFetcher, Config, IdentifierSet};
    ///
    /// # async fn example() -> batch_dl::Result<()> {
    /// let config = Config {
    ///     base_url: "http://localhost:8001/flags".to_string(),
    ///     concurrency: 10,
    ///     ..Default::default()
    /// };
    /// let ids = IdentifierSet::from_codes(["BR", "CN", "IN", "US"]);
    ///
    /// let counts = BatchFetcher::new(config)?.run(&ids).await?;
    /// println!("{} ok, {} not found, {} errors", counts.ok, counts.not_found, counts.error);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(ReqwestClient::new(&config)?);
        let store = Arc::new(FileStore::new(config.output_dir.clone()));
        Self::with_parts(config, client, store)
    }

    /// Create a fetcher with caller-supplied HTTP client and store
    pub fn with_parts(
        config: Config,
        client: Arc<dyn ResourceClient>,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        config.validate()?;

        let gate = ConcurrencyGate::new(config.concurrency)?;
        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        let offloader = BlockingOffloader::new(config.blocking_workers, event_tx.clone())?;
        let (state_tx, _state_rx) = watch::channel(RunState::Init);
        let progress_sink: Option<Arc<dyn ProgressSink>> = if config.progress {
            Some(Arc::new(LogProgress::default()))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            client,
            store,
            gate,
            offloader,
            event_tx,
            state_tx,
            progress_sink,
        })
    }

    /// Render progress through `sink` instead of the default
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// Subscribe to run events
    ///
    /// Subscribers that fall behind lose events rather than slowing the run.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions (usable after `run` has consumed the fetcher)
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// The run's concurrency gate (shares counters with the one workers use)
    pub fn gate(&self) -> ConcurrencyGate {
        self.gate.clone()
    }

    /// The run's blocking pool (shares counters with the one workers use)
    pub fn offloader(&self) -> BlockingOffloader {
        self.offloader.clone()
    }

    /// Fetch every identifier and return the per-status counts
    ///
    /// Completes once every identifier has an outcome; per-identifier errors are
    /// counted, not returned. Persistence submitted during the run has finished
    /// by the time this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `ids` is empty
    /// - [`Error::WorkerDefect`] if a worker panicked or broke its contract; the
    ///   remaining workers are aborted
    pub async fn run(self, ids: &IdentifierSet) -> Result<AggregateCounts> {
        if ids.is_empty() {
            return Err(Error::config(
                "identifiers",
                "batch must contain at least one identifier",
            ));
        }
        let total = ids.len();
        tracing::info!(
            total,
            concurrency = self.gate.capacity(),
            base_url = %self.config.base_url,
            "starting batch"
        );

        self.state_tx.send_replace(RunState::Spawning);
        let ctx = Arc::new(WorkerContext {
            base_url: self.config.trimmed_base_url().to_string(),
            naming: self.config.naming,
            verbose: self.config.verbose,
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
            gate: self.gate.clone(),
            offloader: self.offloader.clone(),
            event_tx: self.event_tx.clone(),
        });

        let mut abort_handles = Vec::with_capacity(total);
        let mut pending = FuturesUnordered::new();
        for identifier in ids {
            let handle = {
                let ctx = Arc::clone(&ctx);
                let identifier = identifier.clone();
                tokio::spawn(async move { fetch_one(&ctx, identifier).await })
            };
            abort_handles.push(handle.abort_handle());
            let dispatched = identifier.clone();
            pending.push(async move { (dispatched, handle.await) });
        }

        self.state_tx.send_replace(RunState::Draining);
        let progress = self
            .progress_sink
            .as_ref()
            .map(|sink| ProgressReporter::spawn(Arc::clone(sink), total));

        let mut counts = AggregateCounts::default();
        while let Some((dispatched, joined)) = pending.next().await {
            let result = match check_result(dispatched, joined) {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "aborting batch");
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    if let Some(progress) = progress {
                        progress.finish().await;
                    }
                    self.state_tx.send_replace(RunState::Failed);
                    return Err(e);
                }
            };

            counts.record(result.status);
            self.event_tx
                .send(Event::Completed {
                    identifier: result.identifier,
                    status: result.status,
                    completed: counts.total(),
                    total,
                })
                .ok();
            if let Some(progress) = &progress {
                progress.advance(counts.total());
            }
        }

        if let Some(progress) = progress {
            progress.finish().await;
        }
        self.offloader.wait_idle().await;

        self.state_tx.send_replace(RunState::Done);
        self.event_tx.send(Event::RunFinished { counts }).ok();
        tracing::info!(
            ok = counts.ok,
            not_found = counts.not_found,
            error = counts.error,
            persist_failures = self.offloader.failures(),
            "batch finished"
        );

        Ok(counts)
    }
}

/// Validate one joined worker against the identifier it was dispatched for.
fn check_result(
    dispatched: Identifier,
    joined: std::result::Result<Result<FetchResult>, JoinError>,
) -> Result<FetchResult> {
    match joined {
        Ok(Ok(result)) if result.identifier == dispatched => Ok(result),
        Ok(Ok(result)) => Err(Error::WorkerDefect {
            message: format!("worker reported a result for {}", result.identifier),
            identifier: dispatched,
        }),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(Error::WorkerDefect {
            identifier: dispatched,
            message: join_error_message(e),
        }),
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}
