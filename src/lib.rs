//! # batch-dl
//!
//! Bounded-concurrency batch downloader for keyed HTTP resources.
//!
//! ## Design Philosophy
//!
//! batch-dl is designed to be:
//! - **Bounded** - At most `concurrency` requests are ever in flight
//! - **Non-blocking** - Disk writes run on a dedicated blocking pool, never on the async workers
//! - **Total** - Every identifier ends up counted exactly once as ok, not found or error
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_dl::{BatchFetcher, Config, IdentifierSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         base_url: "http://localhost:8001/flags".to_string(),
//!         concurrency: 100,
//!         output_dir: "downloads".into(),
//!         ..Default::default()
//!     };
//!
//!     let fetcher = BatchFetcher::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let counts = fetcher.run(&IdentifierSet::every_two_letter()).await?;
//!     println!("{} flags downloaded", counts.ok);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client seam and reqwest implementation
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch orchestration (decomposed into focused submodules)
pub mod fetcher;
/// Concurrency gate bounding in-flight requests
pub mod gate;
/// Blocking-work offloader for persistence
pub mod offload;
/// Payload stores
pub mod storage;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{HttpResponse, ReqwestClient, ResourceClient, TransportError};
pub use config::{Config, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, Naming};
pub use error::{Error, FetchCause, FetchError, Result};
pub use fetcher::{BatchFetcher, LogProgress, ProgressSink};
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use offload::BlockingOffloader;
pub use storage::{FileStore, MemoryStore, Store};
pub use types::{
    AggregateCounts, Event, FetchOutcome, FetchResult, Identifier, IdentifierSet, OutcomeStatus,
    RunState,
};
