//! Concurrency gate capping simultaneous in-flight fetches
//!
//! The gate is a counting semaphore with RAII permits. Dropping a [`GatePermit`]
//! hands the slot back, so a worker that returns early, errors out or panics
//! never shrinks the effective capacity for the rest of the run.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate shared by every fetch worker of a run
///
/// Waiters are served in arrival order (tokio's semaphore is fair).
/// Cloning is cheap; all clones share the same permits and counters.
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    /// Holders right now
    in_flight: Arc<AtomicUsize>,
    /// Highest `in_flight` ever observed
    peak: Arc<AtomicUsize>,
}

/// The gate is closed and no longer admits workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("concurrency gate is closed")]
pub struct GateClosed;

impl ConcurrencyGate {
    /// Create a gate with `capacity` permits
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use batch_dl::ConcurrencyGate;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let gate = ConcurrencyGate::new(2)?;
    /// let permit = gate.acquire().await?;
    /// assert_eq!(gate.in_flight(), 1);
    /// drop(permit);
    /// assert_eq!(gate.in_flight(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config(
                "concurrency",
                "concurrency gate capacity must be at least 1",
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a free slot and reserve it
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self) -> std::result::Result<GatePermit, GateClosed> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(GatePermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Configured number of permits
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Workers currently past admission
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous holders seen since creation
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Stop admitting workers; pending and future `acquire` calls fail with [`GateClosed`]
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// One reserved slot of a [`ConcurrencyGate`]
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Decrement before the semaphore permit is returned so the counter never
        // shows more holders than permits.
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
