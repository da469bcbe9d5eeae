//! Core types and events for batch-dl

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key identifying one unit of fetch work (e.g. a country code)
///
/// The caller's spelling is kept for reporting; request paths and file names use
/// [`Identifier::normalized`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Create a new Identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as given
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used in every derived request path
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered batch of identifiers for one run
///
/// Identifiers are always kept sorted so that dispatch order is reproducible
/// across runs with the same input. Duplicates are legal and each one is
/// fetched and counted on its own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: Vec<Identifier>,
}

impl IdentifierSet {
    /// Build a set from caller-supplied identifiers, kept verbatim apart from sorting
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        let mut ids: Vec<Identifier> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        Self { ids }
    }

    /// Build a set from raw codes: trimmed, upper-cased, blanks dropped
    ///
    /// # Examples
    ///
    /// ```
    /// use batch_dl::IdentifierSet;
    ///
    /// let set = IdentifierSet::from_codes(["br ", "cn", "", "In"]);
    /// let codes: Vec<&str> = set.iter().map(|id| id.as_str()).collect();
    /// assert_eq!(codes, ["BR", "CN", "IN"]);
    /// ```
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_uppercase())
                .filter(|c| !c.is_empty()),
        )
    }

    /// Every two-letter code from `AA` to `ZZ` (676 identifiers)
    pub fn every_two_letter() -> Self {
        let letters = b'A'..=b'Z';
        let ids = letters
            .clone()
            .flat_map(|a| {
                letters
                    .clone()
                    .map(move |b| Identifier::new(format!("{}{}", a as char, b as char)))
            })
            .collect();
        Self { ids }
    }

    /// Keep only the first `n` identifiers (in sorted order)
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.ids.truncate(n);
        self
    }

    /// Number of identifiers in the batch
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in dispatch order
    pub fn iter(&self) -> std::slice::Iter<'_, Identifier> {
        self.ids.iter()
    }
}

impl<'a> IntoIterator for &'a IdentifierSet {
    type Item = &'a Identifier;
    type IntoIter = std::slice::Iter<'a, Identifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// Classified end state of one fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Resource fetched and handed to persistence
    Ok,
    /// Server reported the resource does not exist
    NotFound,
    /// Any other status, or a transport / decode failure
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::NotFound => "not_found",
            OutcomeStatus::Error => "error",
        })
    }
}

/// Outcome of one fetch before the payload is dropped
///
/// `T` is the payload of a successful fetch: raw bytes by default, or whatever a
/// later step decoded from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome<T = Vec<u8>> {
    /// Payload of a 200 response
    Ok(T),
    /// 404 response
    NotFound,
    /// Anything else, with the original cause attached
    Error(crate::error::FetchError),
}

impl<T> FetchOutcome<T> {
    /// Status this outcome is counted under
    pub fn status(&self) -> OutcomeStatus {
        match self {
            FetchOutcome::Ok(_) => OutcomeStatus::Ok,
            FetchOutcome::NotFound => OutcomeStatus::NotFound,
            FetchOutcome::Error(_) => OutcomeStatus::Error,
        }
    }

    /// Transform the payload, keeping `NotFound` and `Error` as they are
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Ok(payload) => FetchOutcome::Ok(f(payload)),
            FetchOutcome::NotFound => FetchOutcome::NotFound,
            FetchOutcome::Error(e) => FetchOutcome::Error(e),
        }
    }
}

/// The unit streamed back to the orchestrator: identifier plus status, payload discarded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Identifier this result belongs to
    pub identifier: Identifier,
    /// Classified status
    pub status: OutcomeStatus,
}

/// Per-status tally of a run
///
/// The sum of the counters always equals the number of results recorded so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    /// Successful fetches
    pub ok: usize,
    /// Resources the server reported missing
    pub not_found: usize,
    /// Failed fetches
    pub error: usize,
}

impl AggregateCounts {
    /// Count for one status
    pub fn get(&self, status: OutcomeStatus) -> usize {
        match status {
            OutcomeStatus::Ok => self.ok,
            OutcomeStatus::NotFound => self.not_found,
            OutcomeStatus::Error => self.error,
        }
    }

    /// Number of results recorded
    pub fn total(&self) -> usize {
        self.ok + self.not_found + self.error
    }

    pub(crate) fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Ok => self.ok += 1,
            OutcomeStatus::NotFound => self.not_found += 1,
            OutcomeStatus::Error => self.error += 1,
        }
    }
}

/// Lifecycle of one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, not yet started
    Init,
    /// Launching one worker per identifier
    Spawning,
    /// Consuming completions in finish order
    Draining,
    /// Every completion observed, counts returned
    Done,
    /// Aborted by a worker defect
    Failed,
}

/// Events broadcast while a run is in progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One identifier finished (emitted in completion order)
    Completed {
        /// Identifier that finished
        identifier: Identifier,
        /// Its classified status
        status: OutcomeStatus,
        /// Number of identifiers finished so far, including this one
        completed: usize,
        /// Batch size
        total: usize,
    },

    /// A fetch ended in the `error` status
    FetchFailed {
        /// Identifier whose fetch failed
        identifier: Identifier,
        /// Human-readable cause
        error: String,
    },

    /// A persistence operation failed on the blocking pool
    ///
    /// The identifier is still counted as `ok`.
    PersistFailed {
        /// Name of the item being persisted
        name: String,
        /// Error message
        error: String,
    },

    /// The run finished and returned its counts
    RunFinished {
        /// Final tally
        counts: AggregateCounts,
    },
}
