//! Configuration types for batch-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Concurrency used when none is configured
///
/// Kept low so public mirrors don't start answering 503.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound accepted for [`Config::concurrency`]
pub const MAX_CONCURRENCY: usize = 1000;

/// How a fetched payload is named when it is persisted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Naming {
    /// `{id}.gif`, from the identifier alone
    #[default]
    Code,
    /// `{Country}-{ID}.gif`, using the `country` field of `{id}/metadata.json`
    ///
    /// Costs a second gated request per identifier.
    CountryMetadata,
}

/// Main configuration for [`BatchFetcher`](crate::BatchFetcher)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL resources are fetched from (e.g. "http://localhost:8001/flags")
    pub base_url: String,

    /// Maximum simultaneous in-flight requests (default: 5, max: 1000)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Threads available for persisting payloads (default: 4)
    ///
    /// Independent of `concurrency`; persistence never holds a request slot.
    #[serde(default = "default_blocking_workers")]
    pub blocking_workers: usize,

    /// Directory fetched payloads are written to (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Per-request timeout (None = no timeout)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// File naming scheme for persisted payloads
    #[serde(default)]
    pub naming: Naming,

    /// Log one line per finished identifier
    #[serde(default)]
    pub verbose: bool,

    /// Render coarse progress while the run drains
    #[serde(default)]
    pub progress: bool,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            concurrency: default_concurrency(),
            blocking_workers: default_blocking_workers(),
            output_dir: default_output_dir(),
            request_timeout: None,
            user_agent: default_user_agent(),
            naming: Naming::default(),
            verbose: false,
            progress: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Check every setting a run depends on
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::config(
                "concurrency",
                format!(
                    "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                    self.concurrency
                ),
            ));
        }

        if self.blocking_workers == 0 {
            return Err(Error::config(
                "blocking_workers",
                "blocking_workers must be at least 1",
            ));
        }

        if self.event_capacity == 0 {
            return Err(Error::config(
                "event_capacity",
                "event_capacity must be at least 1",
            ));
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::config("base_url", format!("invalid base URL {:?}: {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "base_url",
                format!("unsupported URL scheme {:?}", url.scheme()),
            ));
        }

        Ok(())
    }

    /// Base URL without trailing slashes, ready for path joins
    pub(crate) fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn default_base_url() -> String {
    "http://localhost:8001/flags".to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_blocking_workers() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_user_agent() -> String {
    concat!("batch-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_event_capacity() -> usize {
    1000
}

// Optional Duration serialization helper (whole seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(err: Error) -> Option<String> {
        match err {
            Error::Config { key, .. } => key,
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert_eq!(
            key_of(config.validate().unwrap_err()).as_deref(),
            Some("concurrency")
        );
    }

    #[test]
    fn concurrency_above_max_is_rejected() {
        let config = Config {
            concurrency: MAX_CONCURRENCY + 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let at_max = Config {
            concurrency: MAX_CONCURRENCY,
            ..Config::default()
        };
        at_max.validate().unwrap();
    }

    #[test]
    fn zero_blocking_workers_is_rejected() {
        let config = Config {
            blocking_workers: 0,
            ..Config::default()
        };
        assert_eq!(
            key_of(config.validate().unwrap_err()).as_deref(),
            Some("blocking_workers")
        );
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let config = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        assert_eq!(
            key_of(config.validate().unwrap_err()).as_deref(),
            Some("base_url")
        );
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let config = Config {
            base_url: "ftp://mirror.example.com/flags".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = Config {
            base_url: "http://example.com/flags//".into(),
            ..Config::default()
        };
        assert_eq!(config.trimmed_base_url(), "http://example.com/flags");
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"base_url": "http://example.com/flags"}"#).unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.blocking_workers, 4);
        assert_eq!(config.naming, Naming::Code);
        assert_eq!(config.request_timeout, None);
        assert!(!config.verbose);
    }

    #[test]
    fn request_timeout_round_trips_as_seconds() {
        let config = Config {
            request_timeout: Some(Duration::from_secs(30)),
            naming: Naming::CountryMetadata,
            ..Config::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["request_timeout"], 30);
        assert_eq!(json["naming"], "country_metadata");

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(back.naming, Naming::CountryMetadata);
    }
}
