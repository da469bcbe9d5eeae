//! HTTP client seam
//!
//! The fetch path only needs "GET a URL, look at status, content type and body".
//! [`ResourceClient`] captures exactly that so tests and embedders can swap the
//! transport; [`ReqwestClient`] is the production implementation.

use crate::config::Config;
use crate::error::Result;
use serde::de::DeserializeOwned;

/// A response as seen by the fetch worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code
    pub status: u16,
    /// Reason phrase for the status (may be empty)
    pub reason: String,
    /// Value of the Content-Type header, if present
    pub content_type: Option<String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Response with the canonical reason phrase for `status` and no content type
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            content_type: None,
            body: body.into(),
        }
    }

    /// Set the Content-Type header
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether the body should be decoded as JSON
    ///
    /// True when the content type mentions `json`, or when the URL itself ends in
    /// `json` (some static servers label `.json` files as `text/plain`).
    pub fn is_json(&self, url: &str) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_lowercase().contains("json"))
            || url.ends_with("json")
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Failure to obtain any response (connect, timeout, TLS, protocol, body read)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Description of the underlying failure
    pub message: String,
}

impl TransportError {
    /// Wrap a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest's Display hides the root cause; walk the chain so the
        // operator sees "connection refused" rather than "error sending request".
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }
}

/// Abstraction over HTTP GET, enabling testability
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    /// Issue one GET and return whatever status the server answered with
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production [`ResourceClient`] backed by a shared reqwest connection pool
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build a client honouring the timeout and user agent in `config`
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResourceClient for ReqwestClient {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // hyper only records the phrase when it differs from the canonical one
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason,
            content_type,
            body: body.to_vec(),
        })
    }
}
