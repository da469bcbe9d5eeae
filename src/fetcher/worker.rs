//! Fetch worker -- one gated fetch, classification and persistence hand-off per identifier.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::client::{HttpResponse, ResourceClient};
use crate::config::Naming;
use crate::error::{Error, FetchCause, FetchError, Result};
use crate::gate::ConcurrencyGate;
use crate::offload::BlockingOffloader;
use crate::storage::Store;
use crate::types::{Event, FetchOutcome, FetchResult, Identifier};

use super::classify::classify;

/// Shared state for every worker of one run, reducing parameter passing.
pub(crate) struct WorkerContext {
    pub(crate) base_url: String,
    pub(crate) naming: Naming,
    pub(crate) verbose: bool,
    pub(crate) client: Arc<dyn ResourceClient>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) gate: ConcurrencyGate,
    pub(crate) offloader: BlockingOffloader,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// A fetched payload and the name it will be stored under.
#[derive(Debug)]
pub(crate) struct Payload {
    pub(crate) bytes: Vec<u8>,
    pub(crate) file_name: String,
}

/// The part of `{id}/metadata.json` used for naming.
#[derive(Debug, Deserialize)]
struct CountryMetadata {
    country: String,
}

impl WorkerContext {
    fn resource_url(&self, identifier: &Identifier) -> String {
        let cc = identifier.normalized();
        format!("{}/{cc}/{cc}.gif", self.base_url)
    }

    fn metadata_url(&self, identifier: &Identifier) -> String {
        format!("{}/{}/metadata.json", self.base_url, identifier.normalized())
    }

    /// One GET under the gate. The permit is released as soon as the response
    /// (or transport failure) is in hand, before any further processing.
    async fn gated_get(
        &self,
        identifier: &Identifier,
        url: &str,
    ) -> Result<FetchOutcome<HttpResponse>> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| Error::WorkerDefect {
                identifier: identifier.clone(),
                message: e.to_string(),
            })?;
        tracing::trace!(identifier = %identifier, url, "request admitted");

        let response = self.client.get(url).await;
        drop(permit);

        Ok(classify(identifier, response))
    }

    /// Hand the payload to the blocking pool; does not wait for the write.
    fn persist(&self, payload: Payload) {
        let store = Arc::clone(&self.store);
        let Payload { bytes, file_name } = payload;
        self.offloader
            .submit(file_name.clone(), move || store.save(&file_name, &bytes));
    }
}

/// Run the full cycle for one identifier and produce exactly one result.
///
/// Remote failures never surface as `Err`: they are classified into the result.
/// `Err` means the worker itself could not operate (closed gate) and is fatal
/// for the run.
pub(crate) async fn fetch_one(ctx: &WorkerContext, identifier: Identifier) -> Result<FetchResult> {
    let outcome = fetch_payload(ctx, &identifier).await?;
    let status = outcome.status();

    match outcome {
        FetchOutcome::Ok(payload) => {
            ctx.persist(payload);
            if ctx.verbose {
                tracing::info!(identifier = %identifier, "{identifier} OK");
            }
        }
        FetchOutcome::NotFound => {
            if ctx.verbose {
                tracing::info!(identifier = %identifier, "{identifier} not found");
            }
        }
        FetchOutcome::Error(err) => {
            if ctx.verbose {
                tracing::warn!(identifier = %identifier, error = %err.cause, "{err}");
            }
            ctx.event_tx
                .send(Event::FetchFailed {
                    identifier: identifier.clone(),
                    error: err.cause.to_string(),
                })
                .ok();
        }
    }

    Ok(FetchResult { identifier, status })
}

/// Fetch the resource and work out its file name.
///
/// With [`Naming::CountryMetadata`] this costs a second gated request; a miss or
/// failure on either request decides the outcome.
pub(crate) async fn fetch_payload(
    ctx: &WorkerContext,
    identifier: &Identifier,
) -> Result<FetchOutcome<Payload>> {
    let url = ctx.resource_url(identifier);
    let bytes = match ctx.gated_get(identifier, &url).await? {
        FetchOutcome::Ok(resp) => resp.body,
        FetchOutcome::NotFound => return Ok(FetchOutcome::NotFound),
        FetchOutcome::Error(e) => return Ok(FetchOutcome::Error(e)),
    };

    let file_name = match ctx.naming {
        Naming::Code => FetchOutcome::Ok(format!("{}.gif", identifier.normalized())),
        Naming::CountryMetadata => fetch_country(ctx, identifier)
            .await?
            .map(|country| format!("{}-{}.gif", country.replace(' ', "_"), identifier)),
    };

    Ok(file_name.map(|file_name| Payload { bytes, file_name }))
}

async fn fetch_country(ctx: &WorkerContext, identifier: &Identifier) -> Result<FetchOutcome<String>> {
    let url = ctx.metadata_url(identifier);
    let outcome = match ctx.gated_get(identifier, &url).await? {
        FetchOutcome::Ok(resp) => decode_country(identifier, &url, &resp),
        FetchOutcome::NotFound => FetchOutcome::NotFound,
        FetchOutcome::Error(e) => FetchOutcome::Error(e),
    };
    Ok(outcome)
}

fn decode_country(identifier: &Identifier, url: &str, resp: &HttpResponse) -> FetchOutcome<String> {
    let decode_error = |message: String| {
        FetchOutcome::Error(FetchError::new(
            identifier.clone(),
            FetchCause::Decode { message },
        ))
    };

    if !resp.is_json(url) {
        return decode_error(format!(
            "expected JSON metadata, got content type {}",
            resp.content_type.as_deref().unwrap_or("<none>")
        ));
    }

    match resp.json::<CountryMetadata>() {
        Ok(meta) if !meta.country.trim().is_empty() => FetchOutcome::Ok(meta.country),
        Ok(_) => decode_error("metadata has an empty country name".to_string()),
        Err(e) => decode_error(e.to_string()),
    }
}
