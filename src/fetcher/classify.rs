//! Response classification -- status code to outcome.

use crate::client::{HttpResponse, TransportError};
use crate::error::{FetchCause, FetchError};
use crate::types::{FetchOutcome, Identifier};

/// Map one GET result onto the closed outcome set.
///
/// 200 keeps the response, 404 is `NotFound`, every other status and every
/// transport failure becomes `Error` tagged with `identifier`. Pure: the same
/// input always yields the same outcome.
pub(crate) fn classify(
    identifier: &Identifier,
    response: Result<HttpResponse, TransportError>,
) -> FetchOutcome<HttpResponse> {
    let cause = match response {
        Ok(resp) if resp.status == 200 => return FetchOutcome::Ok(resp),
        Ok(resp) if resp.status == 404 => return FetchOutcome::NotFound,
        Ok(resp) => FetchCause::Status {
            code: resp.status,
            reason: resp.reason,
        },
        Err(e) => FetchCause::Transport { message: e.message },
    };
    FetchOutcome::Error(FetchError::new(identifier.clone(), cause))
}
