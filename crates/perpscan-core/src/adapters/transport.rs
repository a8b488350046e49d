//! Breaker-guarded JSON GET shared by the venue adapters.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest};

/// Fetch and decode one upstream JSON document.
///
/// Status mapping: 429 becomes `RateLimited`, any other non-2xx or a
/// transport failure becomes `Unavailable`, and a 2xx body that does not
/// decode is `Unavailable` as well (malformed payload). Breaker accounting
/// follows transport health: a decoded or undecodable 2xx still counts as a
/// reachable upstream.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http_client: &Arc<dyn HttpClient>,
    breaker: &CircuitBreaker,
    venue: &str,
    url: String,
    timeout_ms: u64,
) -> Result<T, SourceError> {
    if !breaker.allow_request() {
        return Err(SourceError::unavailable(format!(
            "{venue} circuit breaker is open; skipping upstream call"
        )));
    }

    let request = HttpRequest::get(url).with_timeout_ms(timeout_ms);
    let response = http_client.execute(request).await.map_err(|error| {
        breaker.record_failure();
        if error.retryable() {
            SourceError::unavailable(format!("{venue} transport error: {}", error.message()))
        } else {
            SourceError::internal(format!("{venue} transport error: {}", error.message()))
        }
    })?;

    if response.is_rate_limited() {
        breaker.record_failure();
        return Err(SourceError::rate_limited(format!(
            "{venue} upstream returned status 429"
        )));
    }

    if !response.is_success() {
        breaker.record_failure();
        return Err(SourceError::unavailable(format!(
            "{venue} upstream returned status {}",
            response.status
        )));
    }

    breaker.record_success();

    serde_json::from_str::<T>(&response.body).map_err(|error| {
        SourceError::unavailable(format!("{venue} returned malformed payload: {error}"))
    })
}
