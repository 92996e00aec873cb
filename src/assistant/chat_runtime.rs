use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub base_delay_ms: u64,
    /// Ask for an event stream instead of a single JSON document.
    pub streaming: bool,
}

impl RetryPolicy {
    /// Exponential backoff from `base_delay_ms`, capped at thirty seconds.
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(MAX_RETRY_DELAY_MS),
        )
    }
}

#[derive(Debug, Error)]
pub(crate) enum RequestFailure {
    #[error("{0}")]
    Request(reqwest::Error),
    #[error("status {status}")]
    Api { status: StatusCode, body: String },
}

impl RequestFailure {
    fn is_transient(&self) -> bool {
        match self {
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => is_transient_status(*status),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Posts a chat-completions payload, retrying rate limits, server errors,
/// timeouts and refused connections.
///
/// Only the request and status line are retried; once a successful response
/// is returned its body belongs to the caller.
pub(crate) async fn post_chat<T: Serialize + ?Sized>(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
    policy: RetryPolicy,
) -> Result<reqwest::Response, RequestFailure> {
    let mut attempt = 0u32;

    loop {
        let mut request = http.post(url).bearer_auth(api_key).json(payload);
        if policy.streaming {
            request = request.header(ACCEPT, "text/event-stream");
        }
        if let Some(timeout_secs) = policy.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        let failure = match request.send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("chat request accepted on attempt {}", attempt + 1);
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                RequestFailure::Api { status, body }
            }
            Err(source) => RequestFailure::Request(source),
        };

        if attempt >= policy.retries || !failure.is_transient() {
            return Err(failure);
        }

        let delay = policy.delay(attempt);
        attempt += 1;
        log::warn!(
            "chat request failed ({failure}); retry {attempt}/{} in {delay:?}",
            policy.retries
        );
        sleep(delay).await;
    }
}
