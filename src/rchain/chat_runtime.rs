use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryConfig {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            retries: 0,
            retry_delay_ms: 500,
        }
    }
}

/// How the API key travels with the request.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    Bearer(&'a str),
    Header(&'static str, &'a str),
    Query(&'static str, &'a str),
}

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

pub(crate) async fn post_json_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    auth: Auth<'_>,
    extra_headers: &[(&'static str, &'static str)],
    payload: &T,
    config: RetryConfig,
) -> Result<reqwest::Response, RequestFailure> {
    let max_attempts = config.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        let mut request = client.post(url).json(payload);
        request = match auth {
            Auth::Bearer(key) => request.bearer_auth(key),
            Auth::Header(name, key) => request.header(name, key),
            Auth::Query(name, key) => request.query(&[(name, key)]),
        };
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(timeout_secs) = config.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        debug!(url, attempt, "sending request");
        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }

                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let can_retry = is_retryable_status(status) && attempt + 1 < max_attempts;

                if can_retry {
                    let delay = retry_delay(attempt, config.retry_delay_ms);
                    warn!(%status, ?delay, "retrying request");
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                return Err(RequestFailure::Api { status, body });
            }
            Err(source) => {
                let can_retry = is_retryable_request_error(&source) && attempt + 1 < max_attempts;

                if can_retry {
                    let delay = retry_delay(attempt, config.retry_delay_ms);
                    warn!(error = %source, ?delay, "retrying request");
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                return Err(RequestFailure::Request(source));
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_request_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(30_000);
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::{is_retryable_status, retry_delay};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn retry_delay_doubles_each_attempt() {
        assert_eq!(retry_delay(0, 250), Duration::from_millis(250));
        assert_eq!(retry_delay(1, 250), Duration::from_millis(500));
        assert_eq!(retry_delay(3, 250), Duration::from_millis(2_000));
    }

    #[test]
    fn retry_delay_is_capped() {
        assert_eq!(retry_delay(12, 500), Duration::from_millis(30_000));
        assert_eq!(retry_delay(64, 1), Duration::from_millis(30_000));
    }

    #[test]
    fn only_throttling_and_server_errors_are_retried() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));

        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }
}
