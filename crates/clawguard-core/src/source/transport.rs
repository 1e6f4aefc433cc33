//! Bounded HTTP transport.
//!
//! One operation: fetch a URL body into memory. The read is bounded
//! three ways: a request timeout, a hard byte cap enforced while
//! streaming, and a retry budget with exponential backoff. The body is
//! never interpreted here.

use std::io::Read;
use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::limits::Limits;

const BACKOFF_BASE_MS: u64 = 250;

/// A fetched body plus the Content-Type header, when present.
#[derive(Debug)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetch `url` with the caps from `limits`.
///
/// Follows redirects. Fails when the body exceeds `max_zip_bytes`,
/// when the request outlives `timeout_ms`, or when `retries` attempts
/// have been exhausted. Retries apply to connection failures and 5xx
/// responses; 4xx responses and byte-cap violations fail immediately.
pub fn fetch_url(url: &str, limits: &Limits) -> Result<FetchedBody, TransportError> {
    let client = Client::builder()
        .timeout(Duration::from_millis(limits.timeout_ms))
        .user_agent(concat!("clawguard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransportError::Other(e.to_string()))?;

    let mut last_error = TransportError::Other("no attempt made".to_string());

    for attempt in 0..=limits.retries {
        if attempt > 0 {
            let delay = backoff_delay_ms(attempt);
            debug!(attempt, delay_ms = delay, url, "retrying fetch");
            thread::sleep(Duration::from_millis(delay));
        }

        match attempt_fetch(&client, url, limits) {
            Ok(body) => return Ok(body),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                warn!(attempt, url, error = %err, "fetch attempt failed");
                last_error = err;
            }
        }
    }

    Err(last_error)
}

fn attempt_fetch(client: &Client, url: &str, limits: &Limits) -> Result<FetchedBody, TransportError> {
    let response = client.get(url).send().map_err(|e| {
        if e.is_timeout() {
            TransportError::Timeout {
                timeout_ms: limits.timeout_ms,
            }
        } else {
            TransportError::Other(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let max_bytes = limits.max_zip_bytes;
    if let Some(expected) = response.content_length() {
        if expected > max_bytes {
            return Err(TransportError::ByteCapExceeded { max_bytes });
        }
    }

    let mut bytes = Vec::new();
    let mut bounded = response.take(max_bytes + 1);
    bounded.read_to_end(&mut bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout {
                timeout_ms: limits.timeout_ms,
            }
        } else {
            TransportError::Other(e.to_string())
        }
    })?;
    if bytes.len() as u64 > max_bytes {
        return Err(TransportError::ByteCapExceeded { max_bytes });
    }

    Ok(FetchedBody {
        bytes,
        content_type,
    })
}

/// Exponential backoff with ±50% jitter: base 250 ms doubled per
/// attempt.
fn backoff_delay_ms(attempt: u32) -> u64 {
    let base = BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt - 1).min(16));
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.5);
    (base as f64 * factor) as u64
}

fn is_retryable(err: &TransportError) -> bool {
    match err {
        TransportError::Timeout { .. } => true,
        TransportError::Status { status } => *status >= 500,
        TransportError::ByteCapExceeded { .. } => false,
        TransportError::Other(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_jitters_within_band() {
        for attempt in 1..=5 {
            let base = BACKOFF_BASE_MS * (1 << (attempt - 1));
            for _ in 0..20 {
                let d = backoff_delay_ms(attempt);
                assert!(d >= base / 2, "delay {d} below band for attempt {attempt}");
                assert!(d <= base + base / 2, "delay {d} above band for attempt {attempt}");
            }
        }
    }

    #[test]
    fn byte_cap_errors_are_terminal() {
        assert!(!is_retryable(&TransportError::ByteCapExceeded { max_bytes: 1 }));
        assert!(!is_retryable(&TransportError::Status { status: 404 }));
    }

    #[test]
    fn server_errors_and_timeouts_are_retryable() {
        assert!(is_retryable(&TransportError::Status { status: 503 }));
        assert!(is_retryable(&TransportError::Timeout { timeout_ms: 1 }));
        assert!(is_retryable(&TransportError::Other("reset".into())));
    }
}
