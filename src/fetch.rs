//! Stateless page fetching with exponential backoff retry logic.
//!
//! Product pages render their nutrition block server-side, so item fetching
//! does not go through the live browser session — a plain HTTP client is
//! enough, and it keeps the render session free for discovery.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`PageFetcher`]: Core trait defining async page retrieval
//! - [`HttpFetcher`]: `reqwest`-backed implementation
//! - [`RetryFetch`]: Decorator that adds retry logic to any `PageFetcher`
//!
//! # Retry Strategy
//!
//! - Bounded attempts (3 by default, see [`RetryPolicy`])
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::models::RetryPolicy;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{instrument, warn};

/// Desktop user agent sent with every item request.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A page fetch that exhausted its attempts (or failed to even start).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure: connect, timeout, TLS, non-success status.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The HTTP client itself could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(String),
}

/// Trait for async retrieval of one rendered page body.
///
/// Implementors take an absolute URL and return the page HTML. This
/// abstraction keeps the processing pipeline testable and lets decorators
/// (like retry logic) wrap any backend.
pub trait PageFetcher {
    /// Fetch the page at `url` and return its HTML body.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed [`PageFetcher`] with a per-request timeout and a fixed
/// desktop user agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// This decorator transparently retries transient fetch failures. The delay
/// between attempts follows:
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Attempt bound and backoff schedule.
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with the given retry policy.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        RetryFetch { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.policy.max_attempts {
                        warn!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch() exhausted attempts"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.policy.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.policy.max_delay {
                        delay = self.policy.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted fetcher: pops one outcome per call.
    struct ScriptedFetcher {
        outcomes: Mutex<Vec<Result<String, ()>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Result<String, ()>>) -> Self {
            ScriptedFetcher {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            *self.calls.lock().unwrap() += 1;
            match self.outcomes.lock().unwrap().remove(0) {
                Ok(body) => Ok(body),
                Err(()) => Err(FetchError::Client("scripted failure".to_string())),
            }
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let inner = ScriptedFetcher::new(vec![Err(()), Ok("<html>ok</html>".to_string())]);
        let fetcher = RetryFetch::new(inner, fast_policy(3));
        let body = fetcher.fetch("item").await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        assert_eq!(fetcher.inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let inner = ScriptedFetcher::new(vec![Err(()), Err(()), Err(())]);
        let fetcher = RetryFetch::new(inner, fast_policy(3));
        let result = fetcher.fetch("item").await;
        assert!(result.is_err());
        assert_eq!(fetcher.inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_success_needs_single_attempt() {
        let inner = ScriptedFetcher::new(vec![Ok("body".to_string())]);
        let fetcher = RetryFetch::new(inner, fast_policy(3));
        fetcher.fetch("item").await.unwrap();
        assert_eq!(fetcher.inner.calls(), 1);
    }
}
