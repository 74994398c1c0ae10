use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    /// One attempt, fail fast. Used for the bulk registry endpoints.
    pub const fn single() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Three attempts one second apart, for the Codeforces standings endpoint.
    pub const fn standings() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. The error of the final attempt
/// is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %err, "attempt failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Byte-level GET used by every source adapter.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Single attempt. Any non-2xx status or transport error is a failure.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    async fn fetch_with(&self, url: &str, policy: RetryPolicy) -> Result<Vec<u8>, FetchError> {
        retry(policy, move |_| self.fetch(url)).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub max_concurrent: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            max_concurrent: 4,
        }
    }
}

/// reqwest-backed [`Fetch`] with a per-request timeout and a global
/// in-flight limit shared by all sources.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            in_flight: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let _permit = self.in_flight.acquire().await.expect("semaphore not closed");
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(request_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        let body = resp.bytes().await.map_err(request_error)?;
        debug!(bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get(url).instrument(info_span!("http_fetch", url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    struct ScriptedFetch {
        replies: Mutex<VecDeque<Result<Vec<u8>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetch {
        fn new(replies: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetch {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.lock().await.pop_front().unwrap_or(Err(FetchError::HttpStatus {
                status: 599,
                url: url.to_string(),
            }))
        }
    }

    fn status(code: u16) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::HttpStatus {
            status: code,
            url: "https://codeforces.com/api/contest.standings".into(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn standings_policy_returns_third_attempt_result() {
        let fetch = ScriptedFetch::new(vec![status(503), status(429), Ok(b"third".to_vec())]);
        let started = Instant::now();

        let body = fetch
            .fetch_with("https://codeforces.com/api/contest.standings", RetryPolicy::standings())
            .await
            .unwrap();

        assert_eq!(body, b"third");
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn standings_policy_surfaces_last_error() {
        let fetch = ScriptedFetch::new(vec![status(500), status(502), status(504)]);

        let err = fetch
            .fetch_with("https://codeforces.com/api/contest.standings", RetryPolicy::standings())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus { status: 504, .. }));
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_policy_fails_fast() {
        let fetch = ScriptedFetch::new(vec![status(500), Ok(b"unused".to_vec())]);
        let started = Instant::now();

        let err = fetch
            .fetch_with("https://yukicoder.me/api/v1/problems", RetryPolicy::single())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn retry_passes_attempt_numbers() {
        let mut seen = Vec::new();
        let result: Result<usize, String> = retry(
            RetryPolicy {
                max_attempts: 4,
                delay: Duration::ZERO,
            },
            |attempt| {
                seen.push(attempt);
                async move {
                    if attempt < 2 {
                        Err(format!("attempt {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn zero_attempt_policy_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        };
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let mut calls = 0;
        let result: Result<(), &str> = rt.block_on(retry(policy, |_| {
            calls += 1;
            async { Err("nope") }
        }));
        assert_eq!(result, Err("nope"));
        assert_eq!(calls, 1);
    }
}
