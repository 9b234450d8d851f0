//! Image retrieval with bounded retries and exponential backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Retry/timeout policy for image downloads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Upper bound on a single attempt (connect, redirects and body).
    pub attempt_timeout: Duration,
    /// Wait after the first failed attempt.
    pub initial_backoff: Duration,
    /// Multiplier applied to the wait after every further failure.
    pub backoff_factor: u32,
    /// Redirect hops followed per attempt.
    pub max_redirects: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            backoff_factor: 2,
            max_redirects: 5,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        self.initial_backoff
            .saturating_mul(self.backoff_factor.saturating_pow(exp))
    }
}

/// Failure of a single download attempt.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("read failed: {0}")]
    Io(String),
}

/// The image could not be retrieved after every attempt was used up.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to download {url} after {attempts} attempts: {message}")]
pub struct DownloadError {
    pub url: String,
    pub attempts: u32,
    /// Message of the last underlying failure.
    pub message: String,
}

/// Source of image bytes.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, DownloadError>> + Send;
}

/// Drive `attempt_fn` under `policy`.
///
/// Each attempt is bounded by `attempt_timeout`. Failed attempts are followed
/// by a cancellable sleep of `backoff_after(attempt)`, measured from the end
/// of the failure, except after the last attempt.
pub async fn retry_with_policy<F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt_fn: F,
) -> Result<Vec<u8>, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error: Option<AttemptError> = None;

    for attempt in 1..=max_attempts {
        tracing::debug!(url, attempt, max_attempts, "downloading image");

        let outcome = tokio::time::timeout(policy.attempt_timeout, attempt_fn(attempt))
            .await
            .unwrap_or(Err(AttemptError::Timeout(policy.attempt_timeout)));

        match outcome {
            Ok(bytes) => {
                tracing::debug!(url, attempt, bytes = bytes.len(), "image downloaded");
                return Ok(bytes);
            }
            Err(e) => {
                tracing::warn!(url, attempt, max_attempts, error = %e, "download attempt failed");
                if attempt < max_attempts {
                    let wait = policy.backoff_after(attempt);
                    tracing::debug!(url, wait_ms = wait.as_millis() as u64, "retrying download");
                    tokio::time::sleep(wait).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(DownloadError {
        url: url.to_string(),
        attempts: max_attempts,
        message: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// HTTP(S) fetcher backed by `reqwest`. `file://` URLs are read from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(policy: RetryPolicy) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.attempt_timeout)
            .redirect(reqwest::redirect::Policy::limited(policy.max_redirects))
            .build()?;
        Ok(Self { client, policy })
    }

    /// Use a preconfigured client. The client's own timeout and redirect
    /// settings apply on top of `policy`.
    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .map_err(|e| AttemptError::Io(format!("{path}: {e}")));
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::Timeout(self.policy.attempt_timeout)
            } else {
                AttemptError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transport(format!("reading body: {e}")))?;
        Ok(body.to_vec())
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        retry_with_policy(&self.policy, url, |_| self.attempt(url)).await
    }
}
