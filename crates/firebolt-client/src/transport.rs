//! Retrying HTTP transport with an explicit auth-refresh stage.
//!
//! Every outbound call goes through [`RetryTransport::send`]. After each
//! attempt the outcome is run through [`classify`], a pure function that
//! decides whether to hand the outcome back, retry it as a transient failure,
//! or refresh the access token and retry. The refresh itself is delegated to
//! a [`TokenRefresher`] supplied by the caller, and happens at most once per
//! call; a second 401 after a refresh is handed back to the caller.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Bounds for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff for the given (zero based) retry number.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.min_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// What to do with the outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the outcome back to the caller
    Done,
    /// Transient failure, try again after a backoff
    Retry,
    /// Access token rejected, refresh it and try again
    RefreshAuth,
}

/// Retry predicate.
///
/// Network failures, 429 and 5xx (except 501) are transient. 401 asks for a
/// token refresh. Anything else is final.
pub fn classify(outcome: &std::result::Result<reqwest::Response, reqwest::Error>) -> Verdict {
    match outcome {
        Err(e) if e.is_builder() || e.is_redirect() => Verdict::Done,
        Err(_) => Verdict::Retry,
        Ok(response) => classify_status(response.status()),
    }
}

pub(crate) fn classify_status(status: StatusCode) -> Verdict {
    if status == StatusCode::UNAUTHORIZED {
        Verdict::RefreshAuth
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
    {
        Verdict::Retry
    } else {
        Verdict::Done
    }
}

/// Supplies a fresh access token when the current one is rejected.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange the refresh token for a new access token and return it.
    async fn refresh(&self, cancel: &CancellationToken) -> Result<String>;
}

/// HTTP connection pool plus the retry loop.
pub struct RetryTransport {
    http: RwLock<Option<reqwest::Client>>,
    config: RetryConfig,
}

impl RetryTransport {
    pub fn new(config: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http: RwLock::new(Some(http)),
            config,
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send `request`, retrying per [`classify`].
    ///
    /// Without a `refresher`, a 401 is final. Non-success responses that are
    /// not retried (or that exhaust the retries) are returned as responses;
    /// checking the status is up to the caller.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        mut request: reqwest::Request,
        refresher: Option<&dyn TokenRefresher>,
    ) -> Result<reqwest::Response> {
        let http = self.http.read().await.clone().ok_or(Error::Closed)?;
        let mut refreshed = false;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let attempt_request = request.try_clone().ok_or(Error::UnclonableRequest)?;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = http.execute(attempt_request) => outcome,
            };

            let verdict = match classify(&outcome) {
                Verdict::RefreshAuth if refresher.is_none() || refreshed => Verdict::Done,
                verdict => verdict,
            };

            if verdict == Verdict::Done || attempt >= self.config.max_retries {
                if verdict != Verdict::Done {
                    warn!(
                        method = %request.method(),
                        url = %request.url(),
                        attempts = attempt + 1,
                        "Giving up after exhausting retries"
                    );
                }
                return outcome.map_err(Error::from);
            }

            match (verdict, refresher) {
                (Verdict::RefreshAuth, Some(refresher)) => {
                    debug!(url = %request.url(), "Access token rejected, refreshing it");
                    let token = refresher.refresh(cancel).await.map_err(|e| {
                        if e.is_cancelled() {
                            e
                        } else {
                            Error::TokenRefresh(Box::new(e))
                        }
                    })?;
                    request
                        .headers_mut()
                        .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
                    refreshed = true;
                }
                _ => {
                    let delay = self.config.backoff(attempt);
                    match &outcome {
                        Ok(response) => debug!(
                            url = %request.url(),
                            status = %response.status(),
                            attempt = attempt + 1,
                            "Retrying request after {:?}",
                            delay
                        ),
                        Err(e) => debug!(
                            url = %request.url(),
                            attempt = attempt + 1,
                            "Retrying request after {:?}: {}",
                            delay,
                            e
                        ),
                    }
                    drop(outcome);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            attempt += 1;
        }
    }

    /// Drop the connection pool. Further sends fail with [`Error::Closed`].
    pub async fn close(&self) {
        if self.http.write().await.take().is_some() {
            debug!("Closed HTTP connection pool");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.http.read().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), Verdict::Done);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Verdict::Done);
        assert_eq!(classify_status(StatusCode::NOT_IMPLEMENTED), Verdict::Done);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), Verdict::RefreshAuth);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), Verdict::Retry);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), Verdict::Retry);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Verdict::Retry
        );
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let transport = RetryTransport::new(RetryConfig::default()).unwrap();
        transport.close().await;
        transport.close().await;
        assert!(transport.is_closed().await);

        let request = reqwest::Request::new(
            reqwest::Method::GET,
            reqwest::Url::parse("http://127.0.0.1:1/").unwrap(),
        );
        let err = transport
            .send(&CancellationToken::new(), request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn test_send_respects_cancellation() {
        let transport = RetryTransport::new(RetryConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = reqwest::Request::new(
            reqwest::Method::GET,
            reqwest::Url::parse("http://127.0.0.1:1/").unwrap(),
        );
        let err = transport.send(&cancel, request, None).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
