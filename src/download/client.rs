//! HTTP client wrapper for storefront and CDN requests.
//!
//! This module provides the `HttpClient` struct which attaches session
//! credentials, applies connect/read timeouts, and retries transient failures
//! with exponential backoff. Every request races the run's cancellation token.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::constants::{CONNECT_TIMEOUT_SECS, MAX_RETRY_AFTER, READ_TIMEOUT_SECS, default_user_agent};
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::auth::SessionCredentials;

/// Timeouts and retry behaviour for every request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed between reads of the response body.
    pub read_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client shared by every worker of a run.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Builds a client with optional session credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Config`] when a raw cookie header is not a
    /// valid header value or the TLS backend fails to initialise.
    #[instrument(level = "debug", skip(credentials))]
    pub fn new(
        credentials: Option<SessionCredentials>,
        settings: &HttpSettings,
    ) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .gzip(true)
            .user_agent(default_user_agent());

        match credentials {
            Some(SessionCredentials::CookieJar(jar)) => {
                builder = builder.cookie_provider(jar);
            }
            Some(SessionCredentials::CookieHeader(header)) => {
                let mut value = HeaderValue::from_str(&header)
                    .map_err(|_| DownloadError::config("cookie header contains invalid characters"))?;
                value.set_sensitive(true);
                let mut headers = HeaderMap::new();
                headers.insert(COOKIE, value);
                builder = builder.default_headers(headers);
            }
            None => {}
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::config(e.to_string()))?;
        Ok(Self {
            client,
            retry: settings.retry.clone(),
        })
    }

    /// Sends a GET and returns the response once headers arrive.
    ///
    /// # Errors
    ///
    /// Returns the last error after retries are exhausted, [`DownloadError::AuthRequired`]
    /// for 401/403, or [`DownloadError::Cancelled`] when the run is cancelled.
    #[instrument(level = "debug", skip(self, cancel))]
    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Response, DownloadError> {
        self.send_with_retry(url, cancel, || self.client.get(url))
            .await
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`DownloadError::Network`] when the
    /// body can't be read.
    pub async fn get_text(&self, url: &str, cancel: &CancellationToken) -> Result<String, DownloadError> {
        let response = self.get(url, cancel).await?;
        with_cancel(cancel, url, async {
            response.text().await.map_err(|e| DownloadError::network(url, e))
        })
        .await
    }

    /// Fetches and decodes a JSON document.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`DownloadError::Decode`] when the
    /// body is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, DownloadError> {
        let response = self.get(url, cancel).await?;
        read_json(response, url, cancel).await
    }

    /// Posts a urlencoded form and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json).
    #[instrument(level = "debug", skip(self, form, cancel))]
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, DownloadError> {
        let response = self
            .send_with_retry(url, cancel, || self.client.post(url).form(form))
            .await?;
        read_json(response, url, cancel).await
    }

    async fn send_with_retry(
        &self,
        url: &str,
        cancel: &CancellationToken,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, DownloadError> {
        let mut attempt = 1;
        loop {
            let error = match with_cancel(cancel, url, send_once(build(), url)).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => error,
            };

            match self.retry.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = retry_after_hint(&error).unwrap_or(delay);
                    warn!(
                        url,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "request failed, retrying"
                    );
                    with_cancel(cancel, url, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, attempt, %reason, "giving up on request");
                    return Err(error);
                }
            }
        }
    }
}

async fn send_once(request: RequestBuilder, url: &str) -> Result<Response, DownloadError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            DownloadError::timeout(url)
        } else {
            DownloadError::network(url, e)
        }
    })?;

    // Anything but 200 is a failure, so a partial or empty reply is never stored.
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let status_code = status.as_u16();
    if matches!(status_code, 401 | 403) {
        return Err(DownloadError::auth_required(url, status_code));
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string);
    Err(DownloadError::http_status_with_retry_after(
        url,
        status_code,
        retry_after,
    ))
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    url: &str,
    cancel: &CancellationToken,
) -> Result<T, DownloadError> {
    let body = with_cancel(cancel, url, async {
        response.bytes().await.map_err(|e| DownloadError::network(url, e))
    })
    .await?;
    serde_json::from_slice(&body).map_err(|e| DownloadError::decode(url, e.to_string()))
}

/// Runs `operation` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`DownloadError::Cancelled`] naming `target` on cancellation,
/// otherwise whatever `operation` returns.
pub async fn with_cancel<T, F>(
    cancel: &CancellationToken,
    target: &str,
    operation: F,
) -> Result<T, DownloadError>
where
    F: Future<Output = Result<T, DownloadError>>,
{
    if cancel.is_cancelled() {
        return Err(DownloadError::cancelled(target));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DownloadError::cancelled(target)),
        result = operation => result,
    }
}

fn retry_after_hint(error: &DownloadError) -> Option<Duration> {
    match error {
        DownloadError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Parses a `Retry-After` value (integer seconds or HTTP-date), capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let when = httpdate::parse_http_date(header_value).ok()?;
    let wait = when
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(wait.min(MAX_RETRY_AFTER))
}
