//! Remote transport for `src` URLs.
//!
//! [`Fetch`] is the seam a host can replace (tests use scripted fakes);
//! [`HttpFetch`] is the default reqwest transport and [`RetryFetch`] wraps
//! any transport with bounded retries that honour `Retry-After`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Largest `Retry-After` wait accepted, in seconds.
pub const MAX_RETRY_AFTER_SECS: u64 = 10_000;

pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [408, 409, 429, 500, 502, 503, 504];

// -----------------------------------------------------------------------------
// Transport
// -----------------------------------------------------------------------------

/// What the transform needs from a response: status, headers, body.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs one request. `Err` means no response was obtained at all.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// Default transport.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Unsupported {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_builder() {
                FetchError::Unsupported {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                FetchError::transport(url.as_str(), e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e.to_string()))?;

        Ok(FetchResponse {
            status,
            headers,
            body: (!body.is_empty()).then(|| body.to_vec()),
        })
    }
}

// -----------------------------------------------------------------------------
// Retry policy
// -----------------------------------------------------------------------------

/// Wait between attempts when the server gives no `Retry-After`.
#[derive(Clone)]
pub enum Delay {
    Fixed(Duration),
    /// Called with the number of attempts made so far (starting at 1).
    Backoff(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Delay {
    pub fn for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Backoff(f) => f(attempt),
        }
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Self::Backoff(_) => f.write_str("Backoff(..)"),
        }
    }
}

type RetryPredicate = Arc<dyn Fn(&FetchResponse) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub retries: u32,
    pub delay: Delay,
    should_retry: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Delay) -> Self {
        Self::with_statuses(retries, delay, DEFAULT_RETRY_STATUSES)
    }

    pub fn with_statuses(
        retries: u32,
        delay: Delay,
        statuses: impl IntoIterator<Item = u16>,
    ) -> Self {
        let statuses: HashSet<u16> = statuses.into_iter().collect();
        Self {
            retries,
            delay,
            should_retry: Arc::new(move |r| statuses.contains(&r.status)),
        }
    }

    #[must_use]
    pub fn retry_when(mut self, f: impl Fn(&FetchResponse) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Arc::new(f);
        self
    }

    pub fn should_retry(&self, response: &FetchResponse) -> bool {
        (self.should_retry)(response)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryOptions::default().into()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// JSON form of [`RetryPolicy`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryOptions {
    pub retries: u32,
    pub delay_ms: u64,
    pub statuses: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 5,
            delay_ms: 500,
            statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl From<RetryOptions> for RetryPolicy {
    fn from(o: RetryOptions) -> Self {
        RetryPolicy::with_statuses(
            o.retries,
            Delay::Fixed(Duration::from_millis(o.delay_ms)),
            o.statuses,
        )
    }
}

/// Parses a `Retry-After` value: integer seconds or an HTTP-date.
/// Dates in the past mean "now". Anything beyond [`MAX_RETRY_AFTER_SECS`]
/// or unparseable is `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return (secs <= MAX_RETRY_AFTER_SECS).then(|| Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
    (wait.as_secs() <= MAX_RETRY_AFTER_SECS).then_some(wait)
}

// -----------------------------------------------------------------------------
// Retrying transport
// -----------------------------------------------------------------------------

pub struct RetryFetch {
    inner: Arc<dyn Fetch>,
    policy: RetryPolicy,
}

impl RetryFetch {
    pub fn new(inner: Arc<dyn Fetch>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn wait_for(&self, url: &Url, response: &FetchResponse, attempt: u32) -> Result<Duration, FetchError> {
        match response.header("retry-after") {
            Some(value) => parse_retry_after(value, Utc::now()).ok_or_else(|| {
                FetchError::InvalidRetryAfter {
                    url: url.to_string(),
                    value: value.to_string(),
                }
            }),
            None => Ok(self.policy.delay.for_attempt(attempt)),
        }
    }
}

#[async_trait]
impl Fetch for RetryFetch {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let exhausted = attempt > self.policy.retries;

            let wait = match self.inner.fetch(url).await {
                Ok(response) if self.policy.should_retry(&response) => {
                    if exhausted {
                        warn!(url = %url, attempts = attempt, status = response.status, "Retries exhausted");
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last_status: Some(response.status),
                        });
                    }
                    let wait = self.wait_for(url, &response, attempt)?;
                    debug!(url = %url, attempt, status = response.status, wait_ms = wait.as_millis() as u64, "Retrying after status");
                    wait
                }
                Ok(response) => return Ok(response),
                Err(e @ FetchError::Unsupported { .. }) => return Err(e),
                Err(e) => {
                    if exhausted {
                        warn!(url = %url, attempts = attempt, error = %e, "Retries exhausted");
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last_status: None,
                        });
                    }
                    let wait = self.policy.delay.for_attempt(attempt);
                    debug!(url = %url, attempt, error = %e, "Retrying after transport error");
                    wait
                }
            };

            tokio::time::sleep(wait).await;
        }
    }
}
