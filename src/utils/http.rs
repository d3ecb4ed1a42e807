//! HTTP client and request pacing utilities.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use reqwest::Client;

use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with the crate's default user agent
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` with query parameters and return the body.
    ///
    /// Transport failures map to [`SourceError::Network`]; non-success
    /// statuses are classified by [`SourceError::from_status`].
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("Unknown status");
            let message = if body.trim().is_empty() {
                reason.to_string()
            } else {
                format!("{}: {}", reason, truncate(body.trim(), 200))
            };
            return Err(SourceError::from_status(status.as_u16(), message));
        }
        Ok(response.text().await?)
    }
}

/// Validate an upstream base URL and strip its trailing slash
pub fn base_url(raw: &str) -> Result<String, SourceError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| SourceError::Configuration(format!("Invalid base URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SourceError::Configuration(format!(
            "Unsupported URL scheme in '{}'",
            raw
        )));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Paces requests to one upstream host.
///
/// Owned by the aggregator for the lifetime of a run and shared with the
/// client that talks to that host.
pub struct RateLimiter {
    pacing: Pacing,
}

enum Pacing {
    Off,
    /// Sleep a fixed time before every call
    DelayEach(Duration),
    /// Let calls through at most once per period
    MinInterval(DefaultDirectRateLimiter),
}

impl RateLimiter {
    /// No pacing
    pub fn unlimited() -> Self {
        Self { pacing: Pacing::Off }
    }

    /// Sleep for `delay` before every call
    pub fn delay_each(delay: Duration) -> Self {
        if delay.is_zero() {
            return Self::unlimited();
        }
        Self {
            pacing: Pacing::DelayEach(delay),
        }
    }

    /// Enforce at least `interval` between successive calls; the first call is immediate
    pub fn min_interval(interval: Duration) -> Self {
        match Quota::with_period(interval) {
            Some(quota) => Self {
                pacing: Pacing::MinInterval(governor::RateLimiter::direct(
                    quota.allow_burst(nonzero!(1u32)),
                )),
            },
            None => Self::unlimited(),
        }
    }

    /// Wait until the next call may proceed
    pub async fn acquire(&self) {
        match &self.pacing {
            Pacing::Off => {}
            Pacing::DelayEach(delay) => tokio::time::sleep(*delay).await,
            Pacing::MinInterval(limiter) => limiter.until_ready().await,
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pacing = match &self.pacing {
            Pacing::Off => "off".to_string(),
            Pacing::DelayEach(d) => format!("delay_each({:?})", d),
            Pacing::MinInterval(_) => "min_interval".to_string(),
        };
        f.debug_struct("RateLimiter").field("pacing", &pacing).finish()
    }
}
