//! CrossRef source using the REST `works` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::CrossRefConfig;
use crate::models::DateRange;
use crate::sources::{Hit, RawRecord, Source, SourceCapabilities, SourceError, SourceQuery};
use crate::utils::date::ApiFormat;
use crate::utils::{base_url, with_retry, HttpClient, RateLimiter, RetryConfig};

/// CrossRef refuses `rows` above this
pub const MAX_ROWS: u32 = 1000;

/// Strip an `orcid.org` URL prefix from an ORCID
pub fn clean_orcid(orcid: &str) -> &str {
    let orcid = orcid.trim();
    orcid
        .strip_prefix("https://orcid.org/")
        .or_else(|| orcid.strip_prefix("http://orcid.org/"))
        .unwrap_or(orcid)
        .trim_matches('/')
}

/// Build the `filter` parameter for an ORCID search
pub fn orcid_filter(orcid: &str, range: &DateRange) -> String {
    format!("orcid:{},{}", clean_orcid(orcid), date_filter(range))
}

/// Build the `filter` parameter restricting works to a publication-date window
pub fn date_filter(range: &DateRange) -> String {
    [
        format!("from-pub-date:{}", ApiFormat::CrossRef.format(range.start())),
        format!("until-pub-date:{}", ApiFormat::CrossRef.format(range.end())),
    ]
    .join(",")
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    message: WorksMessage,
}

#[derive(Debug, Default, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WorkResponse {
    message: Value,
}

/// CrossRef source
///
/// ORCID searches return full work records, so hits need no detail fetch.
/// Successive queries are paced through the shared [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    base_url: String,
    rows: u32,
    sort: String,
    order: String,
}

impl CrossRefSource {
    /// Create a new CrossRef source.
    ///
    /// A contact email, when given, is sent in the user agent so requests
    /// land in CrossRef's polite pool.
    pub fn new(
        config: &CrossRefConfig,
        email: Option<&str>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, SourceError> {
        let mut user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            user_agent.push_str(&format!(" (mailto:{})", email));
        }

        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
            limiter,
            retry: RetryConfig::from(&config.retry),
            base_url: base_url(&config.base_url)?,
            rows: config.rows.clamp(1, MAX_ROWS),
            sort: config.sort.clone(),
            order: config.order.clone(),
        })
    }

    async fn works_by_orcid(&self, orcid: &str, range: &DateRange) -> Result<Vec<Value>, SourceError> {
        self.works(None, orcid_filter(orcid, range)).await
    }

    async fn works_by_text(&self, text: &str, range: &DateRange) -> Result<Vec<Value>, SourceError> {
        self.works(Some(text.trim()), date_filter(range)).await
    }

    async fn works(&self, text: Option<&str>, filter: String) -> Result<Vec<Value>, SourceError> {
        let url = format!("{}/works", self.base_url);
        let rows = self.rows.to_string();
        let mut params = vec![
            ("filter", filter.as_str()),
            ("rows", rows.as_str()),
            ("sort", self.sort.as_str()),
            ("order", self.order.as_str()),
        ];
        if let Some(text) = text {
            params.push(("query", text));
        }

        let (client, limiter) = (&self.client, &self.limiter);
        let (url, params) = (url.as_str(), params.as_slice());
        let body = with_retry(self.retry, move || async move {
            limiter.acquire().await;
            client.get_text(url, params).await
        })
        .await?;

        let response: WorksResponse = serde_json::from_str(&body)?;
        Ok(response.message.items)
    }

    async fn work_by_doi(&self, doi: &str) -> Result<Value, SourceError> {
        let url = format!(
            "{}/works/{}",
            self.base_url,
            urlencoding::encode(doi.trim())
        );

        let (client, limiter) = (&self.client, &self.limiter);
        let url = url.as_str();
        let body = with_retry(self.retry, move || async move {
            limiter.acquire().await;
            client.get_text(url, &[]).await
        })
        .await?;

        let response: WorkResponse = serde_json::from_str(&body)?;
        Ok(response.message)
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::ORCID_SEARCH
            | SourceCapabilities::TEXT_SEARCH
            | SourceCapabilities::FETCH_DETAILS
    }

    async fn search(&self, query: &SourceQuery) -> Result<Vec<Hit>, SourceError> {
        let result = match query {
            SourceQuery::Orcid { orcid, range } => self.works_by_orcid(orcid, range).await,
            SourceQuery::Text { query: text, range } => self.works_by_text(text, range).await,
            _ => return Err(SourceError::NotImplemented),
        };
        let label = match query {
            SourceQuery::Orcid { orcid, .. } => clean_orcid(orcid),
            other => other.label(),
        };

        match result {
            Ok(items) => {
                tracing::info!(query = %label, hits = items.len(), "CrossRef search complete");
                Ok(items
                    .into_iter()
                    .map(|item| Hit::Record(RawRecord::CrossRef(item)))
                    .collect())
            }
            Err(e) => {
                tracing::warn!(query = %label, error = %e, "CrossRef search failed");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_details(&self, doi: &str) -> Result<RawRecord, SourceError> {
        self.work_by_doi(doi).await.map(RawRecord::CrossRef)
    }
}
