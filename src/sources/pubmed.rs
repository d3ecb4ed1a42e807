//! PubMed source using the NCBI E-utilities API.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PubMedConfig;
use crate::models::DateRange;
use crate::sources::{Hit, RawRecord, Source, SourceCapabilities, SourceError, SourceQuery};
use crate::utils::date::ApiFormat;
use crate::utils::xml::xml_to_value;
use crate::utils::{base_url, with_retry, HttpClient, RateLimiter, RetryConfig};

/// Build the esearch term for a keyword restricted to journals and an entry-date window.
///
/// The journal clause is omitted when `journals` is empty.
pub fn keyword_query(keyword: &str, journals: &[String], range: &DateRange) -> String {
    let mut term = format!("({}) AND {}", keyword, entry_date_clause(range));
    if !journals.is_empty() {
        let journal_clause = journals
            .iter()
            .map(|j| format!("\"{}\"[Journal] OR \"{}\"[TA]", j, j))
            .collect::<Vec<_>>()
            .join(" OR ");
        term.push_str(&format!(" AND ({})", journal_clause));
    }
    term
}

/// Build the esearch term for an author display name within an entry-date window
pub fn author_query(name: &str, range: &DateRange) -> String {
    format!("{}[Author] AND {}", name, entry_date_clause(range))
}

fn entry_date_clause(range: &DateRange) -> String {
    format!(
        "(\"{}\"[Date - Entry] : \"{}\"[Date - Entry])",
        ApiFormat::PubMed.format(range.start()),
        ApiFormat::PubMed.format(range.end())
    )
}

/// PubMed source
///
/// Searches return PMIDs; [`Source::fetch_details`] pulls one MEDLINE record
/// at a time, pacing every call through the shared [`RateLimiter`] and
/// retrying throttled calls according to the configured [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    base_url: String,
    tool: String,
    email: String,
    api_key: Option<String>,
    retmax: u32,
}

impl PubMedSource {
    /// Create a new PubMed source.
    ///
    /// NCBI requires a contact email; an empty one is a configuration error.
    pub fn new(
        config: &PubMedConfig,
        email: &str,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, SourceError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SourceError::Configuration(
                "PubMed requires a contact email".to_string(),
            ));
        }

        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            limiter,
            retry: RetryConfig::from(&config.retry),
            base_url: base_url(&config.base_url)?,
            tool: config.tool.clone(),
            email: email.to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            retmax: config.retmax,
        })
    }

    fn common_params<'a>(&'a self, params: &mut Vec<(&'a str, &'a str)>) {
        params.push(("tool", self.tool.as_str()));
        params.push(("email", self.email.as_str()));
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
    }

    /// Run esearch and return PMIDs
    async fn esearch(&self, term: &str) -> Result<Vec<String>, SourceError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = self.retmax.to_string();
        let mut params = vec![
            ("db", "pubmed"),
            ("term", term),
            ("retmax", retmax.as_str()),
            ("sort", "relevance"),
        ];
        self.common_params(&mut params);

        tracing::debug!(term = %term, "PubMed esearch");
        let xml = self.client.get_text(&url, &params).await?;
        Self::parse_search_response(&xml)
    }

    /// Parse E-utilities search response XML
    fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ESearchResult {
            #[serde(default)]
            IdList: Option<IdList>,
            #[serde(rename = "ERROR", default)]
            error: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search XML: {}", e)))?;

        match (result.IdList, result.error) {
            (Some(list), _) => Ok(list.ids.into_iter().map(|id| id.trim().to_string()).collect()),
            (None, Some(error)) => Err(SourceError::Upstream {
                status: 200,
                message: error,
            }),
            (None, None) => Ok(Vec::new()),
        }
    }

    /// One paced efetch call, without retry
    async fn efetch_once(&self, pmid: &str) -> Result<RawRecord, SourceError> {
        self.limiter.acquire().await;

        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params = vec![
            ("db", "pubmed"),
            ("id", pmid),
            ("rettype", "medline"),
            ("retmode", "xml"),
        ];
        self.common_params(&mut params);

        tracing::debug!(pmid = %pmid, "PubMed efetch");
        let xml = self.client.get_text(&url, &params).await?;
        Self::parse_fetch_response(&xml)
    }

    /// Pull the first article out of an efetch `PubmedArticleSet`
    fn parse_fetch_response(xml: &str) -> Result<RawRecord, SourceError> {
        let mut document = xml_to_value(xml)?;
        let articles = document
            .get_mut("PubmedArticleSet")
            .and_then(|set| set.get_mut("PubmedArticle"))
            .map(Value::take)
            .unwrap_or(Value::Null);
        let article = match articles {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) | Value::Null => {
                return Err(SourceError::Parse(
                    "efetch response contains no PubmedArticle".to_string(),
                ))
            }
            single => single,
        };
        Ok(RawRecord::PubMed(article))
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::KEYWORD_SEARCH
            | SourceCapabilities::AUTHOR_SEARCH
            | SourceCapabilities::FETCH_DETAILS
    }

    async fn search(&self, query: &SourceQuery) -> Result<Vec<Hit>, SourceError> {
        let term = match query {
            SourceQuery::Keyword {
                keyword,
                journals,
                range,
            } => keyword_query(keyword, journals, range),
            SourceQuery::Author { name, range } => author_query(name, range),
            SourceQuery::Orcid { .. } | SourceQuery::Text { .. } => {
                return Err(SourceError::NotImplemented)
            }
        };

        match self.esearch(&term).await {
            Ok(ids) => {
                tracing::info!(query = %query.label(), hits = ids.len(), "PubMed search complete");
                Ok(ids.into_iter().map(Hit::Id).collect())
            }
            Err(e) => {
                tracing::warn!(query = %query.label(), error = %e, "PubMed search failed");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_details(&self, pmid: &str) -> Result<RawRecord, SourceError> {
        let this = self;
        with_retry(self.retry, move || async move { this.efetch_once(pmid).await }).await
    }
}
