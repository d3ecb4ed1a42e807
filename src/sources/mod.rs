//! Upstream bibliographic sources behind a common trait.
//!
//! A [`Source`] answers two questions: which records match a query
//! ([`Source::search`]) and what a single record looks like in full
//! ([`Source::fetch_details`]). Records stay in the upstream's own shape
//! ([`RawRecord`]); the [`crate::extract`] module projects them into
//! canonical papers.
//!
//! Two implementations talk to real services:
//!
//! - [`PubMedSource`]: NCBI E-utilities `esearch`/`efetch`. Search returns
//!   PMIDs; every detail fetch is delayed and retried on HTTP 429/500.
//! - [`CrossRefSource`]: CrossRef REST `works`. An ORCID search returns full
//!   records directly, so no detail fetch is needed.
//!
//! [`MockSource`] is a scriptable stand-in for tests.

mod crossref;
pub mod mock;
mod pubmed;

pub use crossref::{clean_orcid, date_filter, orcid_filter, CrossRefSource, MAX_ROWS};
pub use mock::MockSource;
pub use pubmed::{author_query, keyword_query, PubMedSource};

use async_trait::async_trait;
use serde_json::Value;

use crate::models::DateRange;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const KEYWORD_SEARCH = 1 << 0;
        const AUTHOR_SEARCH = 1 << 1;
        const ORCID_SEARCH = 1 << 2;
        const FETCH_DETAILS = 1 << 3;
        const TEXT_SEARCH = 1 << 4;
    }
}

/// A query against one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// Free-text keyword restricted to journals and an entry-date window
    Keyword {
        keyword: String,
        journals: Vec<String>,
        range: DateRange,
    },
    /// Author display name within an entry-date window
    Author { name: String, range: DateRange },
    /// ORCID within a publication-date window
    Orcid { orcid: String, range: DateRange },
    /// Bibliographic free text within a publication-date window
    Text { query: String, range: DateRange },
}

impl SourceQuery {
    /// The keyword, name, ORCID or text this query is about
    pub fn label(&self) -> &str {
        match self {
            SourceQuery::Keyword { keyword, .. } => keyword,
            SourceQuery::Author { name, .. } => name,
            SourceQuery::Orcid { orcid, .. } => orcid,
            SourceQuery::Text { query, .. } => query,
        }
    }

    pub fn range(&self) -> &DateRange {
        match self {
            SourceQuery::Keyword { range, .. }
            | SourceQuery::Author { range, .. }
            | SourceQuery::Orcid { range, .. }
            | SourceQuery::Text { range, .. } => range,
        }
    }

    /// The capability a source needs to answer this query
    pub fn required_capability(&self) -> SourceCapabilities {
        match self {
            SourceQuery::Keyword { .. } => SourceCapabilities::KEYWORD_SEARCH,
            SourceQuery::Author { .. } => SourceCapabilities::AUTHOR_SEARCH,
            SourceQuery::Orcid { .. } => SourceCapabilities::ORCID_SEARCH,
            SourceQuery::Text { .. } => SourceCapabilities::TEXT_SEARCH,
        }
    }
}

/// A record in its upstream shape
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// A `PubmedArticle` (or bare `MedlineCitation`) converted from efetch XML
    PubMed(Value),
    /// One item of a CrossRef `works` response
    CrossRef(Value),
}

/// One search result: either an ID still to be fetched, or a full record
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Id(String),
    Record(RawRecord),
}

/// The Source trait defines the interface for upstream bibliographic APIs.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "pubmed", "crossref")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities;

    fn supports(&self, query: &SourceQuery) -> bool {
        self.capabilities().contains(query.required_capability())
    }

    /// Run a query. Implementations log transport failures and return an
    /// empty list rather than failing the caller's batch.
    async fn search(&self, _query: &SourceQuery) -> Result<Vec<Hit>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Fetch the full record for an ID returned by [`Source::search`]
    async fn fetch_details(&self, _id: &str) -> Result<RawRecord, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Throttling or server failure that may succeed on retry (HTTP 429/500)
    #[error("Transient upstream error (HTTP {status}): {message}")]
    Transient { status: u16, message: String },

    /// Any other non-success HTTP status
    #[error("Upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    /// Network or transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The client cannot be constructed or used as configured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 | 500 => SourceError::Transient { status, message },
            _ => SourceError::Upstream { status, message },
        }
    }

    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient { .. })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
