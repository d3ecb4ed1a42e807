//! The `[search]` section: what to look for and whom to follow.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::sources::clean_orcid;
use crate::utils::date::parse_frequency;

/// Raw `[search]` section as written in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    /// Contact email for NCBI and CrossRef
    #[serde(default)]
    pub email: String,

    #[serde(default = "default_lookup_frequency")]
    pub lookup_frequency: String,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub journals: Vec<String>,

    #[serde(default)]
    pub authors: Vec<AuthorEntry>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            email: String::new(),
            lookup_frequency: default_lookup_frequency(),
            topics: Vec::new(),
            journals: Vec::new(),
            authors: Vec::new(),
        }
    }
}

fn default_lookup_frequency() -> String {
    "1 week".to_string()
}

/// One tracked author: `"<orcid> # <name>"` or `{ orcid, name }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorEntry {
    Line(String),
    Table {
        orcid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Author identity used by the searches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAuthor {
    /// Display name, used for PubMed author searches
    pub name: Option<String>,
    pub orcid: String,
}

/// Split an author entry into ORCID and optional display name
pub fn parse_author_entry(entry: &AuthorEntry) -> NamedAuthor {
    let non_blank = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
    match entry {
        AuthorEntry::Line(line) => match line.split_once('#') {
            Some((orcid, name)) => NamedAuthor {
                orcid: orcid.trim().to_string(),
                name: non_blank(name),
            },
            None => NamedAuthor {
                orcid: line.trim().to_string(),
                name: None,
            },
        },
        AuthorEntry::Table { orcid, name } => NamedAuthor {
            orcid: orcid.trim().to_string(),
            name: name.as_deref().and_then(non_blank),
        },
    }
}

/// Search configuration consumed by the aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub email: String,
    pub topics: Vec<String>,
    pub journals: Vec<String>,
    /// Every configured ORCID, in file order
    pub orcids: Vec<String>,
    /// Authors that carry a display name
    pub named_authors: Vec<NamedAuthor>,
    pub lookup_frequency: String,
}

impl SearchSection {
    /// Expand author entries into ORCIDs and named authors
    pub fn resolve(&self) -> Result<SearchConfig, ConfigError> {
        let authors: Vec<NamedAuthor> = self.authors.iter().map(parse_author_entry).collect();

        Ok(SearchConfig {
            email: self.email.trim().to_string(),
            topics: self.topics.clone(),
            journals: self.journals.clone(),
            orcids: authors.iter().map(|a| a.orcid.clone()).collect(),
            named_authors: authors.into_iter().filter(|a| a.name.is_some()).collect(),
            lookup_frequency: self.lookup_frequency.clone(),
        })
    }
}

fn orcid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d{4}-\d{4}-\d{4}-\d{3}[\dX]$").ok())
        .as_ref()
}

/// Whether `orcid` looks like an ORCID iD, with or without the `orcid.org` prefix
pub fn is_valid_orcid(orcid: &str) -> bool {
    orcid_pattern().is_some_and(|re| re.is_match(clean_orcid(orcid)))
}

impl SearchConfig {
    pub fn has_keywords(&self) -> bool {
        !self.topics.is_empty()
    }

    pub fn has_authors(&self) -> bool {
        !self.orcids.is_empty() || !self.named_authors.is_empty()
    }

    /// Check the configuration before a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ConfigError::Invalid(
                "missing required field: search.email".to_string(),
            ));
        }
        if email.matches('@').count() != 1 {
            return Err(ConfigError::Invalid(format!("invalid email format: {}", email)));
        }

        parse_frequency(&self.lookup_frequency).map_err(|e| {
            ConfigError::Invalid(format!(
                "invalid lookup_frequency '{}': {}",
                self.lookup_frequency, e
            ))
        })?;

        if self.journals.iter().any(|j| j.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "journals entries must be non-empty strings".to_string(),
            ));
        }
        if self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "topics entries must be non-empty strings".to_string(),
            ));
        }
        if let Some(bad) = self.orcids.iter().find(|o| !is_valid_orcid(o)) {
            return Err(ConfigError::Invalid(format!("invalid ORCID: {}", bad)));
        }

        if !self.has_keywords() && !self.has_authors() {
            return Err(ConfigError::Invalid(
                "configure at least one topic or author".to_string(),
            ));
        }
        Ok(())
    }
}
