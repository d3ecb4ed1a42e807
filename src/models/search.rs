//! Search modes, date windows, and aggregated search results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::paper::{Paper, Provenance};
use crate::utils::date::{self, DateError};
use crate::utils::dedup::remove_duplicate_titles;

/// Which search paths a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keywords,
    Authors,
    #[default]
    Both,
}

impl SearchMode {
    pub fn includes_keywords(self) -> bool {
        matches!(self, SearchMode::Keywords | SearchMode::Both)
    }

    pub fn includes_authors(self) -> bool {
        matches!(self, SearchMode::Authors | SearchMode::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Keywords => "keywords",
            SearchMode::Authors => "authors",
            SearchMode::Both => "both",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keywords" => Ok(SearchMode::Keywords),
            "authors" => Ok(SearchMode::Authors),
            "both" => Ok(SearchMode::Both),
            other => Err(format!(
                "Unknown search mode '{}': expected keywords, authors or both",
                other
            )),
        }
    }
}

/// A validated `(start, end)` window in `YYYY/MM/DD` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: String,
    end: String,
}

impl DateRange {
    /// Validate both ends and reject `start > end`
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, DateError> {
        let start = start.into().trim().to_string();
        let end = end.into().trim().to_string();
        let from = date::validate_date(&start)?;
        let until = date::validate_date(&end)?;
        if from > until {
            return Err(DateError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `now - frequency` up to `end` (far-future when `None`)
    pub fn from_frequency(frequency: &str, end: Option<&str>) -> Result<Self, DateError> {
        let (start, end) = date::date_range(frequency, end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Result of one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Papers from the keyword path, title-deduplicated
    pub keyword_papers: Vec<Paper>,
    /// Papers from the author paths, title-deduplicated
    pub author_papers: Vec<Paper>,
    /// Upstream ID-search hit count per keyword
    pub keyword_frequency: BTreeMap<String, usize>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.keyword_papers.is_empty()
            && self.author_papers.is_empty()
            && self.keyword_frequency.is_empty()
    }

    pub fn total(&self) -> usize {
        self.keyword_papers.len() + self.author_papers.len()
    }

    /// Both groups concatenated, then title-deduplicated (keyword papers win)
    pub fn combined(&self) -> Vec<Paper> {
        let all = self
            .keyword_papers
            .iter()
            .chain(self.author_papers.iter())
            .cloned()
            .collect();
        remove_duplicate_titles(all)
    }

    /// Paper count per provenance tag across both groups
    pub fn source_breakdown(&self) -> BTreeMap<Provenance, usize> {
        crate::utils::stats::source_breakdown(
            self.keyword_papers.iter().chain(self.author_papers.iter()),
        )
    }
}
