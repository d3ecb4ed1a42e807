//! Canonical paper model shared by every upstream source.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder text written in place of a missing field.
///
/// Downstream consumers compare against these exact literals, so the
/// strings must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    NoTitle,
    NoJournal,
    NoAuthors,
    NoKeywords,
    NoKeywordsCrossRef,
    NoInstitution,
    NoInstitutionCrossRef,
    NoAbstract,
    NoLink,
    NoDate,
}

impl Sentinel {
    const ALL: [Sentinel; 10] = [
        Sentinel::NoTitle,
        Sentinel::NoJournal,
        Sentinel::NoAuthors,
        Sentinel::NoKeywords,
        Sentinel::NoKeywordsCrossRef,
        Sentinel::NoInstitution,
        Sentinel::NoInstitutionCrossRef,
        Sentinel::NoAbstract,
        Sentinel::NoLink,
        Sentinel::NoDate,
    ];

    /// The literal placeholder text
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::NoTitle => "No title available",
            Sentinel::NoJournal => "No journal available",
            Sentinel::NoAuthors => "No authors available",
            Sentinel::NoKeywords => "No keywords available",
            Sentinel::NoKeywordsCrossRef => "No keywords (CrossRef)",
            Sentinel::NoInstitution => "No institution listed",
            Sentinel::NoInstitutionCrossRef => "No institution listed (CrossRef)",
            Sentinel::NoAbstract => "No abstract available",
            Sentinel::NoLink => "No link available",
            Sentinel::NoDate => "No date available",
        }
    }

    /// Recognize a placeholder literal
    pub fn from_literal(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value types that can stand in for a [`Sentinel`] at the serialization boundary
pub trait SentinelValue: Sized {
    /// Render a sentinel in this value's shape
    fn from_sentinel(sentinel: Sentinel) -> Self;

    /// Recognize a rendered sentinel
    fn as_sentinel(&self) -> Option<Sentinel>;
}

impl SentinelValue for String {
    fn from_sentinel(sentinel: Sentinel) -> Self {
        sentinel.as_str().to_string()
    }

    fn as_sentinel(&self) -> Option<Sentinel> {
        Sentinel::from_literal(self)
    }
}

impl SentinelValue for Vec<String> {
    fn from_sentinel(sentinel: Sentinel) -> Self {
        vec![sentinel.as_str().to_string()]
    }

    fn as_sentinel(&self) -> Option<Sentinel> {
        match self.as_slice() {
            [only] => Sentinel::from_literal(only),
            _ => None,
        }
    }
}

/// A field that is either present or explicitly missing.
///
/// Serializes to the bare value, or to the sentinel literal when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Present(T),
    Missing(Sentinel),
}

impl<T> Field<T> {
    /// `Present` when `value` is `Some`, otherwise `Missing(sentinel)`
    pub fn or_missing(value: Option<T>, sentinel: Sentinel) -> Self {
        match value {
            Some(v) => Field::Present(v),
            None => Field::Missing(sentinel),
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            Field::Missing(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }
}

impl Field<String> {
    /// The value, or the sentinel literal when missing
    pub fn as_str(&self) -> &str {
        match self {
            Field::Present(v) => v,
            Field::Missing(s) => s.as_str(),
        }
    }
}

impl Field<Vec<String>> {
    /// The present items; empty when missing
    pub fn items(&self) -> &[String] {
        match self {
            Field::Present(v) => v,
            Field::Missing(_) => &[],
        }
    }
}

impl<T: SentinelValue> Field<T> {
    fn from_value(value: T) -> Self {
        match value.as_sentinel() {
            Some(sentinel) => Field::Missing(sentinel),
            None => Field::Present(value),
        }
    }
}

impl<T: SentinelValue + Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Present(v) => v.serialize(serializer),
            Field::Missing(s) => T::from_sentinel(*s).serialize(serializer),
        }
    }
}

impl<'de, T: SentinelValue + Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Field::from_value)
    }
}

/// Which search path produced a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provenance {
    /// PubMed keyword + journal search
    #[serde(rename = "keyword")]
    Keyword,
    /// PubMed search by author display name
    #[serde(rename = "pubmed_author")]
    PubmedAuthor,
    /// CrossRef search by ORCID
    #[serde(rename = "crossref")]
    CrossRef,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Keyword => "keyword",
            Provenance::PubmedAuthor => "pubmed_author",
            Provenance::CrossRef => "crossref",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized paper, tagged with the search path that produced it.
///
/// Missing fields carry a [`Sentinel`] so serialized output never contains
/// nulls for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: Field<String>,
    pub journal: Field<String>,
    pub authors: Field<Vec<String>>,
    /// `YYYY/MM/DD`, `YYYY/01/01`, or a diagnostic string for unparsable input
    pub date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Field<String>,
    pub keywords: Field<Vec<String>>,
    pub institutions: Field<Vec<String>>,
    pub link: Field<String>,
    pub source: Provenance,
    pub doi: Option<String>,
}

impl Paper {
    /// Publication year, when the date starts with four digits
    pub fn year(&self) -> Option<u16> {
        self.date.get(..4).and_then(|y| y.parse().ok())
    }

    pub fn has_abstract(&self) -> bool {
        self.abstract_text.is_present()
    }

    pub fn has_doi(&self) -> bool {
        self.doi.is_some()
    }

    /// Trimmed, lower-cased title; `None` when the title is blank or missing
    pub fn title_key(&self) -> Option<String> {
        self.title
            .present()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }

    /// Lower-cased DOI; `None` when absent
    pub fn doi_key(&self) -> Option<String> {
        self.doi
            .as_deref()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
    }
}

/// Output of a record extractor, before a search path has claimed it.
///
/// [`ExtractedPaper::tag`] is the only way to obtain a [`Paper`], so the
/// provenance is assigned exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPaper {
    pub title: Field<String>,
    pub journal: Field<String>,
    pub authors: Field<Vec<String>>,
    pub date: String,
    pub abstract_text: Field<String>,
    pub keywords: Field<Vec<String>>,
    pub institutions: Field<Vec<String>>,
    pub link: Field<String>,
    pub doi: Option<String>,
}

impl ExtractedPaper {
    /// Assign provenance
    pub fn tag(self, source: Provenance) -> Paper {
        Paper {
            title: self.title,
            journal: self.journal,
            authors: self.authors,
            date: self.date,
            abstract_text: self.abstract_text,
            keywords: self.keywords,
            institutions: self.institutions,
            link: self.link,
            source,
            doi: self.doi,
        }
    }
}

/// Pull a DOI out of a `doi.org` URL or a bare `10.` identifier
pub fn doi_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    if let Some(idx) = link.rfind("doi.org/") {
        let doi = &link[idx + "doi.org/".len()..];
        return (!doi.is_empty()).then(|| doi.to_string());
    }
    if let Some(doi) = link.strip_prefix("doi:") {
        let doi = doi.trim();
        return doi.starts_with("10.").then(|| doi.to_string());
    }
    link.starts_with("10.").then(|| link.to_string())
}

/// Collapse runs of whitespace and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builder for [`ExtractedPaper`].
///
/// Text is whitespace-cleaned; blank text and empty lists become their
/// sentinel. The DOI is derived from the link unless set explicitly.
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    title: Option<String>,
    journal: Option<String>,
    authors: Vec<String>,
    date: Option<String>,
    abstract_text: Option<String>,
    keywords: Vec<String>,
    keywords_sentinel: Sentinel,
    institutions: Vec<String>,
    institutions_sentinel: Sentinel,
    link: Option<String>,
    doi: Option<String>,
}

impl Default for PaperBuilder {
    fn default() -> Self {
        Self {
            title: None,
            journal: None,
            authors: Vec::new(),
            date: None,
            abstract_text: None,
            keywords: Vec::new(),
            keywords_sentinel: Sentinel::NoKeywords,
            institutions: Vec::new(),
            institutions_sentinel: Sentinel::NoInstitution,
            link: None,
            doi: None,
        }
    }
}

fn non_blank(text: impl AsRef<str>) -> Option<String> {
    let cleaned = clean_text(text.as_ref());
    (!cleaned.is_empty()).then_some(cleaned)
}

impl PaperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl AsRef<str>) -> Self {
        self.title = non_blank(title);
        self
    }

    pub fn journal(mut self, journal: impl AsRef<str>) -> Self {
        self.journal = non_blank(journal);
        self
    }

    /// Add an author; blank names are skipped
    pub fn author(mut self, name: impl AsRef<str>) -> Self {
        if let Some(name) = non_blank(name) {
            self.authors.push(name);
        }
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn abstract_text(mut self, text: impl AsRef<str>) -> Self {
        self.abstract_text = non_blank(text);
        self
    }

    /// Add a keyword; blank keywords are skipped
    pub fn keyword(mut self, keyword: impl AsRef<str>) -> Self {
        if let Some(keyword) = non_blank(keyword) {
            self.keywords.push(keyword);
        }
        self
    }

    /// Sentinel used when no keywords were added
    pub fn keywords_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.keywords_sentinel = sentinel;
        self
    }

    /// Add an institution; blank entries are skipped
    pub fn institution(mut self, institution: impl AsRef<str>) -> Self {
        if let Some(institution) = non_blank(institution) {
            self.institutions.push(institution);
        }
        self
    }

    /// Sentinel used when no institutions were added
    pub fn institutions_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.institutions_sentinel = sentinel;
        self
    }

    pub fn link(mut self, link: impl AsRef<str>) -> Self {
        self.link = non_blank(link);
        self
    }

    /// Set the DOI explicitly instead of deriving it from the link
    pub fn doi(mut self, doi: impl AsRef<str>) -> Self {
        self.doi = non_blank(doi);
        self
    }

    pub fn build(self) -> ExtractedPaper {
        let doi = self
            .doi
            .or_else(|| self.link.as_deref().and_then(doi_from_link));

        let list = |items: Vec<String>, sentinel| {
            if items.is_empty() {
                Field::Missing(sentinel)
            } else {
                Field::Present(items)
            }
        };

        ExtractedPaper {
            title: Field::or_missing(self.title, Sentinel::NoTitle),
            journal: Field::or_missing(self.journal, Sentinel::NoJournal),
            authors: list(self.authors, Sentinel::NoAuthors),
            date: self
                .date
                .unwrap_or_else(|| Sentinel::NoDate.as_str().to_string()),
            abstract_text: Field::or_missing(self.abstract_text, Sentinel::NoAbstract),
            keywords: list(self.keywords, self.keywords_sentinel),
            institutions: list(self.institutions, self.institutions_sentinel),
            link: Field::or_missing(self.link, Sentinel::NoLink),
            doi,
        }
    }
}
