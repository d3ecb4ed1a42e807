//! CrossRef `works` item extractor.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{first_text, items, text};
use crate::models::{ExtractedPaper, PaperBuilder, Sentinel};
use crate::utils::date::{parse_api_date, DateSource, NO_DATE};

/// Date fields in order of preference
const DATE_FIELDS: [&str; 4] = ["issued", "published", "published-print", "published-online"];

/// Extract a canonical paper from a CrossRef work.
///
/// CrossRef works carry no keywords or affiliations worth reporting, so those
/// fields always get the CrossRef-specific sentinels.
pub fn extract(work: &Value) -> ExtractedPaper {
    let mut builder = PaperBuilder::new()
        .date(date(work))
        .keywords_sentinel(Sentinel::NoKeywordsCrossRef)
        .institutions_sentinel(Sentinel::NoInstitutionCrossRef);

    if let Some(title) = first_text(&work["title"]) {
        builder = builder.title(title);
    }
    if let Some(journal) = first_text(&work["container-title"]) {
        builder = builder.journal(journal);
    }

    let doi = text(&work["DOI"]).filter(|d| !d.trim().is_empty());
    let link = text(&work["URL"])
        .filter(|u| !u.trim().is_empty())
        .or_else(|| doi.as_ref().map(|d| format!("https://doi.org/{}", d.trim())));
    if let Some(link) = link {
        builder = builder.link(link);
    }
    if let Some(doi) = doi {
        builder = builder.doi(doi);
    }

    for author in items(&work["author"]) {
        if let Some(name) = author_name(author) {
            builder = builder.author(name);
        }
    }

    if let Some(abstract_text) = text(&work["abstract"]) {
        builder = builder.abstract_text(strip_jats(&abstract_text));
    }

    builder.build()
}

/// `given family`, or `name` for organisations
fn author_name(author: &Value) -> Option<String> {
    let given = text(&author["given"]).unwrap_or_default();
    let family = text(&author["family"]).unwrap_or_default();
    let full = format!("{} {}", given.trim(), family.trim());
    let full = full.trim();
    if full.is_empty() {
        text(&author["name"])
    } else {
        Some(full.to_string())
    }
}

/// First date field that parses; otherwise the diagnostic for `issued`
fn date(work: &Value) -> String {
    let mut first_attempt = None;
    for field in DATE_FIELDS {
        let raw = &work[field];
        let parsed = parse_api_date(raw, DateSource::CrossRef);
        if parsed == NO_DATE {
            continue;
        }
        if parsed.starts_with(|c: char| c.is_ascii_digit()) {
            return parsed;
        }
        first_attempt.get_or_insert(parsed);
    }
    first_attempt.unwrap_or_else(|| NO_DATE.to_string())
}

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").ok()).as_ref()
}

/// Remove JATS markup from an abstract and decode the basic XML entities
pub fn strip_jats(abstract_text: &str) -> String {
    let stripped = match tag_pattern() {
        Some(re) => re.replace_all(abstract_text, " ").into_owned(),
        None => abstract_text.to_string(),
    };
    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
