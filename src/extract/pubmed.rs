//! PubMed record extractor.
//!
//! Accepts a `PubmedArticle` (with `MedlineCitation` and `PubmedData`) or a
//! bare `MedlineCitation`, in either the XML-tree shape produced by
//! [`crate::utils::xml::xml_to_value`] (`AuthorList.Author[..]`) or the
//! flattened list shape (`AuthorList[..]`).

use serde_json::Value;

use super::{attr, items, list_of, text};
use crate::models::{ExtractedPaper, PaperBuilder};
use crate::utils::date::{parse_api_date, DateSource};

/// Extract a canonical paper from a PubMed article
pub fn extract(article: &Value) -> ExtractedPaper {
    let citation = match article.get("MedlineCitation") {
        Some(citation) => citation,
        None => article,
    };
    let data = &citation["Article"];

    let mut builder = PaperBuilder::new().date(date(data));

    if let Some(title) = text(&data["ArticleTitle"]) {
        builder = builder.title(title);
    }
    if let Some(journal) = text(&data["Journal"]["Title"]) {
        builder = builder.journal(journal);
    }
    if let Some(abstract_text) = abstract_text(data) {
        builder = builder.abstract_text(abstract_text);
    }
    if let Some(link) = link(data).or_else(|| article_id_link(article)) {
        builder = builder.link(link);
    }

    let authors = list_of(&data["AuthorList"], "Author");
    for author in &authors {
        if let Some(name) = author_name(author) {
            builder = builder.author(name);
        }
    }
    for author in &authors {
        for affiliation in items(&author["AffiliationInfo"]) {
            if let Some(institution) = text(&affiliation["Affiliation"]) {
                builder = builder.institution(institution);
            }
        }
    }

    let mut keywords = Vec::new();
    collect_keywords(&citation["KeywordList"], &mut keywords);
    for keyword in keywords {
        builder = builder.keyword(keyword);
    }

    builder.build()
}

/// `ForeName LastName`, falling back to the last name or a collective name
fn author_name(author: &Value) -> Option<String> {
    let fore = text(&author["ForeName"]).filter(|s| !s.trim().is_empty());
    let last = text(&author["LastName"]).filter(|s| !s.trim().is_empty());
    match (fore, last) {
        (Some(fore), Some(last)) => Some(format!("{} {}", fore, last)),
        (None, Some(last)) => Some(last),
        _ => text(&author["CollectiveName"]),
    }
}

/// Keyword lists may be repeated (one per owner) and nested; flatten all of them
fn collect_keywords(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(list) => list.iter().for_each(|v| collect_keywords(v, out)),
        Value::Object(map) => match map.get("Keyword") {
            Some(inner) => collect_keywords(inner, out),
            None => out.extend(text(value)),
        },
        other => out.extend(text(other)),
    }
}

/// First abstract segment
fn abstract_text(data: &Value) -> Option<String> {
    items(&data["Abstract"]["AbstractText"])
        .first()
        .and_then(|segment| text(segment))
}

/// `ArticleDate`, falling back to the journal issue's `PubDate`
fn date(data: &Value) -> String {
    let article_date = &data["ArticleDate"];
    let raw = if is_blank(article_date) {
        &data["Journal"]["JournalIssue"]["PubDate"]
    } else {
        article_date
    };
    parse_api_date(raw, DateSource::PubMed)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn doi_url(doi: &str) -> String {
    format!("https://doi.org/{}", doi.trim())
}

/// Link from `ELocationID`.
///
/// For a list, a DOI-typed entry wins, then a bare string entry, then the
/// first entry's raw value.
/// A bare string is taken to be a DOI. A single typed element is a DOI
/// link only when typed `doi` (or untyped).
fn link(data: &Value) -> Option<String> {
    match &data["ELocationID"] {
        Value::Array(entries) => {
            let typed_doi = entries
                .iter()
                .filter(|entry| entry.is_object() && attr(entry, "EIdType") == Some("doi"))
                .filter_map(|entry| text(entry))
                .find(|doi| !doi.trim().is_empty());
            if let Some(doi) = typed_doi {
                return Some(doi_url(&doi));
            }
            let bare = entries
                .iter()
                .filter_map(Value::as_str)
                .find(|doi| !doi.trim().is_empty());
            if let Some(doi) = bare {
                return Some(doi_url(doi));
            }
            entries.first().and_then(text)
        }
        Value::String(doi) if !doi.trim().is_empty() => Some(doi_url(doi)),
        entry @ Value::Object(_) => {
            let value = text(entry).filter(|v| !v.trim().is_empty())?;
            match attr(entry, "EIdType") {
                None | Some("doi") => Some(doi_url(&value)),
                Some(_) => Some(value),
            }
        }
        _ => None,
    }
}

/// DOI from `PubmedData.ArticleIdList`, used when there is no `ELocationID`
fn article_id_link(article: &Value) -> Option<String> {
    list_of(&article["PubmedData"]["ArticleIdList"], "ArticleId")
        .into_iter()
        .find(|id| attr(id, "IdType") == Some("doi"))
        .and_then(text)
        .filter(|doi| !doi.trim().is_empty())
        .map(|doi| doi_url(&doi))
}
