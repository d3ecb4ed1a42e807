//! Projections from upstream record shapes into canonical papers.
//!
//! Extractors are total: missing keys, wrong types and empty values all
//! degrade to sentinels. Indexing a `serde_json::Value` with a missing key
//! or on a non-object yields `Null`, so the helpers below never panic.

pub mod crossref;
pub mod pubmed;

use serde_json::Value;

use crate::models::ExtractedPaper;
use crate::sources::RawRecord;

/// Extract a paper from any raw record
pub fn extract(record: &RawRecord) -> ExtractedPaper {
    match record {
        RawRecord::PubMed(value) => pubmed::extract(value),
        RawRecord::CrossRef(value) => crossref::extract(value),
    }
}

/// View a value as a list: arrays as-is, `null` as empty, anything else as one item
pub(crate) fn items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(list) => list.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Items of a container that is either a bare list or an element wrapping
/// repeated `child` elements (`AuthorList` vs `AuthorList.Author`)
pub(crate) fn list_of<'a>(value: &'a Value, child: &str) -> Vec<&'a Value> {
    match value {
        Value::Object(map) if map.contains_key(child) => items(&map[child]),
        Value::Object(_) => Vec::new(),
        other => items(other),
    }
}

/// Text content of a scalar, or of an element's `$text`
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$text").and_then(text),
        _ => None,
    }
}

/// First element of a list, or the value itself when it is a string
pub(crate) fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(list) => list.first().and_then(text),
        other => text(other),
    }
}

/// Attribute `name` of an element converted from XML
pub(crate) fn attr<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(format!("@{}", name)).and_then(Value::as_str)
}
