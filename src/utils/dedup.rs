//! Deduplication utilities for papers within a batch.
//!
//! Both passes keep the first occurrence of each key, never reorder, and
//! always keep papers that have no key at all.

use std::collections::HashSet;

use crate::models::Paper;

/// Keep the first paper for each key; papers whose key is `None` are always kept
fn dedupe_by<F>(papers: Vec<Paper>, key: F) -> Vec<Paper>
where
    F: Fn(&Paper) -> Option<String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    papers
        .into_iter()
        .filter(|paper| match key(paper) {
            Some(k) => seen.insert(k),
            None => true,
        })
        .collect()
}

/// Remove papers whose trimmed, case-folded title was already seen.
///
/// Blank and missing titles carry no identity and are never collapsed.
pub fn remove_duplicate_titles(papers: Vec<Paper>) -> Vec<Paper> {
    dedupe_by(papers, Paper::title_key)
}

/// Remove papers whose lower-cased DOI was already seen.
///
/// Papers without a DOI are always kept.
pub fn remove_duplicate_dois(papers: Vec<Paper>) -> Vec<Paper> {
    dedupe_by(papers, Paper::doi_key)
}
