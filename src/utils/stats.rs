//! Derived statistics over paper batches.

use std::collections::BTreeMap;

use crate::models::{Paper, Provenance};

/// Paper count per provenance tag
pub fn source_breakdown<'a, I>(papers: I) -> BTreeMap<Provenance, usize>
where
    I: IntoIterator<Item = &'a Paper>,
{
    let mut counts = BTreeMap::new();
    for paper in papers {
        *counts.entry(paper.source).or_insert(0) += 1;
    }
    counts
}

/// Author name -> number of papers listing them. Sentinels are not counted.
pub fn author_frequencies(papers: &[Paper]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for author in papers.iter().flat_map(|p| p.authors.items()) {
        *counts.entry(author.clone()).or_insert(0) += 1;
    }
    counts
}

/// Journal name -> number of papers. Sentinels are not counted.
pub fn journal_frequencies(papers: &[Paper]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for journal in papers.iter().filter_map(|p| p.journal.present()) {
        *counts.entry(journal.clone()).or_insert(0) += 1;
    }
    counts
}

/// Whether `keyword` occurs in the title or abstract (case-insensitive)
pub fn mentions(paper: &Paper, keyword: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    [paper.title.present(), paper.abstract_text.present()]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Keyword -> number of papers mentioning it in the title or abstract
pub fn keyword_matches(papers: &[Paper], keywords: &[String]) -> BTreeMap<String, usize> {
    keywords
        .iter()
        .map(|kw| {
            let count = papers.iter().filter(|p| mentions(p, kw)).count();
            (kw.clone(), count)
        })
        .collect()
}
