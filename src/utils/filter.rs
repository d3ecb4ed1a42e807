//! Post-search filtering, ordering and sanity checks over paper batches.

use std::cmp::Reverse;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{DateRange, Paper};
use crate::utils::stats::mentions;

/// Journal and keyword criteria for [`filter_by_criteria`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperCriteria {
    /// Keep papers whose journal contains one of these (case-insensitive)
    pub journals: Vec<String>,
    /// Keep papers whose title or abstract contains one of these
    pub keywords: Vec<String>,
}

/// Papers matching every non-empty criterion, in their original order
pub fn filter_by_criteria(papers: &[Paper], criteria: &PaperCriteria) -> Vec<Paper> {
    let journals: Vec<String> = criteria
        .journals
        .iter()
        .map(|j| j.trim().to_lowercase())
        .filter(|j| !j.is_empty())
        .collect();

    papers
        .iter()
        .filter(|paper| {
            journals.is_empty()
                || paper.journal.present().is_some_and(|journal| {
                    let journal = journal.to_lowercase();
                    journals.iter().any(|j| journal.contains(j.as_str()))
                })
        })
        .filter(|paper| {
            criteria.keywords.is_empty() || criteria.keywords.iter().any(|kw| mentions(paper, kw))
        })
        .cloned()
        .collect()
}

/// Papers whose publication year falls inside `range`.
///
/// Only the year is compared (as January 1st of that year). Papers without a
/// parsable year are kept.
pub fn filter_by_date_range(papers: &[Paper], range: &DateRange) -> Vec<Paper> {
    let bounds = (
        NaiveDate::parse_from_str(range.start(), "%Y/%m/%d"),
        NaiveDate::parse_from_str(range.end(), "%Y/%m/%d"),
    );
    let (Ok(start), Ok(end)) = bounds else {
        return papers.to_vec();
    };

    papers
        .iter()
        .filter(|paper| {
            match paper
                .year()
                .and_then(|year| NaiveDate::from_ymd_opt(i32::from(year), 1, 1))
            {
                Some(date) => start <= date && date <= end,
                None => true,
            }
        })
        .cloned()
        .collect()
}

/// Stable sort by publication year; papers without a year count as year 0
pub fn sort_by_date(papers: &mut [Paper], newest_first: bool) {
    if newest_first {
        papers.sort_by_key(|paper| Reverse(paper.year().unwrap_or(0)));
    } else {
        papers.sort_by_key(|paper| paper.year().unwrap_or(0));
    }
}

/// A problem found by [`validate_paper`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaperIssue {
    #[error("No title available")]
    MissingTitle,
    #[error("No journal available")]
    MissingJournal,
    #[error("No authors available")]
    MissingAuthors,
    #[error("No date available")]
    MissingDate,
    #[error("Invalid link format")]
    InvalidLink,
}

/// Check that a paper carries the fields a report needs
pub fn validate_paper(paper: &Paper) -> Vec<PaperIssue> {
    let mut issues = Vec::new();

    if paper.title.present().map_or(true, |t| t.trim().is_empty()) {
        issues.push(PaperIssue::MissingTitle);
    }
    if paper.journal.present().map_or(true, |j| j.trim().is_empty()) {
        issues.push(PaperIssue::MissingJournal);
    }
    if paper.authors.items().is_empty() {
        issues.push(PaperIssue::MissingAuthors);
    }
    if paper.date.trim().is_empty() || paper.date.starts_with("No ") {
        issues.push(PaperIssue::MissingDate);
    }
    if let Some(link) = paper.link.present() {
        if !["http://", "https://", "doi:"]
            .iter()
            .any(|prefix| link.starts_with(prefix))
        {
            issues.push(PaperIssue::InvalidLink);
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, Provenance};

    fn paper(title: &str, journal: &str, date: &str) -> Paper {
        PaperBuilder::new()
            .title(title)
            .journal(journal)
            .author("Jane Doe")
            .date(date)
            .build()
            .tag(Provenance::Keyword)
    }

    fn titles(papers: &[Paper]) -> Vec<&str> {
        papers.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_filter_by_criteria() {
        let papers = vec![
            paper("Sleep spindles", "Nature Neuroscience", "2024/01/02"),
            paper("Glia and memory", "Neuron", "2024/01/03"),
            paper("Circadian clocks", "Cell", "2024/01/04"),
        ];

        let by_journal = PaperCriteria {
            journals: vec!["NEURO".to_string()],
            ..PaperCriteria::default()
        };
        assert_eq!(
            titles(&filter_by_criteria(&papers, &by_journal)),
            ["Sleep spindles", "Glia and memory"]
        );

        let both = PaperCriteria {
            journals: vec!["neuro".to_string()],
            keywords: vec!["memory".to_string()],
        };
        assert_eq!(titles(&filter_by_criteria(&papers, &both)), ["Glia and memory"]);

        assert_eq!(
            filter_by_criteria(&papers, &PaperCriteria::default()).len(),
            3
        );
    }

    #[test]
    fn test_filter_by_date_range_compares_years() {
        let papers = vec![
            paper("Old", "Neuron", "2019/06/01"),
            paper("Current", "Neuron", "2024/11/30"),
            paper("Undated", "Neuron", "No date available"),
        ];
        let range = DateRange::new("2024/01/01", "2024/12/31").unwrap();
        assert_eq!(
            titles(&filter_by_date_range(&papers, &range)),
            ["Current", "Undated"]
        );

        // A window starting mid-year excludes the year it starts in
        let mid_year = DateRange::new("2024/06/01", "2025/01/01").unwrap();
        assert_eq!(titles(&filter_by_date_range(&papers, &mid_year)), ["Undated"]);
    }

    #[test]
    fn test_sort_by_date() {
        let mut papers = vec![
            paper("Undated", "Neuron", "No date available"),
            paper("2020 a", "Neuron", "2020/01/01"),
            paper("2024", "Neuron", "2024/03/01"),
            paper("2020 b", "Neuron", "2020/12/31"),
        ];

        sort_by_date(&mut papers, true);
        assert_eq!(titles(&papers), ["2024", "2020 a", "2020 b", "Undated"]);

        sort_by_date(&mut papers, false);
        assert_eq!(titles(&papers), ["Undated", "2020 a", "2020 b", "2024"]);
    }

    #[test]
    fn test_validate_paper() {
        let complete = PaperBuilder::new()
            .title("Complete")
            .journal("Neuron")
            .author("Jane Doe")
            .date("2024/01/01")
            .link("https://doi.org/10.1/x")
            .build()
            .tag(Provenance::CrossRef);
        assert!(validate_paper(&complete).is_empty());

        let empty = PaperBuilder::new().build().tag(Provenance::CrossRef);
        assert_eq!(
            validate_paper(&empty),
            [
                PaperIssue::MissingTitle,
                PaperIssue::MissingJournal,
                PaperIssue::MissingAuthors,
                PaperIssue::MissingDate,
            ]
        );

        let pii_link = PaperBuilder::new()
            .title("Pii")
            .journal("Neuron")
            .author("Jane Doe")
            .date("2024/01/01")
            .link("S0001")
            .build()
            .tag(Provenance::Keyword);
        assert_eq!(validate_paper(&pii_link), [PaperIssue::InvalidLink]);
        assert_eq!(PaperIssue::InvalidLink.to_string(), "Invalid link format");
    }
}
