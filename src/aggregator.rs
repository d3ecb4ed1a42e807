//! Search orchestration across PubMed and CrossRef.
//!
//! One run walks the configured keywords and authors one at a time:
//!
//! 1. keywords go to PubMed (restricted to the configured journals),
//! 2. named authors go to PubMed by display name,
//! 3. ORCIDs go to CrossRef.
//!
//! Every hit is fetched (when the search only returned an ID), extracted,
//! tagged with its provenance and deduplicated within its group. A failure
//! for one keyword, author or record is logged and skipped; only a client
//! that cannot be built aborts the run.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SearchConfig};
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::models::{
    DateRange, ExtractedPaper, Paper, Provenance, SearchMode, SearchOutcome, SearchRun,
};
use crate::sources::{CrossRefSource, Hit, PubMedSource, Source, SourceQuery};
use crate::utils::{remove_duplicate_dois, remove_duplicate_titles, RateLimiter};

/// The queries one run will issue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPlan {
    /// Keywords for the PubMed keyword path
    pub keywords: Vec<String>,
    /// Journals every keyword search is restricted to
    pub journals: Vec<String>,
    /// Display names for the PubMed author path
    pub author_names: Vec<String>,
    /// ORCIDs for the CrossRef author path
    pub orcids: Vec<String>,
}

impl SearchPlan {
    /// Decide which paths run for `mode`.
    ///
    /// The keyword path runs for every topic, restricted to the configured
    /// journals when there are any. Author names are only searched on PubMed
    /// when `pubmed_author_search` is enabled.
    pub fn new(search: &SearchConfig, mode: SearchMode, pubmed_author_search: bool) -> Self {
        let mut plan = SearchPlan::default();

        if mode.includes_keywords() && !search.topics.is_empty() {
            plan.keywords = search.topics.clone();
            plan.journals = search.journals.clone();
        }

        if mode.includes_authors() {
            plan.orcids = search.orcids.clone();
            if pubmed_author_search {
                plan.author_names = search
                    .named_authors
                    .iter()
                    .filter_map(|a| a.name.as_deref())
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.author_names.is_empty() && self.orcids.is_empty()
    }

    pub fn needs_pubmed(&self) -> bool {
        !self.keywords.is_empty() || !self.author_names.is_empty()
    }

    pub fn needs_crossref(&self) -> bool {
        !self.orcids.is_empty()
    }
}

/// Runs searches with the configured clients
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: Config,
}

impl Aggregator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one search.
    ///
    /// Clients and their rate limiters live for this call only. An empty plan
    /// returns an empty outcome without building any client.
    pub async fn run(
        &self,
        search: &SearchConfig,
        range: &DateRange,
        mode: SearchMode,
    ) -> Result<SearchOutcome> {
        let plan = SearchPlan::new(search, mode, self.config.engine.pubmed_author_search);
        if plan.is_empty() {
            tracing::info!(mode = %mode, "Nothing to search for");
            return Ok(SearchOutcome::default());
        }

        let pubmed = if plan.needs_pubmed() {
            let limiter = RateLimiter::delay_each(Duration::from_millis(
                self.config.pubmed.request_delay_ms,
            ));
            let source = PubMedSource::new(&self.config.pubmed, &search.email, Arc::new(limiter))
                .map_err(|e| Error::Configuration(e.to_string()))?;
            Some(source)
        } else {
            None
        };

        let crossref = if plan.needs_crossref() {
            let limiter = RateLimiter::min_interval(Duration::from_millis(
                self.config.crossref.query_delay_ms,
            ));
            let email = Some(search.email.as_str());
            let source = CrossRefSource::new(&self.config.crossref, email, Arc::new(limiter))
                .map_err(|e| Error::Configuration(e.to_string()))?;
            Some(source)
        } else {
            None
        };

        tracing::info!(
            mode = %mode,
            range = %range,
            keywords = plan.keywords.len(),
            authors = plan.author_names.len(),
            orcids = plan.orcids.len(),
            "Starting search"
        );

        Ok(gather(
            &plan,
            range,
            pubmed.as_ref().map(|s| s as &dyn Source),
            crossref.as_ref().map(|s| s as &dyn Source),
        )
        .await)
    }

    /// Run a search and drive `run` through its lifecycle
    pub async fn execute(&self, run: &mut SearchRun, search: &SearchConfig) -> Result<SearchOutcome> {
        run.start()?;
        let range = run.range.clone();
        match self.run(search, &range, run.mode).await {
            Ok(outcome) => {
                run.complete(&outcome)?;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Search run failed");
                run.fail(e.to_string())?;
                Err(e)
            }
        }
    }
}

/// Execute `plan` against the given sources.
///
/// Keyword frequencies are the upstream hit counts, taken before any detail
/// fetch, so they can exceed the number of papers returned.
pub async fn gather(
    plan: &SearchPlan,
    range: &DateRange,
    pubmed: Option<&dyn Source>,
    crossref: Option<&dyn Source>,
) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();

    if let Some(pubmed) = pubmed {
        let mut keyword_papers = Vec::new();
        for keyword in &plan.keywords {
            let query = SourceQuery::Keyword {
                keyword: keyword.clone(),
                journals: plan.journals.clone(),
                range: range.clone(),
            };
            let (hits, papers) = collect(pubmed, &query).await;
            outcome.keyword_frequency.insert(keyword.clone(), hits);
            keyword_papers.extend(tag(papers, Provenance::Keyword));
        }
        outcome.keyword_papers = remove_duplicate_titles(keyword_papers);
    } else if !plan.keywords.is_empty() {
        tracing::warn!("No PubMed source available, skipping keyword search");
    }

    let mut author_papers = Vec::new();
    if let Some(pubmed) = pubmed {
        for name in &plan.author_names {
            let query = SourceQuery::Author {
                name: name.clone(),
                range: range.clone(),
            };
            let (_, papers) = collect(pubmed, &query).await;
            author_papers.extend(tag(papers, Provenance::PubmedAuthor));
        }
    }

    if let Some(crossref) = crossref {
        let mut crossref_papers = Vec::new();
        for orcid in &plan.orcids {
            let query = SourceQuery::Orcid {
                orcid: orcid.clone(),
                range: range.clone(),
            };
            let (_, papers) = collect(crossref, &query).await;
            crossref_papers.extend(tag(papers, Provenance::CrossRef));
        }
        author_papers.extend(remove_duplicate_dois(crossref_papers));
    } else if !plan.orcids.is_empty() {
        tracing::warn!("No CrossRef source available, skipping ORCID search");
    }
    outcome.author_papers = remove_duplicate_titles(author_papers);

    tracing::info!(
        keyword_papers = outcome.keyword_papers.len(),
        author_papers = outcome.author_papers.len(),
        "Search complete"
    );
    outcome
}

/// Search one query and extract every hit; returns the hit count and the papers
async fn collect(source: &dyn Source, query: &SourceQuery) -> (usize, Vec<ExtractedPaper>) {
    let hits = match source.search(query).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(
                source = %source.id(),
                query = %query.label(),
                error = %e,
                "Search failed, treating as no results"
            );
            return (0, Vec::new());
        }
    };

    let count = hits.len();
    let mut papers = Vec::with_capacity(count);
    for hit in hits {
        let record = match hit {
            Hit::Record(record) => record,
            Hit::Id(id) => match source.fetch_details(&id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        source = %source.id(),
                        id = %id,
                        error = %e,
                        "Detail fetch failed, skipping record"
                    );
                    continue;
                }
            },
        };
        papers.push(extract(&record));
    }

    tracing::debug!(
        source = %source.id(),
        query = %query.label(),
        hits = count,
        extracted = papers.len(),
        "Query processed"
    );
    (count, papers)
}

fn tag(papers: Vec<ExtractedPaper>, source: Provenance) -> impl Iterator<Item = Paper> {
    papers.into_iter().map(move |p| p.tag(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamedAuthor;
    use crate::models::RunStatus;
    use crate::sources::{MockSource, RawRecord, SourceCapabilities};
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new("2024/01/01", "2024/01/08").unwrap()
    }

    fn pubmed_record(title: &str) -> RawRecord {
        RawRecord::PubMed(json!({"MedlineCitation": {"Article": {"ArticleTitle": title}}}))
    }

    fn crossref_record(title: &str, doi: &str) -> Hit {
        Hit::Record(RawRecord::CrossRef(json!({"title": [title], "DOI": doi})))
    }

    fn search_config() -> SearchConfig {
        SearchConfig {
            email: "me@example.org".to_string(),
            topics: vec!["sleep".to_string(), "memory".to_string()],
            journals: vec!["Neuron".to_string()],
            orcids: vec!["0000-0002-1825-0097".to_string()],
            named_authors: vec![NamedAuthor {
                name: Some("Josiah Carberry".to_string()),
                orcid: "0000-0002-1825-0097".to_string(),
            }],
            lookup_frequency: "1 week".to_string(),
        }
    }

    fn pubmed_mock() -> MockSource {
        MockSource::new("pubmed").with_capabilities(
            SourceCapabilities::KEYWORD_SEARCH
                | SourceCapabilities::AUTHOR_SEARCH
                | SourceCapabilities::FETCH_DETAILS,
        )
    }

    fn crossref_mock() -> MockSource {
        MockSource::new("crossref").with_capabilities(SourceCapabilities::ORCID_SEARCH)
    }

    #[test]
    fn test_plan_by_mode() {
        let search = search_config();

        let both = SearchPlan::new(&search, SearchMode::Both, true);
        assert_eq!(both.keywords, ["sleep", "memory"]);
        assert_eq!(both.author_names, ["Josiah Carberry"]);
        assert_eq!(both.orcids, ["0000-0002-1825-0097"]);

        let keywords = SearchPlan::new(&search, SearchMode::Keywords, true);
        assert!(keywords.orcids.is_empty() && keywords.author_names.is_empty());
        assert!(!keywords.needs_crossref());

        let authors = SearchPlan::new(&search, SearchMode::Authors, false);
        assert!(authors.keywords.is_empty());
        assert!(authors.author_names.is_empty());
        assert!(authors.needs_crossref() && !authors.needs_pubmed());
    }

    #[tokio::test]
    async fn test_keyword_path_runs_without_journals() {
        let search = SearchConfig {
            journals: Vec::new(),
            ..search_config()
        };
        let plan = SearchPlan::new(&search, SearchMode::Keywords, true);
        assert_eq!(plan.keywords, ["sleep", "memory"]);
        assert!(plan.journals.is_empty());
        assert!(plan.needs_pubmed());

        let pubmed = pubmed_mock()
            .with_ids("sleep", ["1"])
            .with_record("1", pubmed_record("Sleep paper"));
        let outcome = gather(&plan, &range(), Some(&pubmed), None).await;

        assert_eq!(pubmed.search_calls(), ["sleep", "memory"]);
        assert_eq!(outcome.keyword_frequency["sleep"], 1);
        assert_eq!(outcome.keyword_papers.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped_but_counted() {
        let pubmed = pubmed_mock()
            .with_ids("sleep", ["1", "2", "3"])
            .with_record("1", pubmed_record("First"))
            .with_fetch_status("2", 404)
            .with_record("3", pubmed_record("Third"));
        let plan = SearchPlan {
            keywords: vec!["sleep".to_string()],
            journals: vec!["Neuron".to_string()],
            ..SearchPlan::default()
        };

        let outcome = gather(&plan, &range(), Some(&pubmed), None).await;

        assert_eq!(outcome.keyword_papers.len(), 2);
        assert_eq!(outcome.keyword_frequency["sleep"], 3);
        assert!(outcome
            .keyword_papers
            .iter()
            .all(|p| p.source == Provenance::Keyword));
        assert_eq!(pubmed.fetch_calls(), ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_failed_keyword_does_not_abort_batch() {
        let pubmed = pubmed_mock()
            .with_search_failure("sleep")
            .with_ids("memory", ["7"])
            .with_record("7", pubmed_record("Memory paper"));
        let plan = SearchPlan::new(&search_config(), SearchMode::Keywords, true);

        let outcome = gather(&plan, &range(), Some(&pubmed), None).await;

        assert_eq!(outcome.keyword_frequency["sleep"], 0);
        assert_eq!(outcome.keyword_frequency["memory"], 1);
        assert_eq!(outcome.keyword_papers.len(), 1);
        assert_eq!(pubmed.search_calls(), ["sleep", "memory"]);
    }

    #[tokio::test]
    async fn test_keyword_papers_deduplicated_by_title() {
        let pubmed = pubmed_mock()
            .with_ids("sleep", ["1"])
            .with_ids("memory", ["2"])
            .with_record("1", pubmed_record("Sleep and memory"))
            .with_record("2", pubmed_record("SLEEP AND MEMORY"));
        let plan = SearchPlan::new(&search_config(), SearchMode::Keywords, true);

        let outcome = gather(&plan, &range(), Some(&pubmed), None).await;

        assert_eq!(outcome.keyword_papers.len(), 1);
        assert_eq!(outcome.keyword_frequency.len(), 2);
    }

    #[tokio::test]
    async fn test_author_group_dedup_and_provenance() {
        let pubmed = pubmed_mock()
            .with_ids("Josiah Carberry", ["10"])
            .with_record("10", pubmed_record("Shared title"));
        let crossref = crossref_mock()
            .with_hits(
                "0000-0002-1825-0097",
                vec![
                    crossref_record("Shared title", "10.1/shared"),
                    crossref_record("Only on CrossRef", "10.1/ABC"),
                ],
            )
            .with_hits(
                "0000-0001-5109-3700",
                vec![crossref_record("Same work, other title", "10.1/abc")],
            );
        let plan = SearchPlan {
            author_names: vec!["Josiah Carberry".to_string()],
            orcids: vec![
                "0000-0002-1825-0097".to_string(),
                "0000-0001-5109-3700".to_string(),
            ],
            ..SearchPlan::default()
        };

        let outcome = gather(&plan, &range(), Some(&pubmed), Some(&crossref)).await;

        let papers: Vec<(&str, Provenance)> = outcome
            .author_papers
            .iter()
            .map(|p| (p.title.as_str(), p.source))
            .collect();
        assert_eq!(
            papers,
            [
                ("Shared title", Provenance::PubmedAuthor),
                ("Only on CrossRef", Provenance::CrossRef),
            ]
        );
        assert!(outcome.keyword_papers.is_empty());
        assert!(outcome.keyword_frequency.is_empty());
        assert!(crossref.fetch_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_plan_makes_no_calls() {
        let pubmed = pubmed_mock();
        let crossref = crossref_mock();
        let search = SearchConfig {
            topics: Vec::new(),
            orcids: Vec::new(),
            named_authors: Vec::new(),
            ..search_config()
        };
        let plan = SearchPlan::new(&search, SearchMode::Both, true);

        let outcome = gather(&plan, &range(), Some(&pubmed), Some(&crossref)).await;

        assert!(outcome.is_empty());
        assert!(pubmed.search_calls().is_empty());
        assert!(crossref.search_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_with_empty_plan_needs_no_client() {
        let search = SearchConfig {
            email: String::new(),
            topics: Vec::new(),
            orcids: Vec::new(),
            named_authors: Vec::new(),
            ..search_config()
        };

        let outcome = Aggregator::default()
            .run(&search, &range(), SearchMode::Both)
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::default());
    }

    #[tokio::test]
    async fn test_missing_email_fails_the_run() {
        let search = SearchConfig {
            email: "  ".to_string(),
            ..search_config()
        };
        let mut run = SearchRun::new(SearchMode::Keywords, range());

        let result = Aggregator::default().execute(&mut run, &search).await;

        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(run.status(), RunStatus::Failed);
        assert!(run.error.is_some());
    }
}
