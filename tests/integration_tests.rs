//! Integration tests for litwatch
//!
//! These tests drive the real PubMed and CrossRef clients against local
//! mock servers and check the full search pipeline end to end.

use std::sync::Arc;

use litwatch::config::{
    load_config, Config, CrossRefConfig, EngineConfig, PubMedConfig, RetrySettings, SearchConfig,
};
use litwatch::extract::extract;
use litwatch::models::{DateRange, Provenance, RunStatus, SearchMode, SearchRun, Sentinel};
use litwatch::sources::{
    date_filter, keyword_query, orcid_filter, CrossRefSource, Hit, PubMedSource, RawRecord, Source,
    SourceError, SourceQuery,
};
use litwatch::utils::date::{format_for_api, parse_frequency};
use litwatch::utils::remove_duplicate_titles;
use litwatch::utils::xml::xml_to_value;
use litwatch::utils::RateLimiter;
use litwatch::Aggregator;
use mockito::{Matcher, Server};
use serde_json::json;

const EMAIL: &str = "watcher@example.org";
const ORCID: &str = "0000-0002-1825-0097";

fn range() -> DateRange {
    DateRange::new("2024/01/01", "2024/01/31").unwrap()
}

fn esearch_body(ids: &[&str]) -> String {
    let ids: String = ids.iter().map(|id| format!("<Id>{}</Id>", id)).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult><Count>{count}</Count><RetMax>{count}</RetMax><RetStart>0</RetStart>
<IdList>{ids}</IdList>
</eSearchResult>"#,
        count = ids.matches("<Id>").count(),
        ids = ids
    )
}

fn efetch_body(pmid: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">{pmid}</PMID>
      <Article PubModel="Print">
        <Journal>
          <Title>Neuron</Title>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2024</Year><Month>Jan</Month></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>{title}</ArticleTitle>
        <ELocationID EIdType="doi" ValidYN="Y">10.1016/j.neuron.{pmid}</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Sleep consolidates <i>memory</i> traces.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Doe</LastName>
            <ForeName>Jane</ForeName>
            <AffiliationInfo><Affiliation>Example University</Affiliation></AffiliationInfo>
          </Author>
        </AuthorList>
      </Article>
      <KeywordList Owner="NOTNLM">
        <Keyword MajorTopicYN="N">sleep</Keyword>
        <Keyword MajorTopicYN="N">memory</Keyword>
      </KeywordList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">{pmid}</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#,
        pmid = pmid,
        title = title
    )
}

fn no_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: Some(1),
        backoff_ms: 0,
        backoff_multiplier: 1.0,
        max_backoff_ms: 0,
    }
}

fn pubmed_config(base_url: &str) -> PubMedConfig {
    PubMedConfig {
        base_url: base_url.to_string(),
        request_delay_ms: 0,
        retry: no_retry(),
        ..PubMedConfig::default()
    }
}

fn crossref_config(base_url: &str) -> CrossRefConfig {
    CrossRefConfig {
        base_url: base_url.to_string(),
        query_delay_ms: 0,
        retry: no_retry(),
        ..CrossRefConfig::default()
    }
}

fn search_config() -> SearchConfig {
    SearchConfig {
        email: EMAIL.to_string(),
        topics: vec!["sleep".to_string()],
        journals: vec!["Neuron".to_string()],
        orcids: vec![ORCID.to_string()],
        named_authors: Vec::new(),
        lookup_frequency: "1 week".to_string(),
    }
}

#[tokio::test]
async fn test_pubmed_wire_contract() {
    let mut server = Server::new_async().await;
    let journals = vec!["Neuron".to_string()];
    let term = keyword_query("sleep", &journals, &range());

    let esearch = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("term".into(), term.clone()),
            Matcher::UrlEncoded("retmax".into(), "1000".into()),
            Matcher::UrlEncoded("sort".into(), "relevance".into()),
            Matcher::UrlEncoded("tool".into(), "litwatch".into()),
            Matcher::UrlEncoded("email".into(), EMAIL.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(esearch_body(&["38000001"]))
        .expect(1)
        .create_async()
        .await;

    let efetch = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("id".into(), "38000001".into()),
            Matcher::UrlEncoded("rettype".into(), "medline".into()),
            Matcher::UrlEncoded("retmode".into(), "xml".into()),
            Matcher::UrlEncoded("email".into(), EMAIL.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(efetch_body("38000001", "Sleep and memory"))
        .expect(1)
        .create_async()
        .await;

    let source = PubMedSource::new(
        &pubmed_config(&server.url()),
        EMAIL,
        Arc::new(RateLimiter::unlimited()),
    )
    .unwrap();

    let query = SourceQuery::Keyword {
        keyword: "sleep".to_string(),
        journals,
        range: range(),
    };
    let hits = source.search(&query).await.unwrap();
    assert_eq!(hits, vec![Hit::Id("38000001".to_string())]);

    let record = source.fetch_details("38000001").await.unwrap();
    let paper = extract(&record);
    assert_eq!(paper.title.as_str(), "Sleep and memory");
    assert_eq!(paper.journal.as_str(), "Neuron");
    assert_eq!(paper.authors.items(), ["Jane Doe"]);
    assert_eq!(paper.institutions.items(), ["Example University"]);
    assert_eq!(paper.keywords.items(), ["sleep", "memory"]);
    assert_eq!(paper.abstract_text.as_str(), "Sleep consolidates memory traces.");
    assert_eq!(paper.date, "2024/01/01");
    assert_eq!(paper.link.as_str(), "https://doi.org/10.1016/j.neuron.38000001");
    assert_eq!(paper.doi.as_deref(), Some("10.1016/j.neuron.38000001"));

    esearch.assert_async().await;
    efetch.assert_async().await;
}

#[tokio::test]
async fn test_pubmed_search_failure_is_empty() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let source = PubMedSource::new(
        &pubmed_config(&server.url()),
        EMAIL,
        Arc::new(RateLimiter::unlimited()),
    )
    .unwrap();

    let query = SourceQuery::Author {
        name: "Jane Doe".to_string(),
        range: range(),
    };
    assert!(source.search(&query).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pubmed_retries_throttled_fetch() {
    let mut server = Server::new_async().await;
    let throttled = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
        .with_status(429)
        .with_body("Too Many Requests")
        .expect(3)
        .create_async()
        .await;

    let config = PubMedConfig {
        retry: RetrySettings {
            max_attempts: Some(3),
            ..no_retry()
        },
        ..pubmed_config(&server.url())
    };
    let source = PubMedSource::new(&config, EMAIL, Arc::new(RateLimiter::unlimited())).unwrap();

    let err = source.fetch_details("1").await.unwrap_err();
    assert!(matches!(err, SourceError::Transient { status: 429, .. }));
    throttled.assert_async().await;
}

#[tokio::test]
async fn test_pubmed_does_not_retry_other_statuses() {
    let mut server = Server::new_async().await;
    let missing = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "2".into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let config = PubMedConfig {
        retry: RetrySettings {
            max_attempts: None,
            ..no_retry()
        },
        ..pubmed_config(&server.url())
    };
    let source = PubMedSource::new(&config, EMAIL, Arc::new(RateLimiter::unlimited())).unwrap();

    let err = source.fetch_details("2").await.unwrap_err();
    assert!(matches!(err, SourceError::Upstream { status: 404, .. }));
    missing.assert_async().await;
}

#[tokio::test]
async fn test_crossref_wire_contract() {
    let mut server = Server::new_async().await;
    let works = server
        .mock("GET", "/works")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("filter".into(), orcid_filter(ORCID, &range())),
            Matcher::UrlEncoded("rows".into(), "100".into()),
            Matcher::UrlEncoded("sort".into(), "published".into()),
            Matcher::UrlEncoded("order".into(), "desc".into()),
        ]))
        .match_header("user-agent", Matcher::Regex(format!("mailto:{}", EMAIL)))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "ok",
                "message": {
                    "total-results": 1,
                    "items": [{
                        "DOI": "10.1/abc",
                        "URL": "https://doi.org/10.1/abc",
                        "title": ["Tracked author paper"],
                        "container-title": ["Cell"],
                        "author": [{"given": "Josiah", "family": "Carberry"}],
                        "issued": {"date-parts": [[2024, 1, 9]]}
                    }]
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let source = CrossRefSource::new(
        &crossref_config(&server.url()),
        Some(EMAIL),
        Arc::new(RateLimiter::unlimited()),
    )
    .unwrap();

    let query = SourceQuery::Orcid {
        orcid: format!("https://orcid.org/{}", ORCID),
        range: range(),
    };
    let hits = source.search(&query).await.unwrap();
    assert_eq!(hits.len(), 1);

    let Hit::Record(record) = &hits[0] else {
        panic!("CrossRef hits carry full records");
    };
    let paper = extract(record);
    assert_eq!(paper.title.as_str(), "Tracked author paper");
    assert_eq!(paper.authors.items(), ["Josiah Carberry"]);
    assert_eq!(paper.date, "2024/01/09");
    assert_eq!(paper.doi.as_deref(), Some("10.1/abc"));

    works.assert_async().await;
}

#[tokio::test]
async fn test_crossref_text_search() {
    let mut server = Server::new_async().await;
    let works = server
        .mock("GET", "/works")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "sleep spindles".into()),
            Matcher::UrlEncoded("filter".into(), date_filter(&range())),
            Matcher::UrlEncoded("rows".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"message": {"items": [
                {"DOI": "10.1/spindle", "title": ["Spindles in NREM sleep"]}
            ]}})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let source = CrossRefSource::new(
        &crossref_config(&server.url()),
        None,
        Arc::new(RateLimiter::unlimited()),
    )
    .unwrap();

    let query = SourceQuery::Text {
        query: " sleep spindles ".to_string(),
        range: range(),
    };
    assert!(source.supports(&query));
    let hits = source.search(&query).await.unwrap();
    assert_eq!(hits.len(), 1);
    let Hit::Record(record) = &hits[0] else {
        panic!("CrossRef hits carry full records");
    };
    assert_eq!(extract(record).title.as_str(), "Spindles in NREM sleep");

    works.assert_async().await;
}

#[tokio::test]
async fn test_crossref_work_by_doi() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/works/10.1%2Fabc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": {"DOI": "10.1/abc", "title": []}}).to_string())
        .create_async()
        .await;

    let source = CrossRefSource::new(
        &crossref_config(&server.url()),
        None,
        Arc::new(RateLimiter::unlimited()),
    )
    .unwrap();

    let record = source.fetch_details("10.1/abc").await.unwrap();
    assert!(matches!(record, RawRecord::CrossRef(_)));
    assert_eq!(extract(&record).title.as_str(), "No title available");
}

#[tokio::test]
async fn test_full_run_against_mock_servers() {
    let mut server = Server::new_async().await;

    let _esearch = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("db".into(), "pubmed".into()))
        .with_status(200)
        .with_body(esearch_body(&["1", "2", "3"]))
        .create_async()
        .await;
    let _first = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
        .with_status(200)
        .with_body(efetch_body("1", "First sleep paper"))
        .create_async()
        .await;
    let _second = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "2".into()))
        .with_status(404)
        .create_async()
        .await;
    let _third = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "3".into()))
        .with_status(200)
        .with_body(efetch_body("3", "Third sleep paper"))
        .create_async()
        .await;
    let _works = server
        .mock("GET", "/works")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"message": {"items": [
                {"DOI": "10.1/ABC", "title": ["One work"]},
                {"DOI": "10.1/abc", "title": ["Same work, different title"]},
                {"title": []}
            ]}})
            .to_string(),
        )
        .create_async()
        .await;

    let config = Config {
        pubmed: pubmed_config(&server.url()),
        crossref: crossref_config(&server.url()),
        engine: EngineConfig {
            pubmed_author_search: false,
        },
        ..Config::default()
    };
    let mut run = SearchRun::new(SearchMode::Both, range());

    let outcome = Aggregator::new(config)
        .execute(&mut run, &search_config())
        .await
        .unwrap();

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(outcome.keyword_frequency["sleep"], 3);
    assert_eq!(outcome.keyword_papers.len(), 2);
    assert!(outcome
        .keyword_papers
        .iter()
        .all(|p| p.source == Provenance::Keyword));

    let author_titles: Vec<&str> = outcome
        .author_papers
        .iter()
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(author_titles, ["One work", "No title available"]);
    assert!(outcome
        .author_papers
        .iter()
        .all(|p| p.source == Provenance::CrossRef));
    assert_eq!(run.keyword_count, 2);
    assert_eq!(run.author_count, 2);
}

#[tokio::test]
async fn test_topics_without_journals_still_search_pubmed() {
    let mut server = Server::new_async().await;
    let term = keyword_query("sleep", &[], &range());
    assert!(!term.contains("[Journal]"));

    let esearch = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("term".into(), term))
        .with_status(200)
        .with_body(esearch_body(&["1"]))
        .expect(1)
        .create_async()
        .await;
    let _efetch = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
        .with_status(200)
        .with_body(efetch_body("1", "Sleep without journals"))
        .create_async()
        .await;

    let search = SearchConfig {
        journals: Vec::new(),
        orcids: Vec::new(),
        ..search_config()
    };
    search.validate().unwrap();
    let config = Config {
        pubmed: pubmed_config(&server.url()),
        crossref: crossref_config(&server.url()),
        ..Config::default()
    };

    let outcome = Aggregator::new(config)
        .run(&search, &range(), SearchMode::Keywords)
        .await
        .unwrap();

    esearch.assert_async().await;
    assert_eq!(outcome.keyword_frequency["sleep"], 1);
    assert_eq!(outcome.keyword_papers.len(), 1);
    assert_eq!(outcome.keyword_papers[0].title.as_str(), "Sleep without journals");
}

#[tokio::test]
async fn test_empty_configuration_returns_nothing() {
    let search = SearchConfig {
        topics: Vec::new(),
        orcids: Vec::new(),
        ..search_config()
    };
    let config = Config {
        pubmed: pubmed_config("http://127.0.0.1:9"),
        crossref: crossref_config("http://127.0.0.1:9"),
        ..Config::default()
    };

    let outcome = Aggregator::new(config)
        .run(&search, &range(), SearchMode::Both)
        .await
        .unwrap();

    assert!(outcome.keyword_papers.is_empty());
    assert!(outcome.author_papers.is_empty());
    assert!(outcome.keyword_frequency.is_empty());
}

#[test]
fn test_efetch_document_serializes_with_sentinels() {
    let document = xml_to_value(&efetch_body("9", "")).unwrap();
    let article = &document["PubmedArticleSet"]["PubmedArticle"];
    let paper = extract(&RawRecord::PubMed(article.clone())).tag(Provenance::PubmedAuthor);

    let value = serde_json::to_value(&paper).unwrap();
    assert_eq!(value["title"], Sentinel::NoTitle.as_str());
    assert_eq!(value["source"], "pubmed_author");
    assert_eq!(value["authors"], json!(["Jane Doe"]));
    assert_eq!(value["abstract"], "Sleep consolidates memory traces.");
}

#[test]
fn test_pubmed_format_is_identity() {
    for date in ["2024/01/31", "1999/12/01", "2000/02/29"] {
        assert_eq!(format_for_api(date, "pubmed").unwrap(), date);
    }
    assert_eq!(format_for_api("2024/01/31", "crossref").unwrap(), "2024-01-31");
    assert!(format_for_api("2024/01/31", "scopus").is_err());
}

#[test]
fn test_frequency_is_monotonic() {
    for unit in ["day", "weeks", "Month", "years"] {
        let mut previous = None;
        for n in 1..=5 {
            let delta = parse_frequency(&format!("{} {}", n, unit)).unwrap();
            if let Some(prev) = previous {
                assert!(delta > prev, "{} {} should exceed the previous window", n, unit);
            }
            previous = Some(delta);

            let window = DateRange::from_frequency(&format!("{} {}", n, unit), None).unwrap();
            assert!(window.start() < window.end());
        }
    }
}

#[test]
fn test_title_dedup_reaches_fixed_point() {
    let papers: Vec<_> = ["A", "a ", "B", "", "b", ""]
        .iter()
        .map(|title| {
            let record = RawRecord::CrossRef(json!({"title": [title]}));
            extract(&record).tag(Provenance::CrossRef)
        })
        .collect();

    let once = remove_duplicate_titles(papers);
    assert_eq!(once.len(), 4);
    assert_eq!(remove_duplicate_titles(once.clone()), once);
}

#[test]
fn test_config_file_with_environment_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("litwatch.toml");
    std::fs::write(
        &path,
        r#"
[search]
email = "file@example.org"
topics = ["sleep"]
journals = ["Neuron"]
authors = ["0000-0002-1825-0097 # Josiah Carberry"]

[crossref]
rows = 25
"#,
    )
    .unwrap();

    std::env::set_var("LITWATCH_SEARCH__EMAIL", "env@example.org");
    let loaded = load_config(&path);
    std::env::remove_var("LITWATCH_SEARCH__EMAIL");

    let config = loaded.unwrap();
    assert_eq!(config.search.email, "env@example.org");
    assert_eq!(config.crossref.rows, 25);

    let search = config.search_config().unwrap();
    assert_eq!(search.orcids, [ORCID]);
    assert_eq!(
        search.named_authors[0].name.as_deref(),
        Some("Josiah Carberry")
    );
}
