//! Mock source for testing purposes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::sources::{Hit, RawRecord, Source, SourceCapabilities, SourceError, SourceQuery};

#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    Status(u16),
    Network,
}

impl<T: Clone> Scripted<T> {
    fn play(&self) -> Result<T, SourceError> {
        match self {
            Scripted::Ok(value) => Ok(value.clone()),
            Scripted::Status(status) => Err(SourceError::from_status(*status, "scripted failure")),
            Scripted::Network => Err(SourceError::Network("scripted failure".to_string())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scriptable source that records every call it receives.
///
/// Searches are answered by query label (keyword, author name or ORCID);
/// unknown labels return no hits. Detail fetches are answered by ID;
/// unknown IDs fail with HTTP 404.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    capabilities: SourceCapabilities,
    searches: Mutex<HashMap<String, Scripted<Vec<Hit>>>>,
    records: Mutex<HashMap<String, Scripted<RawRecord>>>,
    search_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source supporting every query kind.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: SourceCapabilities::all(),
            searches: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            search_calls: Mutex::new(Vec::new()),
            fetch_calls: Mutex::new(Vec::new()),
        }
    }

    /// Restrict the advertised capabilities
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Answer searches for `label` with `hits`
    pub fn with_hits(self, label: impl Into<String>, hits: Vec<Hit>) -> Self {
        lock(&self.searches).insert(label.into(), Scripted::Ok(hits));
        self
    }

    /// Answer searches for `label` with PMID-style ID hits
    pub fn with_ids<I, S>(self, label: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hits = ids.into_iter().map(|id| Hit::Id(id.into())).collect();
        self.with_hits(label, hits)
    }

    /// Fail searches for `label` with a transport error
    pub fn with_search_failure(self, label: impl Into<String>) -> Self {
        lock(&self.searches).insert(label.into(), Scripted::Network);
        self
    }

    /// Answer detail fetches for `id` with `record`
    pub fn with_record(self, id: impl Into<String>, record: RawRecord) -> Self {
        lock(&self.records).insert(id.into(), Scripted::Ok(record));
        self
    }

    /// Fail detail fetches for `id` with an HTTP status
    pub fn with_fetch_status(self, id: impl Into<String>, status: u16) -> Self {
        lock(&self.records).insert(id.into(), Scripted::Status(status));
        self
    }

    /// Labels of every search received, in order
    pub fn search_calls(&self) -> Vec<String> {
        lock(&self.search_calls).clone()
    }

    /// IDs of every detail fetch received, in order
    pub fn fetch_calls(&self) -> Vec<String> {
        lock(&self.fetch_calls).clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search(&self, query: &SourceQuery) -> Result<Vec<Hit>, SourceError> {
        if !self.supports(query) {
            return Err(SourceError::NotImplemented);
        }
        let label = query.label().to_string();
        lock(&self.search_calls).push(label.clone());

        match lock(&self.searches).get(&label) {
            Some(scripted) => scripted.play(),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_details(&self, id: &str) -> Result<RawRecord, SourceError> {
        lock(&self.fetch_calls).push(id.to_string());

        match lock(&self.records).get(id) {
            Some(scripted) => scripted.play(),
            None => Err(SourceError::from_status(404, format!("Unknown id {}", id))),
        }
    }
}
