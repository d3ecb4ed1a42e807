//! Lifecycle record for a single search run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::search::{DateRange, SearchMode, SearchOutcome};

/// Status of a search run.
///
/// `Pending -> Running -> {Completed | Failed}`; both end states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}

/// A search run and its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRun {
    pub mode: SearchMode,
    pub range: DateRange,
    status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub keyword_count: usize,
    pub author_count: usize,
}

impl SearchRun {
    pub fn new(mode: SearchMode, range: DateRange) -> Self {
        Self {
            mode,
            range,
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
            keyword_count: 0,
            author_count: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), RunError> {
        if self.status != from {
            return Err(RunError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Pending -> Running`
    pub fn start(&mut self) -> Result<(), RunError> {
        self.transition(RunStatus::Pending, RunStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Completed`, recording per-group counts
    pub fn complete(&mut self, outcome: &SearchOutcome) -> Result<(), RunError> {
        self.transition(RunStatus::Running, RunStatus::Completed)?;
        self.keyword_count = outcome.keyword_papers.len();
        self.author_count = outcome.author_papers.len();
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Failed`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), RunError> {
        self.transition(RunStatus::Running, RunStatus::Failed)?;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
