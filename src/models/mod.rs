//! Core data models for papers, searches, and search runs.

mod paper;
mod run;
mod search;

pub use paper::{
    clean_text, doi_from_link, ExtractedPaper, Field, Paper, PaperBuilder, Provenance, Sentinel,
    SentinelValue,
};
pub use run::{RunError, RunStatus, SearchRun};
pub use search::{DateRange, SearchMode, SearchOutcome};
