//! # litwatch
//!
//! Watches PubMed and CrossRef for new publications matching a set of
//! keywords, journals and tracked authors, and normalizes the results into
//! one canonical paper shape.
//!
//! ## Architecture
//!
//! - [`models`]: canonical papers, search modes, date ranges and run records
//! - [`sources`]: the [`Source`] trait with PubMed and CrossRef clients
//! - [`extract`]: projection of raw upstream records into canonical papers
//! - [`aggregator`]: runs a search across sources, tags and deduplicates results
//! - [`utils`]: date normalization, deduplication, statistics, HTTP plumbing
//! - [`config`]: configuration file and search settings
//!
//! ```rust,no_run
//! use litwatch::config::load_config;
//! use litwatch::models::{DateRange, SearchMode};
//! use litwatch::Aggregator;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = load_config("litwatch.toml".as_ref())?;
//! let search = config.search_config()?;
//! let range = DateRange::from_frequency(&search.lookup_frequency, None)?;
//!
//! let outcome = Aggregator::new(config)
//!     .run(&search, &range, SearchMode::Both)
//!     .await?;
//! println!("{} papers", outcome.total());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{Aggregator, SearchPlan};
pub use error::{Error, Result};
pub use models::{Paper, SearchOutcome};
pub use sources::{Source, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
