//! Utility modules supporting the aggregation engine.
//!
//! - [`date`]: upstream date normalization, lookup frequencies and date windows
//! - [`dedup`]: first-wins deduplication by title or DOI
//! - [`filter`]: journal/keyword/date filters, date ordering and paper checks
//! - [`stats`]: source breakdown and author/journal/keyword frequencies
//! - [`xml`]: XML to `serde_json::Value` conversion for PubMed records
//! - [`HttpClient`] and [`RateLimiter`]: shared HTTP client and per-host pacing
//! - [`RetryConfig`] and [`with_retry`]: retry of transient upstream failures
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use litwatch::sources::SourceError;
//! use litwatch::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::unbounded_fixed(Duration::from_secs(20));
//! let data = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

pub mod date;
pub mod dedup;
pub mod filter;
mod http;
mod retry;
pub mod stats;
pub mod xml;

pub use dedup::{remove_duplicate_dois, remove_duplicate_titles};
pub use http::{base_url, HttpClient, RateLimiter};
pub use retry::{with_retry, RetryConfig};
