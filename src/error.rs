//! Engine-level errors.

use crate::models::RunError;
use crate::sources::SourceError;
use crate::utils::date::DateError;

/// Errors that can end a search run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The run cannot start (missing contact email, unusable client)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
