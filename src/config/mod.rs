//! Configuration management.
//!
//! The configuration file is TOML, overlaid by `LITWATCH_`-prefixed
//! environment variables (`__` separates nested keys, so
//! `LITWATCH_SEARCH__EMAIL` overrides `[search] email`).
//!
//! ```toml
//! [search]
//! email = "you@example.org"
//! lookup_frequency = "1 week"
//! topics = ["sleep spindles"]
//! journals = ["Neuron", "Nature Neuroscience"]
//! authors = [
//!     "0000-0002-1825-0097 # Josiah Carberry",
//!     { orcid = "0000-0001-5109-3700", name = "Jane Doe" },
//! ]
//!
//! [pubmed]
//! api_key = "optional-ncbi-key"
//! request_delay_ms = 1000
//!
//! [pubmed.retry]
//! backoff_ms = 20000
//!
//! [crossref]
//! rows = 100
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

mod search;

pub use search::{
    is_valid_orcid, parse_author_entry, AuthorEntry, NamedAuthor, SearchConfig, SearchSection,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "LITWATCH";

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "litwatch.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// What to search for
    #[serde(default)]
    pub search: SearchSection,

    /// PubMed E-utilities client settings
    #[serde(default)]
    pub pubmed: PubMedConfig,

    /// CrossRef REST client settings
    #[serde(default)]
    pub crossref: CrossRefConfig,

    /// Aggregation behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// PubMed client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedConfig {
    /// E-utilities base URL (without the trailing `/esearch.fcgi`)
    #[serde(default = "default_pubmed_url")]
    pub base_url: String,

    /// Tool name reported to NCBI
    #[serde(default = "default_tool")]
    pub tool: String,

    /// NCBI API key, raises the upstream rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum number of IDs returned per search
    #[serde(default = "default_retmax")]
    pub retmax: u32,

    /// Fixed delay before every detail fetch
    #[serde(default = "default_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_pubmed_retry")]
    pub retry: RetrySettings,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_pubmed_url(),
            tool: default_tool(),
            api_key: None,
            retmax: default_retmax(),
            request_delay_ms: default_delay_ms(),
            retry: default_pubmed_retry(),
        }
    }
}

/// CrossRef client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRefConfig {
    #[serde(default = "default_crossref_url")]
    pub base_url: String,

    /// Works per ORCID query (capped at 1000 by the API)
    #[serde(default = "default_rows")]
    pub rows: u32,

    #[serde(default = "default_sort")]
    pub sort: String,

    #[serde(default = "default_order")]
    pub order: String,

    /// Minimum interval between ORCID queries
    #[serde(default = "default_delay_ms")]
    pub query_delay_ms: u64,

    #[serde(default = "default_crossref_retry")]
    pub retry: RetrySettings,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: default_crossref_url(),
            rows: default_rows(),
            sort: default_sort(),
            order: default_order(),
            query_delay_ms: default_delay_ms(),
            retry: default_crossref_retry(),
        }
    }
}

/// Retry policy for transient (HTTP 429/500) upstream failures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first; unset means retry forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// 1.0 keeps the backoff flat
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// Aggregation behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Also search PubMed by the display name of named authors
    #[serde(default = "default_true")]
    pub pubmed_author_search: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pubmed_author_search: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for human-readable lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

fn default_pubmed_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_crossref_url() -> String {
    "https://api.crossref.org".to_string()
}

fn default_tool() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_retmax() -> u32 {
    1000
}

fn default_rows() -> u32 {
    100
}

fn default_sort() -> String {
    "published".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_backoff_ms() -> u64 {
    20_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_pubmed_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: None,
        backoff_ms: default_backoff_ms(),
        backoff_multiplier: default_backoff_multiplier(),
        max_backoff_ms: default_max_backoff_ms(),
    }
}

fn default_crossref_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: Some(1),
        ..default_pubmed_retry()
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A commented starting point for `litwatch.toml`
const SAMPLE_CONFIG: &str = r##"# litwatch configuration

[search]
# Contact email, sent to NCBI and CrossRef (required)
email = "you@example.org"
# How far back each run looks: "<n> day(s)|week(s)|month(s)|year(s)"
lookup_frequency = "1 week"
topics = ["sleep spindles"]
journals = ["Neuron", "Nature Neuroscience"]
# ORCIDs, optionally followed by "# Display Name" to also search PubMed by name
authors = ["0000-0002-1825-0097 # Josiah Carberry"]

[pubmed]
# api_key = "your-ncbi-api-key"
retmax = 1000
request_delay_ms = 1000

[pubmed.retry]
# Unset max_attempts retries throttled fetches forever
backoff_ms = 20000
backoff_multiplier = 1.0

[crossref]
rows = 100
query_delay_ms = 1000

[crossref.retry]
max_attempts = 1

[engine]
pubmed_author_search = true

[logging]
level = "info"
# format = "json"
"##;

impl Config {
    /// Commented sample configuration file contents
    pub fn sample() -> &'static str {
        SAMPLE_CONFIG
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Write the sample configuration, refusing to overwrite an existing file
    pub fn write_sample(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::Io(format!(
                "{} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        std::fs::write(path, SAMPLE_CONFIG).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Resolve and validate the `[search]` section
    pub fn search_config(&self) -> Result<SearchConfig, ConfigError> {
        let search = self.search.resolve()?;
        search.validate()?;
        Ok(search)
    }
}

/// Load configuration from a file, overlaid by environment variables
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Find the configuration file: `./litwatch.toml`, then the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    let user = default_config_path()?;
    user.is_file().then_some(user)
}

/// `<user config dir>/litwatch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("config.toml"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
