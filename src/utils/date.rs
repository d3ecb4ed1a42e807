//! Date parsing and formatting across the upstream APIs.
//!
//! Every date that leaves this module is a `YYYY/MM/DD` string. Upstream
//! records come in three shapes:
//!
//! - CrossRef `date-parts`: `{"date-parts": [[2024, 1, 15]]}` (month and day optional)
//!   or an ISO-hyphenated string such as `"2024-01-15"`
//! - PubMed year/month/day mappings: `{"Year": "2024", "Month": "Jan", "Day": "5"}`,
//!   or a list holding one such mapping
//! - anything else, from which only a four-digit year is salvaged
//!
//! Parsing never fails: partial upstream data is common and must not abort a
//! batch, so unparsable input yields a diagnostic string instead of an error.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

/// Canonical date format used throughout the engine
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// End date used for open-ended search windows
pub const FAR_FUTURE_DATE: &str = "3000/01/01";

/// Returned by [`parse_api_date`] when the raw value is empty
pub const NO_DATE: &str = "No date available";

/// Errors raised by the date utilities
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("Invalid lookup frequency '{0}': expected '<n> <days|weeks|months|years>'")]
    InvalidFrequency(String),

    #[error("Unsupported API format: {0}")]
    UnsupportedApiFormat(String),

    #[error("Invalid date format '{0}'. Expected YYYY/MM/DD")]
    InvalidDate(String),

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },
}

/// Which upstream shape a raw date value should be read as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    CrossRef,
    PubMed,
    Unknown,
}

/// Target format for outgoing query dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    /// `YYYY-MM-DD`
    CrossRef,
    /// `YYYY/MM/DD`
    PubMed,
}

impl ApiFormat {
    /// Convert a canonical `YYYY/MM/DD` date into this API's format
    pub fn format(self, date: &str) -> String {
        match self {
            ApiFormat::CrossRef => date.replace('/', "-"),
            ApiFormat::PubMed => date.to_string(),
        }
    }
}

impl FromStr for ApiFormat {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crossref" => Ok(ApiFormat::CrossRef),
            "pubmed" => Ok(ApiFormat::PubMed),
            other => Err(DateError::UnsupportedApiFormat(other.to_string())),
        }
    }
}

/// Convert a `YYYY/MM/DD` date for the named API (`"crossref"` or `"pubmed"`)
pub fn format_for_api(date: &str, target: &str) -> Result<String, DateError> {
    Ok(target.parse::<ApiFormat>()?.format(date))
}

/// Validate a `YYYY/MM/DD` date string
pub fn validate_date(date: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| DateError::InvalidDate(date.to_string()))
}

fn frequency_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+)\s*(\w+)").ok())
        .as_ref()
}

fn year_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{4}").ok()).as_ref()
}

/// Parse a lookup frequency such as `"1 week"`, `"7 days"` or `"2 months"`.
///
/// Units are prefix-matched and case-insensitive. Months count as 30 days
/// and years as 365 days; this is an approximation, not calendar arithmetic.
pub fn parse_frequency(text: &str) -> Result<Duration, DateError> {
    let normalized = text.trim().to_lowercase();
    let invalid = || DateError::InvalidFrequency(text.to_string());

    let captures = frequency_pattern()
        .and_then(|re| re.captures(&normalized))
        .ok_or_else(invalid)?;
    let number: i64 = captures[1].parse().map_err(|_| invalid())?;
    let unit = &captures[2];

    let delta = if unit.starts_with("day") {
        Duration::try_days(number)
    } else if unit.starts_with("week") {
        Duration::try_weeks(number)
    } else if unit.starts_with("month") {
        number.checked_mul(30).and_then(Duration::try_days)
    } else if unit.starts_with("year") {
        number.checked_mul(365).and_then(Duration::try_days)
    } else {
        None
    };

    delta.ok_or_else(invalid)
}

/// Compute `(now - frequency, end_date)` as `YYYY/MM/DD` strings.
///
/// `end_date` defaults to [`FAR_FUTURE_DATE`] for an open-ended window.
pub fn date_range(frequency: &str, end_date: Option<&str>) -> Result<(String, String), DateError> {
    date_range_at(frequency, end_date, Local::now().naive_local())
}

/// [`date_range`] relative to an explicit clock reading
pub fn date_range_at(
    frequency: &str,
    end_date: Option<&str>,
    now: NaiveDateTime,
) -> Result<(String, String), DateError> {
    let delta = parse_frequency(frequency)?;
    let start = now
        .checked_sub_signed(delta)
        .ok_or_else(|| DateError::InvalidFrequency(frequency.to_string()))?;

    Ok((
        start.format(DATE_FORMAT).to_string(),
        end_date.unwrap_or(FAR_FUTURE_DATE).to_string(),
    ))
}

/// Scheduling presets used by the web scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyPreset {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl FrequencyPreset {
    /// Parse a preset name; unknown names fall back to weekly
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "daily" => FrequencyPreset::Daily,
            "biweekly" => FrequencyPreset::Biweekly,
            "monthly" => FrequencyPreset::Monthly,
            _ => FrequencyPreset::Weekly,
        }
    }

    fn delta(self) -> Duration {
        match self {
            FrequencyPreset::Daily => Duration::days(1),
            FrequencyPreset::Weekly => Duration::weeks(1),
            FrequencyPreset::Biweekly => Duration::weeks(2),
            FrequencyPreset::Monthly => Duration::days(30),
        }
    }

    /// `(today - delta, today)` as `YYYY/MM/DD` strings
    pub fn range_ending(self, today: NaiveDate) -> (String, String) {
        let start = today - self.delta();
        (
            start.format(DATE_FORMAT).to_string(),
            today.format(DATE_FORMAT).to_string(),
        )
    }
}

/// Normalize an upstream date value into `YYYY/MM/DD`.
///
/// Missing month/day are padded with `01`. Empty input returns
/// [`NO_DATE`]; input with no recognizable year returns
/// `"Invalid date format: <raw>"`.
pub fn parse_api_date(raw: &Value, source: DateSource) -> String {
    if is_empty(raw) {
        return NO_DATE.to_string();
    }

    let structured = match source {
        DateSource::CrossRef => parse_crossref(raw),
        DateSource::PubMed => parse_pubmed(raw),
        DateSource::Unknown => None,
    };
    if let Some(date) = structured {
        return date;
    }

    let rendered = render(raw);
    match year_pattern().and_then(|re| re.find(&rendered)) {
        Some(year) => format!("{}/01/01", year.as_str()),
        None => format!("Invalid date format: {}", rendered),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_crossref(raw: &Value) -> Option<String> {
    match raw {
        Value::Object(map) => {
            let parts = map.get("date-parts")?.get(0)?.as_array()?;
            let numbers = parts
                .iter()
                .take(3)
                .map(as_number)
                .collect::<Option<Vec<u32>>>()?;
            compose(&numbers)
        }
        Value::String(s) if s.contains('-') => {
            let date_part = s.split('T').next().unwrap_or(s);
            let numbers = date_part
                .split('-')
                .take(3)
                .map(|p| p.trim().parse::<u32>().ok())
                .collect::<Option<Vec<u32>>>()?;
            compose(&numbers)
        }
        _ => None,
    }
}

fn parse_pubmed(raw: &Value) -> Option<String> {
    match raw {
        Value::Object(map) => {
            let year = map.get("Year").and_then(text_of)?;
            let year = year.trim();
            if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let month = map
                .get("Month")
                .and_then(text_of)
                .map(|m| month_number(&m))
                .unwrap_or_else(|| Some("01".to_string()))?;
            let day = map
                .get("Day")
                .and_then(text_of)
                .map(|d| zero_pad(&d))
                .unwrap_or_else(|| Some("01".to_string()))?;
            Some(format!("{}/{}/{}", year, month, day))
        }
        Value::Array(items) => items.first().and_then(parse_pubmed),
        _ => None,
    }
}

fn compose(numbers: &[u32]) -> Option<String> {
    match numbers {
        [year, month, day, ..] => Some(format!("{:04}/{:02}/{:02}", year, month, day)),
        [year, month] => Some(format!("{:04}/{:02}/01", year, month)),
        [year] => Some(format!("{:04}/01/01", year)),
        [] => None,
    }
}

fn as_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$text").and_then(text_of),
        _ => None,
    }
}

fn zero_pad(part: &str) -> Option<String> {
    let part = part.trim();
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>2}", part))
}

fn month_number(month: &str) -> Option<String> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];

    if let Some(padded) = zero_pad(month) {
        return Some(padded);
    }
    let prefix: String = month.trim().to_lowercase().chars().take(3).collect();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| format!("{:02}", i + 1))
}
