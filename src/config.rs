//! Centralized configuration management for report-extractor
//!
//! Runtime settings come from environment variables. Job parameters come from
//! the `config.json` file in the data directory and are validated once into an
//! immutable [`Job`].

use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ReportError, Result};
use crate::fiscal::{DATE_MASK, DEFAULT_FISCAL_START_MONTH};
use crate::models::{ReportKind, FINANCE_REGIONS};

pub const CONFIG_FILE: &str = "config.json";
pub const TABLES_OUT_DIR: &str = "out/tables";
pub const DEFAULT_BASE_URL: &str = "https://reportingitc-reporter.apple.com/reportservice";

/// Days before today used as the start date when none is configured
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the report service
    pub base_url: String,
    /// Maximum number of report units processed at once
    pub concurrency: usize,
    /// Longest sales interval accepted, in days
    pub max_interval_days: usize,
    /// HTTP client configuration
    pub http: HttpConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: "report-extractor/0.1.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 8,
            max_interval_days: 365,
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let base_url = std::env::var("REPORT_EXTRACTOR_BASE_URL")
            .unwrap_or(defaults.base_url);

        let http = HttpConfig {
            timeout_seconds: parse_env_var("REPORT_EXTRACTOR_HTTP_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.timeout_seconds),
            user_agent: std::env::var("REPORT_EXTRACTOR_USER_AGENT")
                .unwrap_or(defaults.http.user_agent),
        };

        let config = Config {
            base_url,
            concurrency: parse_env_var("REPORT_EXTRACTOR_CONCURRENCY")?
                .unwrap_or(defaults.concurrency),
            max_interval_days: parse_env_var("REPORT_EXTRACTOR_MAX_INTERVAL_DAYS")?
                .unwrap_or(defaults.max_interval_days),
            http,
        };
        config.validate()?;

        Ok(config)
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ReportError::validation("Concurrency must be at least 1"));
        }
        if self.http.timeout_seconds == 0 {
            return Err(ReportError::validation("HTTP timeout must be at least 1 second"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ReportError::validation("Report service base URL is empty"));
        }
        Ok(())
    }
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(var_name) {
        Ok(val) => val.parse().map(Some).map_err(|e| {
            ReportError::validation(format!(
                "Failed to parse environment variable {} = '{}': {}",
                var_name, val, e
            ))
        }),
        Err(_) => Ok(None),
    }
}

/// Report service account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

/// Validated job parameters for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub credentials: Credentials,
    pub kind: ReportKind,
    pub vendors: Vec<String>,
    pub regions: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub primary_keys: Vec<String>,
    pub fiscal_start_month: u32,
    pub output_file: String,
}

impl Job {
    /// Read `config.json` from the data directory and validate it against `today`
    pub fn load(data_dir: &Path, today: NaiveDate) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Err(ReportError::validation(format!(
                "No configuration specified! Missing {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_json_str(&content, today)
    }

    pub fn from_json_str(content: &str, today: NaiveDate) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| ReportError::validation(format!("Malformed configuration file: {}", e)))?;
        file.parameters.validate(today)
    }

    pub fn tables_out_dir(data_dir: &Path) -> PathBuf {
        data_dir.join(TABLES_OUT_DIR)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    parameters: RawParameters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameters {
    #[serde(rename = "#username")]
    username: Option<String>,
    #[serde(rename = "#password")]
    password: Option<String>,
    report_type: Option<String>,
    vendors: Option<serde_json::Value>,
    regions: Option<Vec<String>>,
    start_date: Option<String>,
    end_date: Option<String>,
    primary_keys: Option<Vec<String>>,
    fiscal_start_month: Option<u32>,
    output_file: Option<String>,
}

impl RawParameters {
    fn validate(self, today: NaiveDate) -> Result<Job> {
        let user_id = required(self.username, "#username")?;
        let password = required(self.password, "#password")?;
        let kind: ReportKind = required(self.report_type, "reportType")?.parse()?;
        let vendors = parse_vendors(self.vendors)?;

        let regions = match self.regions {
            Some(regions) if regions.is_empty() => {
                return Err(ReportError::validation("Empty array of regions!"));
            }
            Some(regions) => regions,
            None => FINANCE_REGIONS.iter().map(|r| r.to_string()).collect(),
        };

        let maximal_date = today - ChronoDuration::days(1);
        let default_start = today - ChronoDuration::days(DEFAULT_LOOKBACK_DAYS);

        let start_date = match non_empty(self.start_date) {
            Some(value) => parse_date(&value, "startDate")?,
            None => default_start,
        };
        let end_date = match non_empty(self.end_date) {
            Some(value) => parse_date(&value, "endDate")?,
            None => maximal_date,
        };

        if end_date <= start_date {
            return Err(ReportError::validation(format!(
                "Parameter endDate {} is older than or equal to startDate {}",
                end_date.format(DATE_MASK),
                start_date.format(DATE_MASK)
            )));
        }
        if end_date > maximal_date {
            return Err(ReportError::validation(format!(
                "Parameter endDate {} is bigger than maximal allowed date value {}",
                end_date.format(DATE_MASK),
                maximal_date.format(DATE_MASK)
            )));
        }

        let fiscal_start_month = self.fiscal_start_month.unwrap_or(DEFAULT_FISCAL_START_MONTH);
        if !(1..=12).contains(&fiscal_start_month) {
            return Err(ReportError::validation(format!(
                "Parameter fiscalStartMonth must be between 1 and 12, got {}",
                fiscal_start_month
            )));
        }

        let output_file = non_empty(self.output_file)
            .unwrap_or_else(|| format!("{}.csv", kind.as_str()));
        if output_file.contains('/') || output_file.contains('\\') {
            return Err(ReportError::validation(format!(
                "Parameter outputFile must be a plain file name, got {}",
                output_file
            )));
        }

        Ok(Job {
            credentials: Credentials { user_id, password },
            kind,
            vendors,
            regions,
            start_date,
            end_date,
            primary_keys: self.primary_keys.unwrap_or_default(),
            fiscal_start_month,
            output_file,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| {
        ReportError::validation(format!(
            "Parameter {} is not defined! Please check out the documentation for more information.",
            name
        ))
    })
}

fn parse_vendors(value: Option<serde_json::Value>) -> Result<Vec<String>> {
    let value = value.ok_or_else(|| ReportError::validation("Parameter vendors is not defined!"))?;

    let items = value.as_array().ok_or_else(|| {
        ReportError::validation(
            "Parameter vendors must be an array including vendors (even when there is just one)!",
        )
    })?;

    if items.is_empty() {
        return Err(ReportError::validation("Empty array of vendors!"));
    }

    items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(ReportError::validation(format!("Invalid vendor id: {}", other))),
        })
        .collect()
}

/// Parse a `YYYYMMDD` date, rejecting anything that does not follow the mask exactly.
pub fn parse_date(value: &str, name: &str) -> Result<NaiveDate> {
    let value = value.trim();
    let invalid = || {
        ReportError::validation(format!(
            "Invalid date mask set for parameter '{}': {}. Please set the value to YYYYMMDD",
            name, value
        ))
    };

    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_MASK).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
    }

    fn job(parameters: serde_json::Value) -> Result<Job> {
        Job::from_json_str(&serde_json::json!({ "parameters": parameters }).to_string(), today())
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "#username": "user",
            "#password": "secret",
            "reportType": "Sales",
            "vendors": ["123", 456],
            "startDate": "20200101",
            "endDate": "20200102"
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.http.timeout_seconds, 60);
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_validation_rejects_zero_concurrency() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_job() {
        let job = job(base()).unwrap();
        assert_eq!(job.kind, ReportKind::Sales);
        assert_eq!(job.vendors, vec!["123", "456"]);
        assert_eq!(job.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(job.output_file, "sales.csv");
        assert_eq!(job.fiscal_start_month, DEFAULT_FISCAL_START_MONTH);
        assert_eq!(job.regions.len(), FINANCE_REGIONS.len());
        assert!(job.primary_keys.is_empty());
    }

    #[test]
    fn test_missing_credentials() {
        let mut params = base();
        params.as_object_mut().unwrap().remove("#password");
        let err = job(params).unwrap_err();
        assert!(err.to_string().contains("#password"));
    }

    #[test]
    fn test_vendors_must_be_non_empty_array() {
        let mut params = base();
        params["vendors"] = serde_json::json!("123");
        assert!(job(params.clone()).unwrap_err().to_string().contains("array"));

        params["vendors"] = serde_json::json!([]);
        assert!(job(params).unwrap_err().to_string().contains("Empty"));
    }

    #[test]
    fn test_rejects_unknown_report_type() {
        let mut params = base();
        params["reportType"] = serde_json::json!("earnings");
        assert!(matches!(job(params), Err(ReportError::Validation(_))));
    }

    #[test]
    fn test_date_rules() {
        let mut params = base();
        params["startDate"] = serde_json::json!("2020-01-01");
        assert!(job(params).is_err());

        let mut params = base();
        params["endDate"] = serde_json::json!("20200101");
        assert!(job(params).is_err(), "end equal to start");

        let mut params = base();
        params["endDate"] = serde_json::json!("20200601");
        assert!(job(params).is_err(), "end after yesterday");

        let mut params = base();
        params["endDate"] = serde_json::json!("20200531");
        assert!(job(params).is_ok());
    }

    #[test]
    fn test_default_date_window() {
        let mut params = base();
        let map = params.as_object_mut().unwrap();
        map.remove("startDate");
        map.insert("endDate".to_string(), serde_json::json!(""));

        let job = job(params).unwrap();
        assert_eq!(job.start_date, NaiveDate::from_ymd_opt(2020, 5, 2).unwrap());
        assert_eq!(job.end_date, NaiveDate::from_ymd_opt(2020, 5, 31).unwrap());
    }

    #[test]
    fn test_credentials_are_redacted_in_debug() {
        let job = job(base()).unwrap();
        let debug = format!("{:?}", job);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Job::load(dir.path(), today()).unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));
    }
}
