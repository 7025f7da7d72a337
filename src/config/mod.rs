//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::DateMergePolicy;

mod file_config;

pub use file_config::{default_config_path, find_config_file, ConfigFileError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API keys for databases that require one
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Search run defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Backend selection
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Elsevier API key used for Scopus
    #[serde(default = "scopus_key_from_env", skip_serializing_if = "Option::is_none")]
    pub scopus: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            scopus: scopus_key_from_env(),
        }
    }
}

fn scopus_key_from_env() -> Option<String> {
    std::env::var("SCOPUS_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Requests per second across all backends, 0 disables the limit
    #[serde(default = "default_rps")]
    pub requests_per_second: f32,

    /// User agent sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            requests_per_second: default_rps(),
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_rps() -> f32 {
    2.0
}

/// Search run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Pages fetched per source before the safety bound stops it
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Entries requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Wall-clock budget for a whole run, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<u64>,

    /// How conflicting publication dates are reconciled
    #[serde(default)]
    pub date_merge_policy: DateMergePolicy,

    /// Search all sources at the same time
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// Fetch paper landing pages for missing details
    #[serde(default = "default_true")]
    pub fetch_paper_details: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            time_budget_secs: None,
            date_merge_policy: DateMergePolicy::default(),
            concurrent: true,
            fetch_paper_details: true,
        }
    }
}

fn default_max_pages() -> usize {
    crate::sources::DEFAULT_MAX_PAGES
}

fn default_page_size() -> usize {
    25
}

fn default_true() -> bool {
    true
}

/// Sources configuration, comma-separated backend ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_sources: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_sources: Option<String>,
}

impl SourcesConfig {
    /// Explicitly enabled backend ids, `None` when every backend is allowed
    pub fn enabled(&self) -> Option<Vec<String>> {
        self.enabled_sources
            .as_deref()
            .map(split_list)
            .filter(|list| !list.is_empty())
    }

    /// Backend ids that are never used
    pub fn disabled(&self) -> Vec<String> {
        self.disabled_sources
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty" (default) or "json"
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
            .is_some_and(|format| format.eq_ignore_ascii_case("json"))
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Load configuration from a file and `FINDPAPERS_*` environment variables.
///
/// Without an explicit path the first file found by [`find_config_file`]
/// is used, if any. Nested keys use a double underscore, e.g.
/// `FINDPAPERS_SEARCH__MAX_PAGES=20`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ::config::ConfigError> {
    let mut builder = ::config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(::config::File::from(path));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using configuration file {}", found.display());
                builder = builder.add_source(::config::File::from(found.as_path()));
            }
        }
    }

    let settings = builder
        .add_source(
            ::config::Environment::with_prefix("FINDPAPERS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
