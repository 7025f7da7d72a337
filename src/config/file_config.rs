//! Configuration file support.
//!
//! Configuration is read from TOML. Every key is optional; missing keys
//! take their default value.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! scopus = "your-elsevier-api-key"
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! requests_per_second = 2.0
//!
//! [search]
//! max_pages = 100
//! page_size = 25
//! time_budget_secs = 600
//! date_merge_policy = "earliest"
//! concurrent = true
//! fetch_paper_details = true
//!
//! [sources]
//! enabled_sources = "scopus,acm"
//! disabled_sources = ""
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
const LOCAL_CONFIG: &str = "findpapers.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl Config {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Per-user configuration path, e.g. `~/.config/findpapers/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("findpapers").join("config.toml"))
}

/// First existing configuration file: `./findpapers.toml`, then the
/// per-user file
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateMergePolicy;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[api_keys]
scopus = "test-key"

[http]
requests_per_second = 0.5

[search]
page_size = 50
time_budget_secs = 120

[sources]
enabled_sources = "scopus"

[logging]
level = "debug"
"#;

        let mut file = File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load_file(&path).unwrap();

        assert_eq!(config.api_keys.scopus, Some("test-key".to_string()));
        assert_eq!(config.http.requests_per_second, 0.5);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.search.page_size, 50);
        assert_eq!(config.search.time_budget_secs, Some(120));
        assert_eq!(config.sources.enabled(), Some(vec!["scopus".to_string()]));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api_keys.scopus = Some("saved-key".to_string());
        config.search.date_merge_policy = DateMergePolicy::FirstSeen;
        config.search.time_budget_secs = Some(60);

        config.save(&path).unwrap();

        let loaded = Config::load_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = Config::load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigFileError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = Config::load_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }

    #[test]
    fn test_default_config_path_is_namespaced() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("findpapers/config.toml"));
        }
    }
}
