//! Configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `FEEDFETCH_CONFIG` environment variable
//! 3. Per-user config file (`<config_dir>/feedfetch/config.toml`)
//! 4. Compiled defaults (fallback, no file)
//!
//! A missing config file is not an error: a warning is logged and compiled
//! defaults are used. A file that exists but does not parse is fatal.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FEEDFETCH_CONFIG";

/// Upper bound on identifiers accepted by one iTunes lookup request
pub const MAX_IDS_PER_LOOKUP: usize = 200;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub lookup: LookupConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

/// `[input]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Text file with one podcast URL or numeric id per line
    pub id_list_file: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            id_list_file: PathBuf::from("data/podcasts.txt"),
        }
    }
}

/// `[lookup]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Lookup endpoint, without query string
    pub base_url: String,
    /// Parallel requests issued per tick
    pub concurrent_fetches: usize,
    /// Identifiers grouped into one request URL
    pub max_ids_per_fetch: usize,
    /// Tick interval in milliseconds (3000 ≈ 20 calls/minute)
    pub tick_interval_ms: u64,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Optional hard quota on requests per minute
    pub requests_per_minute: Option<u32>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://itunes.apple.com/lookup".to_string(),
            concurrent_fetches: 1,
            max_ids_per_fetch: 100,
            tick_interval_ms: 3000,
            request_timeout_secs: 30,
            requests_per_minute: None,
        }
    }
}

/// `[persistence]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// SQLite catalog database file
    pub database_path: PathBuf,
    /// Result buffer length that triggers a flush
    pub save_threshold: usize,
    /// Waits (seconds) between persistence retries
    pub backoff_schedule_secs: Vec<u64>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/catalog.db"),
            save_threshold: 500,
            backoff_schedule_secs: vec![5, 30, 60],
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Where permanently failed identifiers are written at the end of a run
    pub failed_ids_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            failed_ids_file: None,
        }
    }
}

impl TomlConfig {
    /// Reject settings the fetcher cannot run with
    pub fn validate(&self) -> Result<()> {
        let lookup = &self.lookup;

        if lookup.base_url.trim().is_empty() {
            return Err(Error::Config("lookup.base_url must not be empty".to_string()));
        }
        if lookup.concurrent_fetches == 0 {
            return Err(Error::Config("lookup.concurrent_fetches must be at least 1".to_string()));
        }
        if lookup.max_ids_per_fetch == 0 || lookup.max_ids_per_fetch > MAX_IDS_PER_LOOKUP {
            return Err(Error::Config(format!(
                "lookup.max_ids_per_fetch must be between 1 and {}",
                MAX_IDS_PER_LOOKUP
            )));
        }
        if lookup.tick_interval_ms == 0 {
            return Err(Error::Config("lookup.tick_interval_ms must be positive".to_string()));
        }
        if lookup.requests_per_minute == Some(0) {
            return Err(Error::Config("lookup.requests_per_minute must be positive when set".to_string()));
        }
        if self.persistence.save_threshold == 0 {
            return Err(Error::Config("persistence.save_threshold must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no explicit path was given and no per-user file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file
    default_config_path().filter(|p| p.exists())
}

/// Per-user config file location for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("feedfetch").join("config.toml"))
}

/// Load configuration from `path`, falling back to defaults when absent
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write configuration as TOML, creating parent directories as needed
///
/// Writes to a sibling temp file first and renames it into place.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lookup.tick_interval_ms, 3000);
        assert_eq!(config.persistence.backoff_schedule_secs, vec![5, 30, 60]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [lookup]
            concurrent_fetches = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.lookup.concurrent_fetches, 4);
        assert_eq!(config.lookup.max_ids_per_fetch, 100);
        assert_eq!(config.persistence.save_threshold, 500);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = TomlConfig::default();
        config.lookup.concurrent_fetches = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_batches() {
        let mut config = TomlConfig::default();
        config.lookup.max_ids_per_fetch = MAX_IDS_PER_LOOKUP + 1;
        assert!(config.validate().is_err());

        config.lookup.max_ids_per_fetch = MAX_IDS_PER_LOOKUP;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let mut config = TomlConfig::default();
        config.lookup.requests_per_minute = Some(0);
        assert!(config.validate().is_err());
    }
}
