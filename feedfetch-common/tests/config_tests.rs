//! Tests for config file resolution and loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FEEDFETCH_CONFIG are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use feedfetch_common::config::{
    load_toml_config, resolve_config_path, write_toml_config, TomlConfig, CONFIG_ENV_VAR,
};
use feedfetch_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_path_overrides_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/feedfetch-env.toml");

    let cli = PathBuf::from("/tmp/feedfetch-cli.toml");
    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/feedfetch-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/feedfetch-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let config = load_toml_config(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());

    let config = load_toml_config(None).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[lookup\nconcurrent_fetches = ").unwrap();

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_write_then_load_preserves_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.lookup.concurrent_fetches = 3;
    config.lookup.requests_per_minute = Some(20);
    config.persistence.save_threshold = 42;
    config.logging.failed_ids_file = Some(PathBuf::from("out/failed.txt"));

    write_toml_config(&config, &path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}
