//! Integration tests for configuration loading
//!
//! Tests that manipulate SONGREC_CONFIG or SONGREC_API_KEY are marked with
//! #[serial] so they never run in parallel with each other.

use serial_test::serial;
use songrec_common::config::{
    load_config, resolve_config_path, RecognitionConfig, TomlConfig, API_KEY_ENV_VAR,
    CONFIG_ENV_VAR,
};
use songrec_common::Error;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/songrec-env-config.toml");

    let cli = PathBuf::from("/tmp/songrec-cli-config.toml");
    let (path, explicit) = resolve_config_path(Some(&cli)).unwrap();
    assert_eq!(path, cli);
    assert!(explicit);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/songrec-env-config.toml");

    let (path, explicit) = resolve_config_path(None).unwrap();
    assert_eq!(path, PathBuf::from("/tmp/songrec-env-config.toml"));
    assert!(explicit);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_config_is_fatal() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let result = load_config(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_load_config_resolves_relative_folders_against_file() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[folders]
raw = "incoming"

[folders.quarantine]
corrupt = "/var/quarantine/corrupt"

[pipeline]
workers = 2

[logging]
level = "debug"
file = "logs/songrec.log"
"#,
    )
    .unwrap();

    let config = load_config(Some(&config_path)).unwrap();
    assert_eq!(config.source.as_deref(), Some(config_path.as_path()));
    assert_eq!(config.folders.raw, temp_dir.path().join("incoming"));
    assert_eq!(
        config.folders.quarantine.corrupt,
        PathBuf::from("/var/quarantine/corrupt")
    );
    assert_eq!(config.pipeline.workers, 2);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.file,
        Some(temp_dir.path().join("logs/songrec.log"))
    );
}

#[test]
#[serial]
fn test_api_key_env_overrides_toml() {
    env::set_var(API_KEY_ENV_VAR, "from-env");

    let config = RecognitionConfig {
        api_key: Some("from-toml".to_string()),
        ..RecognitionConfig::default()
    };
    assert_eq!(config.resolve_api_key(), Some("from-env".to_string()));

    env::remove_var(API_KEY_ENV_VAR);
    assert_eq!(config.resolve_api_key(), Some("from-toml".to_string()));
}

#[test]
#[serial]
fn test_blank_api_key_is_ignored() {
    env::set_var(API_KEY_ENV_VAR, "   ");

    let config = RecognitionConfig {
        api_key: Some("".to_string()),
        ..RecognitionConfig::default()
    };
    assert_eq!(config.resolve_api_key(), None);

    env::remove_var(API_KEY_ENV_VAR);
}

#[test]
fn test_defaults_rooted_at_base() {
    let config = TomlConfig::defaults_at(std::path::Path::new("/work"));
    assert_eq!(
        config.folders.archive,
        PathBuf::from("/work/input_files/original_files")
    );
    assert_eq!(config.folders.temp, PathBuf::from("/work/temp_files"));
    assert_eq!(
        config.folders.quarantine.identification_failed,
        PathBuf::from("/work/output_files/song_detection/failed")
    );
}
