use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use taskboard::config::{Config, ConfigError};
use tempfile::TempDir;

// Tests touching TASKBOARD_DB run serially.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_empty_document_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
    assert!(config.enforce_project_range);
    assert_eq!(config.time_format, "%Y-%m-%d %H:%M");
}

#[test]
fn test_sections_override_defaults() {
    let config = Config::from_toml(
        r#"
[storage]
db_path = "/tmp/elsewhere.json"

[schedule]
enforce_project_range = false

[log]
level = "debug"

[watch]
interval_ms = 250
"#,
    )
    .unwrap();
    assert_eq!(config.db_path, PathBuf::from("/tmp/elsewhere.json"));
    assert!(!config.enforce_project_range);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.watch_interval_ms, 250);
    assert_eq!(config.time_format, Config::default().time_format);
}

#[test]
fn test_malformed_toml_is_an_error() {
    let err = Config::from_toml("[schedule]\nenforce_project_range = \"maybe\"").unwrap_err();
    assert!(matches!(err, ConfigError::ParseToml(_)));
}

#[test]
fn test_unknown_time_format_specifier_is_rejected() {
    let err = Config::from_toml("[display]\ntime_format = \"%Q\"").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTimeFormat(ref f) if f == "%Q"));

    let err = Config::from_toml("[display]\ntime_format = \"%Y-%m-%d %\"").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTimeFormat(_)));

    let config = Config::from_toml("[display]\ntime_format = \"%d/%m %H:%M\"").unwrap();
    assert_eq!(config.time_format, "%d/%m %H:%M");
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = TempDir::new().unwrap();
    let err = Config::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_env_overrides_file_db_path() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("config.toml");
    fs::write(&file, "[storage]\ndb_path = \"/tmp/from-file.json\"\n").unwrap();

    env::remove_var("TASKBOARD_DB");
    assert_eq!(Config::load(Some(file.as_path())).unwrap().db_path, PathBuf::from("/tmp/from-file.json"));

    env::set_var("TASKBOARD_DB", dir.path().join("from-env.json"));
    let config = Config::load(Some(file.as_path())).unwrap();
    env::remove_var("TASKBOARD_DB");
    assert_eq!(config.db_path, dir.path().join("from-env.json"));
}
