//! Configuration.
//!
//! Priority (highest first):
//! 1. `TASKBOARD_DB` for the store path
//! 2. TOML config file (`--config`/`TASKBOARD_CONFIG`, otherwise
//!    `<config_dir>/taskboard/config.toml`)
//! 3. Compiled defaults
//!
//! A missing default config file is not an error. An explicit path that
//! doesn't exist is.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("invalid [display] time_format '{0}'")]
    InvalidTimeFormat(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageSection,
    schedule: ScheduleSection,
    display: DisplaySection,
    log: LogSection,
    watch: WatchSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageSection {
    db_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleSection {
    enforce_project_range: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DisplaySection {
    time_format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogSection {
    level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WatchSection {
    interval_ms: Option<u64>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path of the JSON store file.
    pub db_path: PathBuf,
    /// Refuse task windows outside their project's date range.
    pub enforce_project_range: bool,
    /// `chrono` format used when printing instants.
    pub time_format: String,
    /// Default log filter when neither `TASKBOARD_LOG` nor `RUST_LOG` is set.
    pub log_level: String,
    /// Poll interval for `task watch`.
    pub watch_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            enforce_project_range: true,
            time_format: "%Y-%m-%d %H:%M".to_string(),
            log_level: "warn".to_string(),
            watch_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Loads the configuration, layering the file and environment over defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => read_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        let mut config = Self::from_file(file)?;
        if let Ok(db) = std::env::var("TASKBOARD_DB") {
            config.db_path = PathBuf::from(db);
        }
        Ok(config)
    }

    /// Parses a config document without touching the filesystem or environment.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        if let Some(fmt) = &file.display.time_format {
            if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidTimeFormat(fmt.clone()));
            }
        }
        Ok(Self {
            db_path: file.storage.db_path.unwrap_or(defaults.db_path),
            enforce_project_range: file
                .schedule
                .enforce_project_range
                .unwrap_or(defaults.enforce_project_range),
            time_format: file.display.time_format.unwrap_or(defaults.time_format),
            log_level: file.log.level.unwrap_or(defaults.log_level),
            watch_interval_ms: file.watch.interval_ms.unwrap_or(defaults.watch_interval_ms),
        })
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&s)?)
}

fn default_config_path() -> Option<PathBuf> {
    let mut p = dirs::config_dir()?;
    p.push("taskboard");
    p.push("config.toml");
    Some(p)
}

/// `~/.local/share/taskboard/board.json` on Linux, `./board.json` when no
/// data directory is known.
fn default_db_path() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("taskboard");
    p.push("board.json");
    p
}
