use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::store::BUSY_TIMEOUT_DEFAULT;

pub const PROJECT_CONFIG_FILE: &str = ".recipe-box.project.yml";
pub const DATABASE_DEFAULT: &str = "recipes.sqlite";
pub const LOG_LEVEL_DEFAULT: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub database: PathBuf,
    pub busy_timeout: Duration,
    pub log_level: String,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DATABASE_DEFAULT),
            busy_timeout: BUSY_TIMEOUT_DEFAULT,
            log_level: LOG_LEVEL_DEFAULT.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    busy_timeout_ms: Option<u64>,
    #[serde(default)]
    log_level: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Merges user, nearest project and repo config layers, in that order.
/// Later layers override individual keys; missing files are skipped.
/// A relative `database` path is resolved against `storage_root`.
pub fn load_effective_config(
    cwd: &Path,
    storage_root: &Path,
    repo_config: Option<&Path>,
    user_config: Option<&Path>,
    home: &Path,
) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = RawConfig::default();

    if let Some(path) = user_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    if let Some(path) = find_nearest_project_config(cwd) {
        merge_layer(&mut merged, load_config_layer(&path)?);
    }

    if let Some(path) = repo_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    resolve(merged, storage_root, home)
}

pub fn find_nearest_project_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn merge_layer(merged: &mut RawConfig, layer: RawConfig) {
    if layer.database.is_some() {
        merged.database = layer.database;
    }
    if layer.busy_timeout_ms.is_some() {
        merged.busy_timeout_ms = layer.busy_timeout_ms;
    }
    if layer.log_level.is_some() {
        merged.log_level = layer.log_level;
    }
}

fn load_config_layer(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_layer(&content)
}

fn parse_config_layer(content: &str) -> Result<RawConfig, ConfigError> {
    if content.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

fn resolve(
    raw: RawConfig,
    storage_root: &Path,
    home: &Path,
) -> Result<EffectiveConfig, ConfigError> {
    let defaults = EffectiveConfig::default();

    let database = match raw.database.as_deref().map(str::trim) {
        Some("") => {
            return Err(ConfigError::InvalidValue {
                key: "database",
                reason: "path must not be empty".to_string(),
            });
        }
        Some(path) => expand_tilde(path, home),
        None => defaults.database,
    };
    let database = if database.is_absolute() {
        database
    } else {
        storage_root.join(database)
    };

    let busy_timeout = match raw.busy_timeout_ms {
        Some(0) => {
            return Err(ConfigError::InvalidValue {
                key: "busy_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Some(ms) => Duration::from_millis(ms),
        None => defaults.busy_timeout,
    };

    let log_level = raw
        .log_level
        .map(|level| level.trim().to_ascii_lowercase())
        .unwrap_or(defaults.log_level);
    crate::logging::parse_level(&log_level).map_err(|reason| ConfigError::InvalidValue {
        key: "log_level",
        reason,
    })?;

    Ok(EffectiveConfig {
        database,
        busy_timeout,
        log_level,
    })
}

pub fn load_config_file(
    path: &Path,
    storage_root: &Path,
    home: &Path,
) -> Result<EffectiveConfig, ConfigError> {
    resolve(load_config_layer(path)?, storage_root, home)
}

pub fn default_config_yaml() -> String {
    format!(
        r#"database: {DATABASE_DEFAULT}
busy_timeout_ms: {}
log_level: {LOG_LEVEL_DEFAULT}
"#,
        BUSY_TIMEOUT_DEFAULT.as_millis()
    )
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
