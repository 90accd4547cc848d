//! Tracing setup for the CLI.
//!
//! Logs go to stderr so stdout stays a single JSON document per command.

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "RECIPE_BOX_LOG";

#[derive(Debug, Error)]
#[error("logger error: {0}")]
pub struct LoggerError(String);

/// Installs the global subscriber. `RECIPE_BOX_LOG`, when set and valid,
/// takes precedence over the configured `level`.
pub fn init(level: &str) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| LoggerError(format!("invalid log level '{level}': {err}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| LoggerError(format!("failed to set subscriber: {err}")))
}

pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    if level.is_empty() {
        return Err("log level must not be empty".to_string());
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| format!("unrecognised log level '{level}'"))
}
