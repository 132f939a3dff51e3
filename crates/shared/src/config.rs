use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub session_ttl_seconds: u64,
    pub history_read_failure: HistoryReadFailure,
}

/// What a page or history load does when the conversation store is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryReadFailure {
    /// Serve an empty history and log a warning.
    Degrade,
    /// Return 503 so the outage is visible to the client.
    Fail,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid value in env var {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
            session_ttl_seconds: parse_u64_env("SESSION_TTL_SECONDS", 86_400)?,
            history_read_failure: parse_history_read_failure_env("HISTORY_READ_FAILURE")?,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_history_read_failure_env(key: &str) -> Result<HistoryReadFailure, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_history_read_failure(&raw).ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(HistoryReadFailure::Degrade),
    }
}

fn parse_history_read_failure(raw: &str) -> Option<HistoryReadFailure> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "degrade" => Some(HistoryReadFailure::Degrade),
        "fail" => Some(HistoryReadFailure::Fail),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_read_failure_parses_both_modes() {
        assert_eq!(
            parse_history_read_failure("degrade"),
            Some(HistoryReadFailure::Degrade)
        );
        assert_eq!(
            parse_history_read_failure("FAIL"),
            Some(HistoryReadFailure::Fail)
        );
        assert_eq!(parse_history_read_failure("loud"), None);
    }
}
