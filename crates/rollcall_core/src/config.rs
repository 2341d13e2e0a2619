//! Runtime configuration loaded from `ROLLCALL_*` environment variables.

use crate::db::{ConnectionSettings, RetryPolicy};
use crate::logging::{default_log_level, normalize_level};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "rollcall.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TX_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_TX_BACKOFF_MS: u64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub log_level: &'static str,
    /// File logging is off when unset.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub tx_max_attempts: u32,
    pub tx_backoff_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            log_level: default_log_level(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            tx_max_attempts: DEFAULT_TX_MAX_ATTEMPTS,
            tx_backoff_ms: DEFAULT_TX_BACKOFF_MS,
        }
    }
}

impl CoreConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset or blank keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let log_level = match read("ROLLCALL_LOG_LEVEL") {
            Some(value) => normalize_level(&value).map_err(|err| ConfigError::Invalid {
                key: "ROLLCALL_LOG_LEVEL",
                reason: err.to_string(),
            })?,
            None => defaults.log_level,
        };

        let log_dir = read("ROLLCALL_LOG_DIR").map(PathBuf::from);
        if let Some(dir) = &log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    key: "ROLLCALL_LOG_DIR",
                    reason: format!("`{}` is not an absolute path", dir.display()),
                });
            }
        }

        let tx_max_attempts = parse_or(
            "ROLLCALL_TX_MAX_ATTEMPTS",
            read("ROLLCALL_TX_MAX_ATTEMPTS"),
            defaults.tx_max_attempts,
        )?;
        if tx_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "ROLLCALL_TX_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_path: read("ROLLCALL_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            log_level,
            log_dir,
            busy_timeout_ms: parse_or(
                "ROLLCALL_BUSY_TIMEOUT_MS",
                read("ROLLCALL_BUSY_TIMEOUT_MS"),
                defaults.busy_timeout_ms,
            )?,
            tx_max_attempts,
            tx_backoff_ms: parse_or(
                "ROLLCALL_TX_BACKOFF_MS",
                read("ROLLCALL_TX_BACKOFF_MS"),
                defaults.tx_backoff_ms,
            )?,
        })
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..ConnectionSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.tx_max_attempts,
            backoff: Duration::from_millis(self.tx_backoff_ms),
        }
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(text) => text.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: format!("`{text}`: {err}"),
        }),
        None => Ok(default),
    }
}
