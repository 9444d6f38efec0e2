//! Configuration management for taskledger.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DATA_DIR` - Optional. Directory for the SQLite database. Defaults to `./data`.
//! - `STORE_TYPE` - Optional. `memory` or `sqlite`. Defaults to `sqlite`.
//! - `SWEEP_INTERVAL_SECS` - Optional. Past-due sweep interval; `0` disables it. Defaults to `86400`.
//! - `WEEKLY_OFF` - Optional. Weekday counted as a holiday. Defaults to `Sunday`.
//! - `REPORT_CUTOFF_HOUR` - Optional. UTC hour from which today's report is locked. Defaults to `23`.
//! - `ROSTER_PATH` - Optional. JSON roster imported on start.
//! - `DEV_MODE` - Optional. Trust the `X-Employee-Id` header instead of a JWT. Defaults to `true`.
//! - `JWT_SECRET` - Required when `DEV_MODE=false`.

use chrono::Weekday;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::store::StoreType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Authentication configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens
    pub jwt_secret: Option<String>,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Where persistent data lives
    pub data_dir: PathBuf,

    pub store_type: StoreType,

    /// Past-due sweep interval; `None` disables the scheduler
    pub sweep_interval: Option<Duration>,

    pub weekly_off: Weekday,

    pub report_cutoff_hour: u32,

    pub roster_path: Option<PathBuf>,

    /// Dev mode trusts the `X-Employee-Id` header
    pub dev_mode: bool,

    pub auth: AuthConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("expected a boolean, got {}", other),
        )),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is not set while
    /// dev mode is off, and `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("HOST", "127.0.0.1");

        let port = env_or("PORT", "3000")
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let data_dir = PathBuf::from(env_or("DATA_DIR", "./data"));
        let store_type = StoreType::from_str(&env_or("STORE_TYPE", "sqlite"));

        let sweep_secs: u64 = env_or("SWEEP_INTERVAL_SECS", "86400")
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("SWEEP_INTERVAL_SECS".to_string(), format!("{}", e))
            })?;
        let sweep_interval = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));

        let weekly_off: Weekday = env_or("WEEKLY_OFF", "Sunday").parse().map_err(|_| {
            ConfigError::InvalidValue(
                "WEEKLY_OFF".to_string(),
                "expected a weekday name".to_string(),
            )
        })?;

        let report_cutoff_hour: u32 = env_or("REPORT_CUTOFF_HOUR", "23")
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("REPORT_CUTOFF_HOUR".to_string(), format!("{}", e))
            })?;
        if report_cutoff_hour > 23 {
            return Err(ConfigError::InvalidValue(
                "REPORT_CUTOFF_HOUR".to_string(),
                format!("{} is not an hour of the day", report_cutoff_hour),
            ));
        }

        let roster_path = std::env::var("ROSTER_PATH").ok().map(PathBuf::from);

        let dev_mode = parse_bool("DEV_MODE", &env_or("DEV_MODE", "true"))?;
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if !dev_mode && jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        Ok(Self {
            host,
            port,
            data_dir,
            store_type,
            sweep_interval,
            weekly_off,
            report_cutoff_hour,
            roster_path,
            dev_mode,
            auth: AuthConfig { jwt_secret },
        })
    }

    /// Create a config with in-memory storage and no scheduler (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir,
            store_type: StoreType::Memory,
            sweep_interval: None,
            weekly_off: Weekday::Sun,
            report_cutoff_hour: 23,
            roster_path: None,
            dev_mode: true,
            auth: AuthConfig::default(),
        }
    }
}
