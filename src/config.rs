//! Configuration module for authdb.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{AuthDbError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long to wait for a free pooled connection, in milliseconds.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
    /// SQLite busy timeout while waiting on a write lock, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Upper bound for one storage unit (a query or a transaction), in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

fn default_db_path() -> String {
    "data/authdb.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout() -> u64 {
    5_000
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_operation_timeout() -> u64 {
    10_000
}

impl DatabaseConfig {
    /// Pool acquire timeout.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// SQLite busy timeout.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Bound applied to every storage unit.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout(),
            busy_timeout_ms: default_busy_timeout(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret used to sign session tokens (must be set).
    #[serde(default)]
    pub secret: String,
    /// Session token lifetime in days.
    #[serde(default = "default_session_lifetime")]
    pub lifetime_days: u64,
}

fn default_session_lifetime() -> u64 {
    30
}

impl SessionConfig {
    /// Session lifetime as a chrono duration.
    ///
    /// Fails for values chrono cannot represent.
    pub fn lifetime(&self) -> Result<chrono::Duration> {
        i64::try_from(self.lifetime_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .ok_or_else(|| {
                AuthDbError::Validation(format!(
                    "session.lifetime_days is out of range: {}",
                    self.lifetime_days
                ))
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            lifetime_days: default_session_lifetime(),
        }
    }
}

/// Password reset configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    /// Reset token lifetime in hours.
    #[serde(default = "default_reset_lifetime")]
    pub token_lifetime_hours: u64,
    /// Base URL of the reset page; the token is appended as `?token=`.
    #[serde(default = "default_link_base")]
    pub link_base_url: String,
}

fn default_reset_lifetime() -> u64 {
    24
}

fn default_link_base() -> String {
    "http://0.0.0.0:8080/reset_password".to_string()
}

impl ResetConfig {
    /// Reset token lifetime as a chrono duration.
    ///
    /// Fails for values chrono cannot represent.
    pub fn token_lifetime(&self) -> Result<chrono::Duration> {
        i64::try_from(self.token_lifetime_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                AuthDbError::Validation(format!(
                    "reset.token_lifetime_hours is out of range: {}",
                    self.token_lifetime_hours
                ))
            })
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_lifetime_hours: default_reset_lifetime(),
            link_base_url: default_link_base(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    65536
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/authdb.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session token configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Password reset configuration.
    #[serde(default)]
    pub reset: ResetConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub hashing: HashingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(AuthDbError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AuthDbError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `AUTHDB_SESSION_SECRET`: Override the session signing secret
    /// - `AUTHDB_DATABASE_PATH`: Override the database file location
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("AUTHDB_SESSION_SECRET") {
            if !secret.is_empty() {
                self.session.secret = secret;
            }
        }
        if let Ok(path) = std::env::var("AUTHDB_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the session secret is not set
    /// - a token lifetime is zero
    /// - the connection pool is empty
    pub fn validate(&self) -> Result<()> {
        if self.session.secret.is_empty() {
            return Err(AuthDbError::Validation(
                "session secret is not set. \
                 Set it in config.toml or via AUTHDB_SESSION_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.session.lifetime_days == 0 {
            return Err(AuthDbError::Validation(
                "session.lifetime_days must be greater than zero".to_string(),
            ));
        }
        if self.reset.token_lifetime_hours == 0 {
            return Err(AuthDbError::Validation(
                "reset.token_lifetime_hours must be greater than zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(AuthDbError::Validation(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        self.session.lifetime()?;
        self.reset.token_lifetime()?;
        Ok(())
    }
}
