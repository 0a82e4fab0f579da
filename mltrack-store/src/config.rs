//! Store configuration
//!
//! Where the SQLite file lives and how the connection pool behaves.

use std::path::PathBuf;
use std::time::Duration;

/// Default database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "./experiment_db.sqlite";

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file; its parent directory is created on open
    pub database_path: PathBuf,

    /// Maximum pooled connections
    pub max_connections: u32,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,

    /// How long an operation waits for a pooled connection
    pub acquire_timeout: Duration,
}

impl Config {
    /// Creates a configuration with defaults for the given database file
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - MLTRACK_DB_PATH (optional, default: ./experiment_db.sqlite)
    /// - MLTRACK_DB_MAX_CONNECTIONS (optional, default: 5)
    /// - MLTRACK_DB_BUSY_TIMEOUT (optional, seconds, default: 5)
    /// - MLTRACK_DB_ACQUIRE_TIMEOUT (optional, seconds, default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("MLTRACK_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let mut config = Self::new(database_path);

        if let Some(value) = lookup("MLTRACK_DB_MAX_CONNECTIONS") {
            config.max_connections = value.parse().map_err(|_| {
                anyhow::anyhow!("MLTRACK_DB_MAX_CONNECTIONS must be a positive integer, got {value:?}")
            })?;
        }

        if let Some(value) = lookup("MLTRACK_DB_BUSY_TIMEOUT") {
            config.busy_timeout = parse_seconds("MLTRACK_DB_BUSY_TIMEOUT", &value)?;
        }

        if let Some(value) = lookup("MLTRACK_DB_ACQUIRE_TIMEOUT") {
            config.acquire_timeout = parse_seconds("MLTRACK_DB_ACQUIRE_TIMEOUT", &value)?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_path.as_os_str().is_empty() {
            anyhow::bail!("database_path cannot be empty");
        }

        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be greater than 0");
        }

        if self.busy_timeout.is_zero() {
            anyhow::bail!("busy_timeout must be greater than 0");
        }

        if self.acquire_timeout.is_zero() {
            anyhow::bail!("acquire_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DB_PATH)
    }
}

fn parse_seconds(key: &str, value: &str) -> anyhow::Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| anyhow::anyhow!("{key} must be a whole number of seconds, got {value:?}"))
}
