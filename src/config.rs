use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_ENV: &str = "MONTHLEDGER_DB";
pub const LOG_ENV: &str = "MONTHLEDGER_LOG";
pub const BUSY_TIMEOUT_ENV: &str = "MONTHLEDGER_BUSY_TIMEOUT_MS";
pub const RETRIES_ENV: &str = "MONTHLEDGER_RETRIES";

const DEFAULT_LOG_FILTER: &str = "monthledger=info";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// How long a write waits for the database lock before giving up.
    pub busy_timeout: Duration,
    /// Attempts for an operation that keeps failing with `TransactionAborted`.
    pub retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup(DB_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_db_path()?,
        };

        let log_filter = lookup(LOG_ENV)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let busy_timeout_ms = match lookup(BUSY_TIMEOUT_ENV) {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("{BUSY_TIMEOUT_ENV} must be a whole number of milliseconds, got \"{v}\""))?,
            None => DEFAULT_BUSY_TIMEOUT_MS,
        };

        let retries = match lookup(RETRIES_ENV) {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("{RETRIES_ENV} must be a whole number, got \"{v}\""))?,
            None => DEFAULT_RETRIES,
        };

        Ok(Self {
            db_path,
            log_filter,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            retries,
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "monthledger", "MonthLedger")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("monthledger.db"))
}
