//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Which ledger store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::InvalidValue("LEDGER_STORE")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("LOG_FORMAT")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger store backend
    pub store_backend: StoreBackend,

    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Apply bundled migrations at start-up
    pub run_migrations: bool,

    /// Attempts per ledger transaction on serialization failures
    pub tx_max_retries: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend: StoreBackend = lookup("LEDGER_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let run_migrations = parse_or(&lookup, "RUN_MIGRATIONS", false)?;

        let tx_max_retries: u32 = parse_or(&lookup, "TX_MAX_RETRIES", 3)?;
        if tx_max_retries == 0 {
            return Err(ConfigError::InvalidValue("TX_MAX_RETRIES"));
        }

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 3000)?;
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let log_format = lookup("LOG_FORMAT")
            .unwrap_or_else(|| "pretty".to_string())
            .parse()?;

        Ok(Self {
            store_backend,
            database_url,
            database_max_connections,
            run_migrations,
            tx_max_retries,
            host,
            port,
            environment,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
