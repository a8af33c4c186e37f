//! Configuration for the crew roster service and engine.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::MAX_PAGE_ROWS;
use crate::roster::EngineSettings;

const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration that could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    InvalidBindAddr(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBindAddr(value) => {
                write!(f, "Invalid CREW_BIND_ADDR format: {}", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Rows per roster page
    pub page_size: usize,
    /// Quiet window before a search term commits
    pub search_debounce: Duration,
    /// Upper bound on a single roster query
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("CREW_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("CREW_DB_PATH")
            .unwrap_or_else(|_| "./data/crew.sqlite".to_string())
            .into();

        let bind_addr_raw =
            env::var("CREW_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_addr_raw.clone()))?;

        let log_level = env::var("CREW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        // The query endpoint refuses pages above MAX_PAGE_ROWS.
        let page_size = parse_number("CREW_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_ROWS);
        let search_debounce = Duration::from_millis(parse_number(
            "CREW_SEARCH_DEBOUNCE_MS",
            DEFAULT_SEARCH_DEBOUNCE_MS,
        ));
        let request_timeout = Duration::from_millis(parse_number(
            "CREW_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        ));

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            page_size,
            search_debounce,
            request_timeout,
        })
    }

    /// Engine tunables taken from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.page_size.clamp(1, MAX_PAGE_ROWS),
            request_timeout: self.request_timeout,
            search_debounce: self.search_debounce,
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var, value = %raw, "ignoring invalid number");
            default
        }),
        Err(_) => default,
    }
}
