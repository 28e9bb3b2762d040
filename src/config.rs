//! Application configuration loaded from environment variables.
//!
//! The credential secret is injected as an environment variable by the
//! deployment (secret binding), so it is read once here and cached.

use crate::models::LoadMode;
use std::env;
use std::path::PathBuf;

/// Default endpoint where the UDisc Parse server lives.
pub const DEFAULT_UDISC_BASE_URL: &str = "https://udisc.xyz/parse";

/// UDisc's public Parse application id.
pub const DEFAULT_PARSE_APP_ID: &str = "X7O7gSaOUxCv9cTAHSASADcGtaRq7Kf9a4gNA8rn";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// JSON array of user metadata (`UDISC_USERS`)
    pub users_json: String,
    /// Default load mode for scheduled runs
    pub load_mode: LoadMode,
    /// Parse server base URL
    pub udisc_base_url: String,
    /// Parse application id header value
    pub parse_app_id: String,
    /// Root directory for raw scorecard blobs
    pub data_dir: PathBuf,
    /// SQLite warehouse file
    pub warehouse_path: String,
    /// Per-request timeout for upstream calls
    pub request_timeout_secs: u64,
    /// Overall deadline for one user's login + pagination
    pub user_deadline_secs: u64,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Credential secret (`UDISC_CREDENTIALS`)
    pub credentials_json: String,
    /// Bearer token required on `/tasks/*`
    pub tasks_token: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let load_mode = match env::var("LOAD_TYPE") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Unknown LOAD_TYPE, using full load");
                LoadMode::Full
            }),
            Err(_) => LoadMode::Full,
        };

        Ok(Self {
            users_json: env::var("UDISC_USERS").map_err(|_| ConfigError::Missing("UDISC_USERS"))?,
            load_mode,
            udisc_base_url: env::var("UDISC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_UDISC_BASE_URL.to_string()),
            parse_app_id: env::var("PARSE_APP_ID")
                .unwrap_or_else(|_| DEFAULT_PARSE_APP_ID.to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            warehouse_path: env::var("WAREHOUSE_PATH")
                .unwrap_or_else(|_| "data/warehouse.db".to_string()),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            user_deadline_secs: parse_or("USER_DEADLINE_SECS", 600)?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            credentials_json: env::var("UDISC_CREDENTIALS").unwrap_or_else(|_| "[]".to_string()),
            tasks_token: env::var("TASKS_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_TOKEN"))?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            users_json: "[]".to_string(),
            load_mode: LoadMode::Full,
            udisc_base_url: "http://127.0.0.1:9".to_string(),
            parse_app_id: "test_app_id".to_string(),
            data_dir: PathBuf::from("target/test-data"),
            warehouse_path: ":memory:".to_string(),
            request_timeout_secs: 5,
            user_deadline_secs: 30,
            port: 8080,
            credentials_json: "[]".to_string(),
            tasks_token: "test_tasks_token".to_string(),
        }
    }
}

fn parse_or(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
