//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;

/// Where live data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    /// Cloud Firestore (or the emulator when `FIRESTORE_EMULATOR_HOST` is set)
    Firestore,
    /// In-process store, optionally seeded from `SEED_FILE`
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    pub data_source: DataSourceKind,
    /// JSON seed for the in-memory source
    pub seed_file: Option<PathBuf>,
    /// Signed-in user the dashboard acts for
    pub dashboard_user_id: String,
    /// File backing the persisted club selection
    pub selection_store_path: PathBuf,
    pub sessions_page_size: usize,
    /// Viewport height in pixels; overrides `sessions_page_size` when set
    pub viewport_height: Option<u32>,
    pub sessions_start_date: Option<NaiveDate>,
    pub sessions_end_date: Option<NaiveDate>,
}

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_SELECTION_PATH: &str = ".club-dashboard/selection.json";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_source = match get("DATA_SOURCE").as_deref() {
            None | Some("firestore") => DataSourceKind::Firestore,
            Some("memory") => DataSourceKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "DATA_SOURCE",
                    message: format!("expected 'firestore' or 'memory', got '{other}'"),
                })
            }
        };

        let sessions_page_size = match get("SESSIONS_PAGE_SIZE") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SESSIONS_PAGE_SIZE",
                        message: format!("expected a positive integer, got '{v}'"),
                    })
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        let viewport_height = get("VIEWPORT_HEIGHT")
            .map(|v| {
                v.parse::<u32>().map_err(|_| ConfigError::Invalid {
                    key: "VIEWPORT_HEIGHT",
                    message: format!("expected pixels, got '{v}'"),
                })
            })
            .transpose()?;

        let config = Self {
            gcp_project_id: get("GCP_PROJECT_ID").unwrap_or_else(|| "local-dev".to_string()),
            data_source,
            seed_file: get("SEED_FILE").map(PathBuf::from),
            dashboard_user_id: get("DASHBOARD_USER_ID")
                .ok_or(ConfigError::Missing("DASHBOARD_USER_ID"))?,
            selection_store_path: get("SELECTION_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SELECTION_PATH)),
            sessions_page_size,
            viewport_height,
            sessions_start_date: parse_date(get("SESSIONS_START_DATE"), "SESSIONS_START_DATE")?,
            sessions_end_date: parse_date(get("SESSIONS_END_DATE"), "SESSIONS_END_DATE")?,
        };

        if let (Some(start), Some(end)) = (config.sessions_start_date, config.sessions_end_date) {
            if start > end {
                return Err(ConfigError::Invalid {
                    key: "SESSIONS_END_DATE",
                    message: format!("{end} is before SESSIONS_START_DATE {start}"),
                });
            }
        }

        Ok(config)
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            data_source: DataSourceKind::Memory,
            seed_file: None,
            dashboard_user_id: "test-user".to_string(),
            selection_store_path: env::temp_dir().join("club-dashboard-test-selection.json"),
            sessions_page_size: DEFAULT_PAGE_SIZE,
            viewport_height: None,
            sessions_start_date: None,
            sessions_end_date: None,
        }
    }
}

fn parse_date(value: Option<String>, key: &'static str) -> Result<Option<NaiveDate>, ConfigError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
                key,
                message: format!("expected YYYY-MM-DD, got '{v}': {e}"),
            })
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}
