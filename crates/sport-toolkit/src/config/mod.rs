mod credentials;

pub use credentials::{FileTokenStore, KeyringTokenStore, StaticTokenStore, TokenStore};

use crate::error::{Result, SportError};
use std::path::{Path, PathBuf};

/// Per-user directory name under the platform data directory
const DATA_DIR_NAME: &str = "sport";

const DB_FILENAME: &str = "mirror.sqlite3";
const STRAVA_TOKEN_FILENAME: &str = "strava-api-token.json";
const GARMIN_TOKEN_FILENAME: &str = "garmin-connect-token.json";
const DEFAULT_GARMIN_DOMAIN: &str = "garmin.com";

/// Get the data directory path for tokens and the local mirror
/// Returns ~/.local/share/sport on Unix, ~/Library/Application Support/sport on macOS
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join(DATA_DIR_NAME))
        .ok_or_else(|| SportError::config("Could not determine data directory"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Runtime settings, resolved from the environment with per-user defaults
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// SQLite file of the local Strava mirror (`SPORT_DB_PATH`)
    pub db_path: PathBuf,
    /// Strava token JSON (`STRAVA_TOKEN_FILE`)
    pub strava_token_file: PathBuf,
    /// Strava OAuth app credentials, only needed to refresh an expired token
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    /// Garmin session token (`GARMIN_TOKEN_FILE`)
    pub garmin_token_file: PathBuf,
    pub garmin_domain: String,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(&data_dir()?, |key| std::env::var(key).ok()))
    }

    /// Resolve settings through `lookup`, falling back to files in `data_dir`.
    /// Empty values count as unset.
    pub fn from_lookup<F>(data_dir: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let path_or = |key: &str, file: &str| {
            get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(file))
        };

        Self {
            db_path: path_or("SPORT_DB_PATH", DB_FILENAME),
            strava_token_file: path_or("STRAVA_TOKEN_FILE", STRAVA_TOKEN_FILENAME),
            strava_client_id: get("STRAVA_CLIENT_ID"),
            strava_client_secret: get("STRAVA_CLIENT_SECRET"),
            garmin_token_file: path_or("GARMIN_TOKEN_FILE", GARMIN_TOKEN_FILENAME),
            garmin_domain: get("GARMIN_DOMAIN").unwrap_or_else(|| DEFAULT_GARMIN_DOMAIN.to_string()),
        }
    }

    /// Apply command line overrides
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        strava_token_file: Option<PathBuf>,
        garmin_token_file: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(path) = strava_token_file {
            self.strava_token_file = path;
        }
        if let Some(path) = garmin_token_file {
            self.garmin_token_file = path;
        }
        self
    }
}
