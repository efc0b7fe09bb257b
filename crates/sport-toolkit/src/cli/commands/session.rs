//! Clients and the mirror database, built from resolved settings

use tracing::debug;

use crate::client::{GarminClient, GarminSession, OAuth2Token, StravaClient, StravaTokenManager};
use crate::config::{FileTokenStore, KeyringTokenStore, Settings, TokenStore};
use crate::error::Result;
use crate::storage::MirrorDb;

const STRAVA_KEYRING_ACCOUNT: &str = "strava";
const GARMIN_KEYRING_ACCOUNT: &str = "garmin";

/// Everything a command needs to reach the vendors and the mirror
pub struct Context {
    pub settings: Settings,
    /// Read tokens from the OS keyring instead of the token files
    pub use_keyring: bool,
}

impl Context {
    pub fn new(settings: Settings, use_keyring: bool) -> Self {
        Self {
            settings,
            use_keyring,
        }
    }

    fn token_store(&self, account: &str, file: &std::path::Path) -> Box<dyn TokenStore> {
        let store: Box<dyn TokenStore> = if self.use_keyring {
            Box::new(KeyringTokenStore::new(account))
        } else {
            Box::new(FileTokenStore::new(file))
        };
        debug!(store = %store.describe(), "Using token store");
        store
    }

    /// Strava client with a valid access token, refreshing it if needed
    pub async fn strava(&self) -> Result<StravaClient> {
        let store = self.token_store(STRAVA_KEYRING_ACCOUNT, &self.settings.strava_token_file);
        let mut manager = StravaTokenManager::new(
            store,
            self.settings.strava_client_id.clone(),
            self.settings.strava_client_secret.clone(),
        );
        Ok(StravaClient::new(manager.get_access_token().await?))
    }

    /// Garmin client for the stored session's domain, and its bearer token
    pub fn garmin(&self) -> Result<(GarminClient, OAuth2Token)> {
        let store = self.token_store(GARMIN_KEYRING_ACCOUNT, &self.settings.garmin_token_file);
        let session = GarminSession::decode(&store.get_access_token()?)?;
        let domain = session
            .oauth1
            .domain
            .clone()
            .unwrap_or_else(|| self.settings.garmin_domain.clone());
        let token = session.bearer()?.clone();
        Ok((GarminClient::new(&domain), token))
    }

    pub fn mirror(&self) -> Result<MirrorDb> {
        if let Some(parent) = self.settings.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::config::ensure_dir(parent)?;
        }
        MirrorDb::open(&self.settings.db_path)
    }
}
