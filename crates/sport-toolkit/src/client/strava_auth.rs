//! Strava access token lifecycle: load from a store, refresh when expired,
//! write the refreshed token back.

use reqwest::Client;
use tracing::info;

use crate::client::tokens::StravaToken;
use crate::config::TokenStore;
use crate::error::{Result, SportError};

const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

pub struct StravaTokenManager {
    store: Box<dyn TokenStore>,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: String,
    skip_refresh: bool,
    client: Client,
    token: Option<StravaToken>,
}

impl StravaTokenManager {
    pub fn new(
        store: Box<dyn TokenStore>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            client_id,
            client_secret,
            token_url: STRAVA_TOKEN_URL.to_string(),
            skip_refresh: false,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            token: None,
        }
    }

    /// Use a custom token endpoint (for testing)
    #[doc(hidden)]
    pub fn with_token_url(mut self, url: &str) -> Self {
        self.token_url = url.to_string();
        self
    }

    /// Never refresh, even an expired token. Used when replaying recorded
    /// sessions whose token expired long ago.
    pub fn skip_refresh(mut self, skip: bool) -> Self {
        self.skip_refresh = skip;
        self
    }

    /// Current access token, refreshed and persisted first if it expired
    pub async fn get_access_token(&mut self) -> Result<String> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                let token = self.load()?;
                self.token = Some(token.clone());
                token
            }
        };
        if !token.is_expired() || self.skip_refresh {
            return Ok(token.access_token);
        }

        info!("Strava access token expired, refreshing");
        let refreshed = self.refresh(&token).await?;
        self.store
            .store_access_token(&serde_json::to_string_pretty(&refreshed)?)?;
        let access_token = refreshed.access_token.clone();
        self.token = Some(refreshed);
        Ok(access_token)
    }

    fn load(&self) -> Result<StravaToken> {
        let content = self.store.get_access_token()?;
        serde_json::from_str(&content).map_err(|e| {
            SportError::config(format!(
                "Invalid Strava token in {}: {}",
                self.store.describe(),
                e
            ))
        })
    }

    async fn refresh(&self, token: &StravaToken) -> Result<StravaToken> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(SportError::config(
                    "STRAVA_CLIENT_ID and STRAVA_CLIENT_SECRET are required to refresh the token",
                ))
            }
        };

        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", token.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(SportError::Http)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(SportError::NotAuthenticated);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SportError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response.json().await.map_err(|e| {
            SportError::invalid_response(format!("Failed to parse token refresh response: {}", e))
        })
    }
}
