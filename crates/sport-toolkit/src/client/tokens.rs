use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SportError};

/// Strava OAuth2 token, as stored in `strava-api-token.json` and returned by
/// the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StravaToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl StravaToken {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Garmin OAuth1 token obtained after SSO login.
/// Long-lived (~1 year); only carried along with the session here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<i64>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Garmin OAuth2 Bearer token for API requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// A Garmin Connect session: the `[oauth1, oauth2]` pair written by the
/// Garmin login flow, either as plain JSON or base64 encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct GarminSession {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

impl GarminSession {
    pub fn decode(stored: &str) -> Result<Self> {
        let stored = stored.trim();
        let json = if stored.starts_with('[') {
            stored.as_bytes().to_vec()
        } else {
            STANDARD.decode(stored).map_err(|e| {
                SportError::config(format!("Garmin session is neither JSON nor base64: {}", e))
            })?
        };
        let (oauth1, oauth2): (OAuth1Token, OAuth2Token) = serde_json::from_slice(&json)?;
        Ok(Self { oauth1, oauth2 })
    }

    /// Base64 encoded `[oauth1, oauth2]`, the format `decode` reads back
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(&(&self.oauth1, &self.oauth2))?;
        Ok(STANDARD.encode(json))
    }

    /// The bearer token, or `NotAuthenticated` once it has expired
    pub fn bearer(&self) -> Result<&OAuth2Token> {
        if self.oauth2.is_expired() {
            return Err(SportError::NotAuthenticated);
        }
        Ok(&self.oauth2)
    }
}
