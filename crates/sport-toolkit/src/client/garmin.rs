//! Garmin Connect API client for authenticated requests
//!
//! Talks to the same backend the Garmin Connect mobile app uses, with the
//! OAuth2 bearer token of a stored session.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::client::rate_limit::{RateLimitExceeded, Vendor};
use crate::client::tokens::OAuth2Token;
use crate::dates::parse_day;
use crate::error::{Result, SportError};
use crate::models::garmin::{DayActivities, GarminActivityDetails, GarminActivitySummary};

/// User agent for Connect API requests
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Chart and polyline sizes for the activity details endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailsOptions {
    /// Upper bound on samples per stream. Garmin subsamples to a nearby
    /// count, not exactly this one.
    pub max_metrics_data_count: u32,
    pub include_polyline: bool,
    pub max_polyline_count: u32,
    /// Keep the raw JSON on the parsed response
    pub keep_raw: bool,
}

impl Default for DetailsOptions {
    fn default() -> Self {
        Self {
            max_metrics_data_count: 2000,
            include_polyline: false,
            max_polyline_count: 4000,
            keep_raw: false,
        }
    }
}

impl DetailsOptions {
    fn polyline_size(&self) -> u32 {
        if self.include_polyline {
            self.max_polyline_count
        } else {
            0
        }
    }
}

/// Garmin Connect API client
pub struct GarminClient {
    client: Client,
    base_url: String,
}

impl GarminClient {
    /// Create a new API client for the given domain
    pub fn new(domain: &str) -> Self {
        Self::new_with_base_url(&format!("https://connectapi.{}", domain))
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the full URL for a given path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with authorization
    fn build_headers(&self, token: &OAuth2Token) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let value = HeaderValue::from_str(&token.authorization_header())
            .map_err(|_| SportError::config("Garmin access token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the response
    pub async fn get(&self, token: &OAuth2Token, path: &str) -> Result<Response> {
        let url = self.build_url(path);
        let headers = self.build_headers(token)?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(SportError::Http)?;

        self.handle_response_status(response, path).await
    }

    /// Make an authenticated GET request and deserialize JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, token: &OAuth2Token, path: &str) -> Result<T> {
        let response = self.get(token, path).await?;
        response.json().await.map_err(|e| {
            SportError::invalid_response(format!("Failed to parse JSON response: {}", e))
        })
    }

    /// List the activities recorded on `day` (`YYYY-MM-DD`)
    pub async fn list_activities(&self, token: &OAuth2Token, day: &str) -> Result<DayActivities> {
        let day = parse_day(day)?;
        info!(%day, "Listing Garmin activities");
        self.get_json(
            token,
            &format!("/mobile-gateway/heartRate/forDate/{}", day.format("%Y-%m-%d")),
        )
        .await
    }

    pub async fn get_activity_summary(
        &self,
        token: &OAuth2Token,
        activity_id: u64,
    ) -> Result<GarminActivitySummary> {
        info!(activity_id, "Getting Garmin activity summary");
        self.get_json(token, &format!("/activity-service/activity/{}", activity_id))
            .await
    }

    /// Per-sample metrics of an activity. The payload can weigh several MB,
    /// so polylines are left out unless requested.
    pub async fn get_activity_details(
        &self,
        token: &OAuth2Token,
        activity_id: u64,
        options: &DetailsOptions,
    ) -> Result<GarminActivityDetails> {
        info!(activity_id, max_metrics = options.max_metrics_data_count, "Getting Garmin activity details");
        let path = format!(
            "/activity-service/activity/{}/details?maxChartSize={}&maxPolylineSize={}",
            activity_id,
            options.max_metrics_data_count,
            options.polyline_size()
        );
        let data: Value = self.get_json(token, &path).await?;
        GarminActivityDetails::from_json(data, options.keep_raw)
    }

    /// Handle response status codes and convert to errors
    async fn handle_response_status(&self, response: Response, path: &str) -> Result<Response> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
                Ok(response)
            }
            StatusCode::UNAUTHORIZED => Err(SportError::NotAuthenticated),
            StatusCode::TOO_MANY_REQUESTS => Err(SportError::RateLimited(
                RateLimitExceeded::now().for_vendor(Vendor::Garmin),
            )),
            StatusCode::NOT_FOUND => Err(SportError::NotFound(path.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SportError::Api {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }
}
