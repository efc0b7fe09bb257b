//! Strava REST API client
//!
//! Every call carries the bearer token the client was built with. Quota hits
//! surface as `SportError::RateLimited`; the client never retries on its own.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::client::rate_limit::RateLimitExceeded;
use crate::error::{Result, SportError};
use crate::models::strava::{
    ActivityUpdate, NewActivity, StravaActivity, StravaActivityDetails, StravaStreams, StreamType,
};

const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";

/// How far around a new activity's start to look for an existing one
const DUPLICATE_WINDOW_MINUTES: i64 = 75;

/// Filters for `GET /athlete/activities`
#[derive(Debug, Clone, PartialEq)]
pub struct ListActivitiesQuery {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub per_page: Option<u32>,
    /// 1-based
    pub page: u32,
}

impl Default for ListActivitiesQuery {
    fn default() -> Self {
        Self {
            after: None,
            before: None,
            per_page: None,
            page: 1,
        }
    }
}

impl ListActivitiesQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(before) = self.before {
            params.push(("before", before.timestamp().to_string()));
        }
        if let Some(after) = self.after {
            params.push(("after", after.timestamp().to_string()));
        }
        if let Some(per_page) = self.per_page {
            params.push(("per_page", per_page.to_string()));
        }
        if self.page != 1 {
            params.push(("page", self.page.to_string()));
        }
        params
    }
}

/// Strava's error body: `{"message": "...", "errors": [{"field", "code"}]}`
#[derive(Debug, Default, Deserialize)]
struct FaultBody {
    #[serde(default)]
    errors: Vec<FaultDetail>,
}

#[derive(Debug, Deserialize)]
struct FaultDetail {
    #[serde(default)]
    field: String,
    #[serde(default)]
    code: String,
}

fn has_fault(message: &str, field: &str, code: &str) -> bool {
    serde_json::from_str::<FaultBody>(message)
        .unwrap_or_default()
        .errors
        .iter()
        .any(|e| e.field == field && e.code == code)
}

/// Strava API client
pub struct StravaClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl StravaClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::new_with_base_url(STRAVA_API_URL, access_token)
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| SportError::config("Strava access token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// List my activities, newest first, filtered by start date
    pub async fn list_activities(&self, query: &ListActivitiesQuery) -> Result<Vec<StravaActivity>> {
        self.list_activities_raw(query)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(SportError::from))
            .collect()
    }

    /// Same as [`list_activities`](Self::list_activities) but keeps each
    /// activity as the JSON Strava sent
    pub async fn list_activities_raw(&self, query: &ListActivitiesQuery) -> Result<Vec<Value>> {
        info!(page = query.page, "Listing Strava activities");
        let response = self
            .client
            .get(self.build_url("/athlete/activities"))
            .headers(self.build_headers()?)
            .query(&query.params())
            .send()
            .await
            .map_err(SportError::Http)?;

        let response = self
            .handle_response_status(response, None)
            .await
            .map_err(|e| match e {
                SportError::Api { ref message, .. } if has_fault(message, "after", "future") => {
                    SportError::AfterTsInTheFuture
                }
                other => other,
            })?;

        let activities: Vec<Value> = parse_json(response).await?;
        if query.page != 1 && activities.is_empty() {
            return Err(SportError::RequestedPageDoesNotExist(query.page));
        }
        Ok(activities)
    }

    pub async fn get_activity_details(&self, activity_id: u64) -> Result<StravaActivityDetails> {
        info!(activity_id, "Getting Strava activity details");
        let response = self
            .client
            .get(self.build_url(&format!("/activities/{}", activity_id)))
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(SportError::Http)?;

        let response = self.handle_response_status(response, Some(activity_id)).await?;
        StravaActivityDetails::from_json(parse_json(response).await?)
    }

    pub async fn update_activity(
        &self,
        activity_id: u64,
        update: &ActivityUpdate,
    ) -> Result<StravaActivityDetails> {
        info!(activity_id, "Updating Strava activity");
        let response = self
            .client
            .put(self.build_url(&format!("/activities/{}", activity_id)))
            .headers(self.build_headers()?)
            .form(update)
            .send()
            .await
            .map_err(SportError::Http)?;

        let response = self.handle_response_status(response, Some(activity_id)).await?;
        StravaActivityDetails::from_json(parse_json(response).await?)
    }

    /// Create a manual activity.
    ///
    /// With `detect_duplicates`, an existing activity of the same type starting
    /// within 1h15m is reported as `PossibleDuplicatedActivity` instead.
    pub async fn create_activity(
        &self,
        activity: &NewActivity,
        detect_duplicates: bool,
    ) -> Result<StravaActivityDetails> {
        info!(name = %activity.name, "Creating Strava activity");

        if detect_duplicates {
            let start = activity.start_date.with_timezone(&Utc);
            let window = Duration::minutes(DUPLICATE_WINDOW_MINUTES);
            let query = ListActivitiesQuery {
                after: Some(start - window),
                before: Some(start + window),
                ..Default::default()
            };
            let existing = self.list_activities(&query).await?;
            if let Some(duplicate) = existing.iter().find(|a| a.is_of_type(&activity.sport_type)) {
                info!(activity_id = duplicate.id, "Found possible duplicate");
                return Err(SportError::PossibleDuplicatedActivity(Some(duplicate.id)));
            }
        }

        let response = self
            .client
            .post(self.build_url("/activities"))
            .headers(self.build_headers()?)
            .form(&activity.form())
            .send()
            .await
            .map_err(SportError::Http)?;

        if response.status() == StatusCode::CONFLICT {
            return Err(SportError::PossibleDuplicatedActivity(None));
        }
        let response = self
            .handle_response_status(response, None)
            .await
            .map_err(|e| match e {
                SportError::Api { ref message, .. }
                    if has_fault(message, "sport_type", "invalid") =>
                {
                    SportError::SportTypeInvalid(activity.sport_type.clone())
                }
                other => other,
            })?;
        StravaActivityDetails::from_json(parse_json(response).await?)
    }

    /// Fetch the given streams of an activity
    pub async fn get_streams(
        &self,
        activity_id: u64,
        stream_types: &[StreamType],
    ) -> Result<StravaStreams> {
        if stream_types.is_empty() {
            return Err(SportError::invalid_param("at least one stream type is required"));
        }
        let keys: Vec<&str> = stream_types.iter().map(|t| t.as_str()).collect();
        info!(activity_id, keys = %keys.join(","), "Getting Strava streams");

        let response = self
            .client
            .get(self.build_url(&format!("/activities/{}/streams", activity_id)))
            .headers(self.build_headers()?)
            .query(&[("keys", keys.join(","))])
            .send()
            .await
            .map_err(SportError::Http)?;

        let response = self.handle_response_status(response, Some(activity_id)).await?;
        StravaStreams::from_json(parse_json(response).await?)
    }

    /// Handle response status codes and convert to errors
    async fn handle_response_status(
        &self,
        response: Response,
        activity_id: Option<u64>,
    ) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match (status, activity_id) {
            (StatusCode::UNAUTHORIZED, _) => Err(SportError::NotAuthenticated),
            (StatusCode::TOO_MANY_REQUESTS, _) => {
                Err(SportError::RateLimited(RateLimitExceeded::now()))
            }
            (StatusCode::NOT_FOUND, Some(id)) => Err(SportError::ActivityNotFound(id)),
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

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response.json().await.map_err(|e| {
        SportError::invalid_response(format!("Failed to parse JSON response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_url() {
        let client = StravaClient::new("token");
        assert_eq!(
            client.build_url("/activities/1"),
            "https://www.strava.com/api/v3/activities/1"
        );
    }

    #[test]
    fn test_query_params() {
        let query = ListActivitiesQuery {
            after: Some(Utc.with_ymd_and_hms(2024, 6, 19, 22, 0, 0).unwrap()),
            before: None,
            per_page: Some(100),
            page: 1,
        };
        assert_eq!(
            query.params(),
            vec![
                ("after", "1718834400".to_string()),
                ("per_page", "100".to_string())
            ]
        );

        let second_page = ListActivitiesQuery {
            page: 2,
            ..Default::default()
        };
        assert_eq!(second_page.params(), vec![("page", "2".to_string())]);
    }

    #[test]
    fn test_fault_detection() {
        let body = r#"{"message": "Bad Request",
            "errors": [{"resource": "Activity", "field": "after", "code": "future"}]}"#;
        assert!(has_fault(body, "after", "future"));
        assert!(!has_fault(body, "sport_type", "invalid"));
        assert!(!has_fault("<html>oops</html>", "after", "future"));
    }
}
