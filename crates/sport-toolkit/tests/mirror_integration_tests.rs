//! Integration tests for the export pipeline and the cross-vendor analyses
//!
//! Strava and Garmin are mocked with wiremock; the mirror runs in memory.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sport_toolkit::client::{GarminClient, OAuth2Token, RateLimitExceeded, StravaClient};
use sport_toolkit::error::{Result, SportError};
use sport_toolkit::export::{Exporter, FailFast, RateLimitHandler, Strategy};
use sport_toolkit::storage::MirrorDb;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUN_ID: u64 = 10646953226;
const RIDE_ID: u64 = 10601234567;
const GARMIN_RUN_ID: u64 = 13269914367;

fn test_token() -> OAuth2Token {
    OAuth2Token {
        scope: "test".to_string(),
        jti: "test-jti".to_string(),
        token_type: "Bearer".to_string(),
        access_token: "test-access-token".to_string(),
        refresh_token: "test-refresh-token".to_string(),
        expires_in: 3600,
        expires_at: chrono::Utc::now().timestamp() + 3600,
        refresh_token_expires_in: 86400,
        refresh_token_expires_at: chrono::Utc::now().timestamp() + 86400,
    }
}

fn strava_client(mock_server: &MockServer) -> StravaClient {
    StravaClient::new_with_base_url(&mock_server.uri(), "strava-token")
}

/// Counts quota hits and retries straight away
#[derive(Clone, Default)]
struct RetryImmediately {
    calls: Arc<AtomicU32>,
}

impl RateLimitHandler for RetryImmediately {
    async fn on_rate_limited(&mut self, _limit: &RateLimitExceeded) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Page 1 serves the fixture, page 2 is past the end
async fn mount_summary_pages(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .with_priority(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/strava_activities_page1.json")),
        )
        .mount(mock_server)
        .await;
}

async fn mount_run_details(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/activities/{}", RUN_ID)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/strava_activity_details.json")),
        )
        .mount(mock_server)
        .await;
}

mod export_tests {
    use super::*;

    #[tokio::test]
    async fn test_export_summaries_is_idempotent() {
        let mock_server = MockServer::start().await;
        mount_summary_pages(&mock_server).await;

        let client = strava_client(&mock_server);
        let db = MirrorDb::open_in_memory().unwrap();

        let stats = Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await
            .expect("Failed to export summaries");
        assert_eq!((stats.created, stats.updated, stats.unchanged), (2, 0, 0));
        assert_eq!(db.total_activities().unwrap(), 2);

        let run = db.get_activity(RUN_ID).unwrap().unwrap();
        assert_eq!(run.name, "Morning Run");
        assert_eq!(run.heartrate_avg, Some(151.2));
        assert_eq!(run.description, None);
        let ride = db.get_activity(RIDE_ID).unwrap().unwrap();
        assert_eq!(ride.heartrate_avg, None);

        let again = Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await
            .unwrap();
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.total(), 2);
    }

    #[tokio::test]
    async fn test_summaries_reject_only_missing() {
        let mock_server = MockServer::start().await;
        let client = strava_client(&mock_server);
        let db = MirrorDb::open_in_memory().unwrap();

        let result = Exporter::new(&client, &db, Strategy::OnlyMissing, FailFast)
            .export_summaries()
            .await;
        assert!(matches!(result, Err(SportError::InvalidStrategy(_))));
    }

    #[tokio::test]
    async fn test_export_details_only_missing() {
        let mock_server = MockServer::start().await;
        mount_summary_pages(&mock_server).await;
        mount_run_details(&mock_server).await;

        let client = strava_client(&mock_server);
        let db = MirrorDb::open_in_memory().unwrap();
        Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await
            .unwrap();

        // Only the run falls inside the window.
        let after = chrono::DateTime::parse_from_rfc3339("2024-01-05T00:00:00+01:00")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let stats = Exporter::new(&client, &db, Strategy::OnlyMissing, FailFast)
            .after(Some(after))
            .export_details()
            .await
            .expect("Failed to export details");
        assert_eq!(stats.created, 1);

        let run = db.get_activity(RUN_ID).unwrap().unwrap();
        assert_eq!(run.description.as_deref(), Some("Easy loop along the river"));
        assert_eq!(run.gear_name.as_deref(), Some("Pegasus 40"));
        assert!(db.get_raw_details(RUN_ID).unwrap().is_some());

        // Nothing left to fetch, and a later summary pass keeps the details.
        let stats = Exporter::new(&client, &db, Strategy::OnlyMissing, FailFast)
            .after(Some(after))
            .export_details()
            .await
            .unwrap();
        assert_eq!(stats.total(), 0);

        Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await
            .unwrap();
        let run = db.get_activity(RUN_ID).unwrap().unwrap();
        assert_eq!(run.description.as_deref(), Some("Easy loop along the river"));
    }

    #[tokio::test]
    async fn test_details_retry_after_rate_limit() {
        let mock_server = MockServer::start().await;
        mount_summary_pages(&mock_server).await;

        Mock::given(method("GET"))
            .and(path(format!("/activities/{}", RUN_ID)))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;
        mount_run_details(&mock_server).await;

        let client = strava_client(&mock_server);
        let db = MirrorDb::open_in_memory().unwrap();
        Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await
            .unwrap();
        // Keep the ride out of the details pass.
        let ride_start = chrono::DateTime::parse_from_rfc3339("2024-01-02T08:05:10Z")
            .unwrap()
            .with_timezone(&chrono::Utc);

        let handler = RetryImmediately::default();
        let calls = Arc::clone(&handler.calls);
        let stats = Exporter::new(&client, &db, Strategy::OverwriteIfChanged, handler)
            .after(Some(ride_start + chrono::Duration::seconds(1)))
            .export_details()
            .await
            .expect("Export should resume after the rate limit");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.created, 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_on_rate_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/athlete/activities"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = strava_client(&mock_server);
        let db = MirrorDb::open_in_memory().unwrap();
        let result = Exporter::new(&client, &db, Strategy::OverwriteIfChanged, FailFast)
            .export_summaries()
            .await;

        assert!(matches!(result, Err(SportError::RateLimited(_))));
        assert_eq!(db.total_activities().unwrap(), 0);
    }
}

mod analysis_tests {
    use super::*;
    use sport_toolkit::analysis::{
        compare_heart_rate, search_garmin_activity_matching_strava,
        search_strava_activity_matching_garmin,
    };

    fn strava_page() -> Vec<Value> {
        serde_json::from_str(include_str!("fixtures/strava_activities_page1.json")).unwrap()
    }

    async fn mount_garmin_run(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/activity-service/activity/{}", GARMIN_RUN_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("fixtures/garmin_activity_summary.json")),
            )
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_matching_garmin_activity() {
        let strava_server = MockServer::start().await;
        let garmin_server = MockServer::start().await;
        mount_run_details(&strava_server).await;

        Mock::given(method("GET"))
            .and(path("/mobile-gateway/heartRate/forDate/2024-01-06"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("fixtures/garmin_day_activities.json")),
            )
            .mount(&garmin_server)
            .await;

        let found = search_garmin_activity_matching_strava(
            &strava_client(&strava_server),
            &GarminClient::new_with_base_url(&garmin_server.uri()),
            &test_token(),
            RUN_ID,
        )
        .await
        .expect("Expected a match");

        assert_eq!(found.activity_id, GARMIN_RUN_ID);
    }

    #[tokio::test]
    async fn test_matching_garmin_activity_not_found() {
        let strava_server = MockServer::start().await;
        let garmin_server = MockServer::start().await;
        mount_run_details(&strava_server).await;

        Mock::given(method("GET"))
            .and(path("/mobile-gateway/heartRate/forDate/2024-01-06"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ActivitiesForDay": {"payload": []}}"#),
            )
            .mount(&garmin_server)
            .await;

        let result = search_garmin_activity_matching_strava(
            &strava_client(&strava_server),
            &GarminClient::new_with_base_url(&garmin_server.uri()),
            &test_token(),
            RUN_ID,
        )
        .await;

        assert!(matches!(result, Err(SportError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_matching_strava_activity() {
        let strava_server = MockServer::start().await;
        let garmin_server = MockServer::start().await;
        mount_garmin_run(&garmin_server).await;

        // 16:20:03 GMT, five minutes either side
        Mock::given(method("GET"))
            .and(path("/athlete/activities"))
            .and(query_param("after", "1704557703"))
            .and(query_param("before", "1704558303"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![strava_page()[0].clone()]))
            .mount(&strava_server)
            .await;

        let found = search_strava_activity_matching_garmin(
            &GarminClient::new_with_base_url(&garmin_server.uri()),
            &test_token(),
            &strava_client(&strava_server),
            GARMIN_RUN_ID,
        )
        .await
        .expect("Expected a match");

        assert_eq!(found.id, RUN_ID);
        assert_eq!(found.url(), "https://www.strava.com/activities/10646953226");
    }

    #[tokio::test]
    async fn test_matching_strava_activity_ambiguous() {
        let strava_server = MockServer::start().await;
        let garmin_server = MockServer::start().await;
        mount_garmin_run(&garmin_server).await;

        Mock::given(method("GET"))
            .and(path("/athlete/activities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(strava_page()))
            .mount(&strava_server)
            .await;

        let result = search_strava_activity_matching_garmin(
            &GarminClient::new_with_base_url(&garmin_server.uri()),
            &test_token(),
            &strava_client(&strava_server),
            GARMIN_RUN_ID,
        )
        .await;

        assert!(matches!(result, Err(SportError::MultipleActivitiesFound(_))));
    }

    #[tokio::test]
    async fn test_compare_heart_rate() {
        let strava_server = MockServer::start().await;
        let garmin_server = MockServer::start().await;
        mount_run_details(&strava_server).await;
        mount_garmin_run(&garmin_server).await;

        Mock::given(method("GET"))
            .and(path(format!("/activity-service/activity/{}/details", GARMIN_RUN_ID)))
            .and(query_param("maxChartSize", "100000"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("fixtures/garmin_activity_details.json")),
            )
            .mount(&garmin_server)
            .await;

        let comparison = compare_heart_rate(
            &strava_client(&strava_server),
            &GarminClient::new_with_base_url(&garmin_server.uri()),
            &test_token(),
            RUN_ID,
            GARMIN_RUN_ID,
        )
        .await
        .expect("Failed to compare heart rate");

        // (97 + 104 + 178 + 151) / 4, the null sample skipped
        assert!((comparison.avg.computed - 132.5).abs() < 1e-9);
        assert!((comparison.avg.diff - 18.9).abs() < 1e-6);
        assert!(comparison.avg.is_mismatch());
        assert_eq!(comparison.max.diff, 0.0);
        assert_eq!(comparison.min.strava, None);
        assert_eq!(comparison.min.diff, 0.0);
        assert!(comparison.has_mismatch());
    }
}
