//! Find the same workout on the other vendor by start time

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::client::garmin::GarminClient;
use crate::client::strava::{ListActivitiesQuery, StravaClient};
use crate::client::tokens::OAuth2Token;
use crate::error::{Result, SportError};
use crate::models::garmin::DayActivity;
use crate::models::strava::StravaActivity;

/// Two start times closer than this belong to the same workout
pub const MATCH_TOLERANCE_SECS: i64 = 60;

/// Half-width of the Strava listing window around a Garmin start
const STRAVA_WINDOW_MINUTES: i64 = 5;

fn starts_match(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (a - b).num_seconds().abs() < MATCH_TOLERANCE_SECS
}

/// The Garmin activity recorded together with a Strava activity.
///
/// Lists the Garmin activities of the (UTC) day the Strava activity started
/// and returns the first one starting within a minute of it.
pub async fn search_garmin_activity_matching_strava(
    strava: &StravaClient,
    garmin: &GarminClient,
    garmin_token: &OAuth2Token,
    strava_activity_id: u64,
) -> Result<DayActivity> {
    let details = strava.get_activity_details(strava_activity_id).await?;
    let start = details.summary.start_date_utc()?;

    let day = start.format("%Y-%m-%d").to_string();
    let listing = garmin.list_activities(garmin_token, &day).await?;
    for activity in listing.activities() {
        let Some(garmin_start) = activity.start_time_utc()? else {
            continue;
        };
        if starts_match(start, garmin_start) {
            info!(activity_id = activity.activity_id, "Matching Garmin activity found");
            return Ok(activity.clone());
        }
    }

    info!(strava_activity_id, "Matching Garmin activity not found");
    Err(SportError::NotFound("Matching Garmin activity".to_string()))
}

/// The Strava activity recorded together with a Garmin activity.
///
/// Lists Strava activities within five minutes of the Garmin start. One hit
/// within a minute is a match; several hits are reported as an anomaly.
pub async fn search_strava_activity_matching_garmin(
    garmin: &GarminClient,
    garmin_token: &OAuth2Token,
    strava: &StravaClient,
    garmin_activity_id: u64,
) -> Result<StravaActivity> {
    let summary = garmin.get_activity_summary(garmin_token, garmin_activity_id).await?;
    let start = summary.start_time_utc()?.ok_or_else(|| {
        SportError::invalid_response(format!(
            "Garmin activity {} has no startTimeGMT",
            garmin_activity_id
        ))
    })?;

    let window = Duration::minutes(STRAVA_WINDOW_MINUTES);
    let query = ListActivitiesQuery {
        after: Some(start - window),
        before: Some(start + window),
        per_page: Some(1),
        page: 1,
    };
    let mut activities = strava.list_activities(&query).await?;

    match activities.len() {
        1 => {
            let activity = activities.remove(0);
            if starts_match(activity.start_date_utc()?, start) {
                info!(activity_id = activity.id, url = %activity.url(), "Matching Strava activity found");
                return Ok(activity);
            }
        }
        n if n > 1 => {
            return Err(SportError::MultipleActivitiesFound(format!(
                "{} Strava activities start around {}",
                n,
                start.to_rfc3339()
            )));
        }
        _ => {}
    }

    info!(garmin_activity_id, "Matching Strava activity not found");
    Err(SportError::NotFound("Matching Strava activity".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_starts_match_tolerance() {
        let a = Utc.with_ymd_and_hms(2024, 1, 6, 16, 20, 0).unwrap();
        assert!(starts_match(a, a + Duration::seconds(59)));
        assert!(starts_match(a + Duration::seconds(59), a));
        assert!(!starts_match(a, a + Duration::seconds(60)));
        assert!(!starts_match(a - Duration::seconds(61), a));
    }
}
