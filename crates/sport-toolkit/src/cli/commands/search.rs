//! Cross-vendor search commands

use crate::analysis;
use crate::error::Result;

use super::session::Context;

const GARMIN_ACTIVITY_URL: &str = "https://connect.garmin.com/modern/activity";

/// Find the Garmin activity recorded together with a Strava activity
pub async fn matching_garmin(ctx: &Context, strava_activity_id: u64) -> Result<()> {
    let strava = ctx.strava().await?;
    let (garmin, token) = ctx.garmin()?;

    let activity = analysis::search_garmin_activity_matching_strava(
        &strava,
        &garmin,
        &token,
        strava_activity_id,
    )
    .await?;

    println!("Matching Garmin activity id: {}", activity.activity_id);
    println!("{}/{}", GARMIN_ACTIVITY_URL, activity.activity_id);
    Ok(())
}

/// Find the Strava activity recorded together with a Garmin activity
pub async fn matching_strava(ctx: &Context, garmin_activity_id: u64) -> Result<()> {
    let (garmin, token) = ctx.garmin()?;
    let strava = ctx.strava().await?;

    let activity =
        analysis::search_strava_activity_matching_garmin(&garmin, &token, &strava, garmin_activity_id)
            .await?;

    println!("Matching Strava activity id: {}", activity.id);
    println!("{}", activity.url());
    Ok(())
}
