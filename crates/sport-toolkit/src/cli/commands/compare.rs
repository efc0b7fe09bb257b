use crate::analysis;
use crate::error::Result;

use super::session::Context;

/// Compare heart-rate figures of the same workout on Strava and Garmin
pub async fn compare_hr(ctx: &Context, strava_activity_id: u64, garmin_activity_id: u64) -> Result<()> {
    let strava = ctx.strava().await?;
    let (garmin, token) = ctx.garmin()?;

    let comparison = analysis::compare_heart_rate(
        &strava,
        &garmin,
        &token,
        strava_activity_id,
        garmin_activity_id,
    )
    .await?;

    for diff in comparison.diffs() {
        println!("{}", diff);
    }
    if !comparison.has_mismatch() {
        println!("\nAll heart-rate figures agree.");
    }
    Ok(())
}
