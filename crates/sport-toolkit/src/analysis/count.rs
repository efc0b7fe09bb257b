use chrono::Utc;
use tracing::info;

use crate::dates::parse_aware;
use crate::error::{Result, SportError};
use crate::storage::{ActivityRow, CountFilter, MirrorDb};

/// Activity types accepted by the `db count` filter
pub const ACTIVITY_TYPES: [&str; 12] = [
    "BackcountrySki",
    "Hike",
    "Kayaking",
    "NordicSki",
    "Ride",
    "RockClimbing",
    "Run",
    "Snowboard",
    "Snowshoe",
    "Walk",
    "WeightTraining",
    "Workout",
];

/// Case-insensitive lookup in [`ACTIVITY_TYPES`], returning the canonical name
pub fn validate_activity_type(activity_type: &str) -> Result<&'static str> {
    ACTIVITY_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(activity_type))
        .copied()
        .ok_or_else(|| SportError::UnknownActivityType(activity_type.to_string()))
}

/// Count the mirrored activities matching the filters.
///
/// Dates must carry an offset (`2024-01-01T00:00:01+01:00`); naive values
/// are rejected with `NaiveDatetime`.
pub fn count_activities_db(
    db: &MirrorDb,
    start_date_after: Option<&str>,
    start_date_before: Option<&str>,
    activity_type: Option<&str>,
) -> Result<u64> {
    let mut filter = CountFilter::default();

    if let Some(after) = start_date_after {
        let after = parse_aware(after)?;
        info!(start_date_after = %after.to_rfc3339(), "Filter");
        filter.start_date_after = Some(after.with_timezone(&Utc));
    }
    if let Some(before) = start_date_before {
        let before = parse_aware(before)?;
        info!(start_date_before = %before.to_rfc3339(), "Filter");
        filter.start_date_before = Some(before.with_timezone(&Utc));
    }
    if let Some(activity_type) = activity_type {
        let canonical = validate_activity_type(activity_type)?;
        info!(activity_type = canonical, "Filter");
        filter.activity_type = Some(canonical.to_string());
    }

    let count = db.count_activities(&filter)?;
    info!(count, total = db.total_activities()?, "Counted mirrored activities");
    Ok(count)
}

/// Mirrored activities whose name or description contains `text`
pub fn search_text_db(db: &MirrorDb, text: &str) -> Result<Vec<ActivityRow>> {
    let found = db.search_text(text)?;
    info!(text, count = found.len(), "Text search");
    Ok(found)
}
