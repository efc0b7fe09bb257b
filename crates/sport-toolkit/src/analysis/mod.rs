//! Cross-vendor lookups and queries over the local mirror

pub mod compare;
pub mod count;
pub mod search;

pub use compare::{compare_heart_rate, GarminHeartRate, HeartRateComparison, HeartRateDiff};
pub use count::{count_activities_db, search_text_db, validate_activity_type, ACTIVITY_TYPES};
pub use search::{
    search_garmin_activity_matching_strava, search_strava_activity_matching_garmin,
    MATCH_TOLERANCE_SECS,
};
