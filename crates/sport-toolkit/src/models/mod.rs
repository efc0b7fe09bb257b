//! Vendor response models

pub mod garmin;
pub mod strava;

pub use garmin::{DayActivities, DayActivity, GarminActivityDetails, GarminActivitySummary};
pub use strava::{
    ActivityUpdate, NewActivity, StravaActivity, StravaActivityDetails, StravaStreams, StreamType,
};
