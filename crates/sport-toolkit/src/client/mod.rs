pub mod garmin;
pub mod rate_limit;
pub mod strava;
pub mod strava_auth;
pub mod tokens;

pub use garmin::{DetailsOptions, GarminClient};
pub use rate_limit::{RateLimitExceeded, Vendor};
pub use strava::{ListActivitiesQuery, StravaClient};
pub use strava_auth::StravaTokenManager;
pub use tokens::{GarminSession, OAuth1Token, OAuth2Token, StravaToken};
