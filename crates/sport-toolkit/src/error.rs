use thiserror::Error;

use crate::client::rate_limit::RateLimitExceeded;
use crate::streams::StreamError;

/// Main error type for sport-toolkit
#[derive(Error, Debug)]
pub enum SportError {
    #[error("Authentication required. The stored token is missing or expired.")]
    NotAuthenticated,

    #[error("{0}")]
    RateLimited(RateLimitExceeded),

    #[error("Activity not found: {0}")]
    ActivityNotFound(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Segment effort not found: id={id}, name='{name}'")]
    SegmentEffortNotFound { id: u64, name: String },

    #[error("Segment {id} is named '{actual}', expected '{expected}'")]
    SegmentNameMismatch {
        id: u64,
        expected: String,
        actual: String,
    },

    #[error("Activity {activity_id}: gear.id={gear_id:?} does not match gear_id={expected:?}")]
    GearIdMismatch {
        activity_id: u64,
        gear_id: Option<String>,
        expected: Option<String>,
    },

    #[error("Activity {activity_id}: heart rate attributes disagree ({detail})")]
    HeartRateMismatch { activity_id: u64, detail: String },

    #[error("Multiple activities found: {0}")]
    MultipleActivitiesFound(String),

    #[error("Possible duplicated activity{}", .0.map(|id| format!(": {}", id)).unwrap_or_default())]
    PossibleDuplicatedActivity(Option<u64>),

    #[error("{0}")]
    Stream(#[from] StreamError),

    #[error("Naive datetime not allowed, a timezone is required: {0}")]
    NaiveDatetime(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Unknown activity type: {0}")]
    UnknownActivityType(String),

    #[error("Invalid stream type: {0}. Allowed: time, distance, latlng, altitude, heartrate, moving")]
    InvalidStreamType(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid sport type: {0}")]
    SportTypeInvalid(String),

    #[error("The 'after' timestamp is in the future")]
    AfterTsInTheFuture,

    #[error("Requested page does not exist: {0}")]
    RequestedPageDoesNotExist(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Keyring error: {0}")]
    Keyring(String),
}

pub type Result<T> = std::result::Result<T, SportError>;

impl SportError {
    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid response error from a message
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid parameter error from a message
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Whether this error is a vendor quota hit the caller may wait out
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Render an error for the terminal, with a hint where one helps
pub fn format_user_error(err: &SportError) -> String {
    match err {
        SportError::NotAuthenticated => format!(
            "{} Refresh the token file or set STRAVA_CLIENT_ID/STRAVA_CLIENT_SECRET.",
            err
        ),
        SportError::RateLimited(limit) => format!(
            "{} Retry after {}.",
            err,
            limit.reset_at().format("%H:%M:%S")
        ),
        SportError::Api { status, message } if message.is_empty() => {
            format!("Vendor API returned status {}", status)
        }
        _ => err.to_string(),
    }
}
