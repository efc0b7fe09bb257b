use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};

/// Strava allows 100 requests per 15 minutes, reset at :00, :15, :30, :45
const WINDOW_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Strava,
    Garmin,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strava => f.write_str("Strava"),
            Self::Garmin => f.write_str("Garmin Connect"),
        }
    }
}

/// A vendor quota hit, with the earliest time a retry can succeed.
/// Garmin publishes no quota, so its hits reuse the Strava window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    vendor: Vendor,
    hit_at: DateTime<Utc>,
    reset_at: DateTime<Utc>,
}

impl RateLimitExceeded {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// `reset_at` is the next quarter hour strictly after `hit_at`, seconds
    /// zeroed: a hit at 10:15:00 waits until 10:30:00.
    pub fn at(hit_at: DateTime<Utc>) -> Self {
        let minutes_ahead = WINDOW_MINUTES - hit_at.minute() % WINDOW_MINUTES;
        let truncated = hit_at
            - Duration::seconds(i64::from(hit_at.second()))
            - Duration::nanoseconds(i64::from(hit_at.nanosecond()));
        Self {
            vendor: Vendor::Strava,
            hit_at,
            reset_at: truncated + Duration::minutes(i64::from(minutes_ahead)),
        }
    }

    pub fn for_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn hit_at(&self) -> DateTime<Utc> {
        self.hit_at
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    /// Time left until `reset_at`, zero once it has passed
    pub fn wait_duration(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_at - now).to_std().unwrap_or_default()
    }
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor {
            Vendor::Strava => write!(
                f,
                "Rate limited by Strava: probably exceeded 100 requests per 15 minutes \
                 (hit at {}, wait until {}). The daily limit of 1000 requests resets at midnight UTC.",
                self.hit_at.to_rfc3339(),
                self.reset_at.to_rfc3339()
            ),
            vendor => write!(
                f,
                "Rate limited by {} (hit at {}, wait until {})",
                vendor,
                self.hit_at.to_rfc3339(),
                self.reset_at.to_rfc3339()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 26, h, m, s).unwrap()
    }

    #[test]
    fn test_reset_at_next_quarter_hour() {
        assert_eq!(RateLimitExceeded::at(utc(10, 7, 12)).reset_at(), utc(10, 15, 0));
        assert_eq!(RateLimitExceeded::at(utc(10, 44, 59)).reset_at(), utc(10, 45, 0));
        assert_eq!(RateLimitExceeded::at(utc(10, 46, 0)).reset_at(), utc(11, 0, 0));
    }

    #[test]
    fn test_hit_on_boundary_waits_full_window() {
        assert_eq!(RateLimitExceeded::at(utc(10, 15, 0)).reset_at(), utc(10, 30, 0));
    }

    #[test]
    fn test_crosses_midnight() {
        let hit = utc(23, 50, 30);
        let expected = Utc.with_ymd_and_hms(2025, 1, 27, 0, 0, 0).unwrap();
        assert_eq!(RateLimitExceeded::at(hit).reset_at(), expected);
    }

    #[test]
    fn test_wait_duration() {
        let limit = RateLimitExceeded::at(utc(10, 7, 0));
        assert_eq!(
            limit.wait_duration(utc(10, 14, 0)),
            std::time::Duration::from_secs(60)
        );
        assert_eq!(limit.wait_duration(utc(10, 20, 0)), std::time::Duration::ZERO);
    }

    #[test]
    fn test_display_mentions_daily_limit() {
        let message = RateLimitExceeded::at(utc(9, 0, 1)).to_string();
        assert!(message.contains("midnight UTC"));
        assert!(message.contains("09:15:00"));
    }

    #[test]
    fn test_garmin_display_omits_strava_quota() {
        let limit = RateLimitExceeded::at(utc(9, 0, 1)).for_vendor(Vendor::Garmin);
        assert_eq!(limit.vendor(), Vendor::Garmin);
        let message = limit.to_string();
        assert!(message.starts_with("Rate limited by Garmin Connect"));
        assert!(!message.contains("100 requests"));
        assert!(!message.contains("midnight"));
    }
}
