use std::fmt;

/// Semantic name of a per-sample metric.
///
/// The variants are vendor independent; [`MetricKey::from_vendor_key`] holds
/// the table that maps Garmin Connect descriptor keys onto them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKey {
    /// GMT timestamp of the sample, in milliseconds
    Timestamp,
    /// Seconds since start, pauses included
    ElapsedTime,
    /// Seconds since start while the athlete was actually moving
    MovingTime,
    /// Seconds since start excluding device pauses
    NonPausedTime,
    /// Meters since start
    Distance,
    /// Meters per second
    Speed,
    Latitude,
    Longitude,
    /// Meters
    Altitude,
    /// Beats per minute
    HeartRate,
}

impl MetricKey {
    pub const ALL: [MetricKey; 10] = [
        MetricKey::Timestamp,
        MetricKey::ElapsedTime,
        MetricKey::MovingTime,
        MetricKey::NonPausedTime,
        MetricKey::Distance,
        MetricKey::Speed,
        MetricKey::Latitude,
        MetricKey::Longitude,
        MetricKey::Altitude,
        MetricKey::HeartRate,
    ];

    /// Map a Garmin Connect descriptor key to its semantic name.
    /// Unknown keys return `None` so new vendor metrics are ignored.
    pub fn from_vendor_key(key: &str) -> Option<Self> {
        match key {
            "directTimestamp" => Some(Self::Timestamp),
            "sumElapsedDuration" => Some(Self::ElapsedTime),
            "sumMovingDuration" => Some(Self::MovingTime),
            "sumDuration" => Some(Self::NonPausedTime),
            "sumDistance" => Some(Self::Distance),
            "directSpeed" => Some(Self::Speed),
            "directLatitude" => Some(Self::Latitude),
            "directLongitude" => Some(Self::Longitude),
            "directElevation" => Some(Self::Altitude),
            "directHeartRate" => Some(Self::HeartRate),
            _ => None,
        }
    }

    /// The Garmin Connect descriptor key for this metric
    pub fn vendor_key(self) -> &'static str {
        match self {
            Self::Timestamp => "directTimestamp",
            Self::ElapsedTime => "sumElapsedDuration",
            Self::MovingTime => "sumMovingDuration",
            Self::NonPausedTime => "sumDuration",
            Self::Distance => "sumDistance",
            Self::Speed => "directSpeed",
            Self::Latitude => "directLatitude",
            Self::Longitude => "directLongitude",
            Self::Altitude => "directElevation",
            Self::HeartRate => "directHeartRate",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::ElapsedTime => "elapsed_time",
            Self::MovingTime => "moving_time",
            Self::NonPausedTime => "non_paused_time",
            Self::Distance => "distance",
            Self::Speed => "speed",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Altitude => "altitude",
            Self::HeartRate => "heart_rate",
        }
    }

    /// Whether the vendor is known to emit null samples for this metric
    /// (sensor or GPS dropout). Not enforced during extraction.
    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            Self::HeartRate | Self::Speed | Self::Latitude | Self::Longitude
        )
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_key_table_round_trips() {
        for key in MetricKey::ALL {
            assert_eq!(MetricKey::from_vendor_key(key.vendor_key()), Some(key));
        }
    }

    #[test]
    fn test_unknown_vendor_keys_are_ignored() {
        assert_eq!(MetricKey::from_vendor_key("directBodyBattery"), None);
        assert_eq!(MetricKey::from_vendor_key("directheartrate"), None);
        assert_eq!(MetricKey::from_vendor_key(""), None);
    }

    #[test]
    fn test_nullable_metrics() {
        assert!(MetricKey::HeartRate.is_nullable());
        assert!(MetricKey::Latitude.is_nullable());
        assert!(!MetricKey::ElapsedTime.is_nullable());
        assert!(!MetricKey::Distance.is_nullable());
    }

    #[test]
    fn test_display() {
        assert_eq!(MetricKey::NonPausedTime.to_string(), "non_paused_time");
    }
}
