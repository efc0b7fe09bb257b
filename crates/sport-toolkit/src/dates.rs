//! Date and time parsing shared by the clients, the mirror and the CLI

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Result, SportError};

/// Parse an RFC 3339 timestamp. A timestamp without offset is rejected as
/// naive rather than assumed to be UTC.
pub fn parse_aware(value: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    if parse_naive(value).is_some() {
        return Err(SportError::NaiveDatetime(value.to_string()));
    }
    Err(SportError::InvalidDatetime(value.to_string()))
}

/// Parse a `YYYY-MM-DD` day
pub fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| SportError::InvalidDateFormat(value.to_string()))
}

/// Parse a Garmin GMT timestamp such as `2025-03-22 16:31:16` or
/// `2025-03-22T16:31:16.0`. Garmin omits the offset; these are UTC.
pub fn parse_gmt(value: &str) -> Result<DateTime<Utc>> {
    parse_naive(value)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SportError::InvalidDatetime(value.to_string()))
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_aware_keeps_offset() {
        let parsed = parse_aware("2025-01-26T16:00:00+01:00").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 3600);
        assert_eq!(parsed.with_timezone(&Utc).hour(), 15);
        assert!(parse_aware("2024-06-18T09:21:40Z").is_ok());
    }

    #[test]
    fn test_parse_aware_rejects_naive_and_garbage() {
        assert!(matches!(
            parse_aware("2025-01-26T16:00:00"),
            Err(SportError::NaiveDatetime(_))
        ));
        assert!(matches!(
            parse_aware("yesterday"),
            Err(SportError::InvalidDatetime(_))
        ));
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(
            parse_day("2025-03-22").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 22).unwrap()
        );
        assert!(matches!(
            parse_day("22/03/2025"),
            Err(SportError::InvalidDateFormat(_))
        ));
    }

    #[test]
    fn test_parse_gmt_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 22, 16, 31, 16).unwrap();
        assert_eq!(parse_gmt("2025-03-22 16:31:16").unwrap(), expected);
        assert_eq!(parse_gmt("2025-03-22T16:31:16.0").unwrap(), expected);
        assert!(parse_gmt("2025-03-22").is_err());
    }
}
