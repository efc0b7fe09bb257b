//! Response models for the Garmin Connect backend
//!
//! Field names follow the vendor's camelCase JSON; a few keys (`startTimeGMT`,
//! `summaryDTO`, `averageHR`) need explicit renames.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::parse_gmt;
use crate::error::Result;
use crate::streams::{
    DatasetSizeValidator, MetricDescriptor, MetricDescriptorIndex, MetricKey, RawRecord, Stream,
    StreamError, StreamExtractor, StreamSet,
};

/// Activities recorded on one day, from the heart-rate-for-date endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayActivities {
    #[serde(rename = "ActivitiesForDay")]
    pub activities_for_day: ActivitiesForDay,
}

impl DayActivities {
    pub fn activities(&self) -> &[DayActivity] {
        &self.activities_for_day.payload
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitiesForDay {
    #[serde(default)]
    pub payload: Vec<DayActivity>,
}

/// Activity entry in a day listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayActivity {
    /// Unique activity identifier
    pub activity_id: u64,

    #[serde(default)]
    pub activity_name: Option<String>,

    /// Start time in GMT, `YYYY-MM-DD HH:MM:SS`
    #[serde(default, rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,

    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub duration: Option<f64>,
}

impl DayActivity {
    pub fn start_time_utc(&self) -> Result<Option<DateTime<Utc>>> {
        self.start_time_gmt.as_deref().map(parse_gmt).transpose()
    }
}

/// Activity summary from `/activity-service/activity/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivitySummary {
    pub activity_id: u64,

    #[serde(default)]
    pub activity_name: Option<String>,

    #[serde(rename = "summaryDTO")]
    pub summary: SummaryDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    /// Start time in GMT, `YYYY-MM-DDTHH:MM:SS.f`
    #[serde(default, rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,

    #[serde(default)]
    pub start_time_local: Option<String>,

    /// Distance in meters
    #[serde(default)]
    pub distance: Option<f64>,

    /// Duration in seconds, pauses excluded
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub moving_duration: Option<f64>,

    #[serde(default)]
    pub elapsed_duration: Option<f64>,

    /// Average heart rate in bpm
    #[serde(default, rename = "averageHR")]
    pub average_hr: Option<f64>,

    /// Maximum heart rate in bpm
    #[serde(default, rename = "maxHR")]
    pub max_hr: Option<f64>,

    /// Minimum heart rate in bpm
    #[serde(default, rename = "minHR")]
    pub min_hr: Option<f64>,

    #[serde(default)]
    pub calories: Option<f64>,
}

impl GarminActivitySummary {
    pub fn start_time_utc(&self) -> Result<Option<DateTime<Utc>>> {
        self.summary.start_time_gmt.as_deref().map(parse_gmt).transpose()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivityDetails {
    activity_id: u64,
    total_metrics_count: usize,
    metrics_count: usize,
    #[serde(default)]
    metric_descriptors: Option<Vec<MetricDescriptor>>,
    #[serde(default)]
    activity_detail_metrics: Option<Vec<MetricRecord>>,
}

#[derive(Deserialize)]
struct MetricRecord {
    metrics: RawRecord,
}

/// Per-sample metrics of one Garmin activity.
///
/// `original_size` is the number of samples the device recorded;
/// `streams_size` is the number in this response, lower when the request
/// asked for a subsampled chart. Streams are checked against `streams_size`
/// on first access.
#[derive(Debug)]
pub struct GarminActivityDetails {
    activity_id: u64,
    original_size: usize,
    streams_size: usize,
    streams: StreamSet,
    raw: Option<Value>,
    size_check: OnceLock<std::result::Result<(), StreamError>>,
}

impl GarminActivityDetails {
    /// Parse a details payload. The raw JSON is dropped unless `keep_raw`.
    pub fn from_json(data: Value, keep_raw: bool) -> Result<Self> {
        let raw = keep_raw.then(|| data.clone());
        let parsed: RawActivityDetails = serde_json::from_value(data)?;

        let descriptors = parsed.metric_descriptors.unwrap_or_default();
        let records: Vec<RawRecord> = parsed
            .activity_detail_metrics
            .unwrap_or_default()
            .into_iter()
            .map(|record| record.metrics)
            .collect();

        let index = MetricDescriptorIndex::resolve_all(&descriptors);
        let streams = StreamExtractor::new(&index).extract_available(&records)?;

        Ok(Self {
            activity_id: parsed.activity_id,
            original_size: parsed.total_metrics_count,
            streams_size: parsed.metrics_count,
            streams,
            raw,
            size_check: OnceLock::new(),
        })
    }

    pub fn activity_id(&self) -> u64 {
        self.activity_id
    }

    pub fn original_size(&self) -> usize {
        self.original_size
    }

    pub fn streams_size(&self) -> usize {
        self.streams_size
    }

    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    /// Metrics this response carries a stream for
    pub fn available_metrics(&self) -> Vec<MetricKey> {
        self.streams.iter().map(Stream::key).collect()
    }

    pub fn stream(&self, key: MetricKey) -> std::result::Result<&Stream, StreamError> {
        self.size_check
            .get_or_init(|| {
                DatasetSizeValidator::new(self.streams_size).validate(self.streams.sizes())
            })
            .clone()?;
        self.streams.get(key)
    }

    pub fn timestamp(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Timestamp)
    }

    pub fn elapsed_time(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::ElapsedTime)
    }

    pub fn moving_time(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::MovingTime)
    }

    pub fn non_paused_time(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::NonPausedTime)
    }

    pub fn distance(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Distance)
    }

    pub fn speed(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Speed)
    }

    pub fn latitude(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Latitude)
    }

    pub fn longitude(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Longitude)
    }

    pub fn altitude(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::Altitude)
    }

    pub fn heart_rate(&self) -> std::result::Result<&Stream, StreamError> {
        self.stream(MetricKey::HeartRate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Descriptor layout with heart rate at position 15 and a few vendor
    /// metrics the toolkit does not map.
    fn details_json(samples: usize, declared: usize) -> Value {
        let keys = [
            "directAvailableStamina",
            "directElevation",
            "directAirTemperature",
            "directLatitude",
            "sumElapsedDuration",
            "directLongitude",
            "sumMovingDuration",
            "directBodyBattery",
            "sumDistance",
            "directGradeAdjustedSpeed",
            "directDoubleCadence",
            "sumDuration",
            "directTimestamp",
            "directPotentialStamina",
            "directSpeed",
            "directHeartRate",
        ];
        let descriptors: Vec<Value> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| json!({"metricsIndex": i, "key": key, "unit": {"key": "x"}}))
            .collect();
        let metrics: Vec<Value> = (0..samples)
            .map(|i| {
                let mut row: Vec<Value> = (0..keys.len()).map(|k| json!(k as f64)).collect();
                row[4] = json!(i as f64);
                row[15] = if i % 100 == 7 { Value::Null } else { json!(120.0 + (i % 30) as f64) };
                json!({ "metrics": row })
            })
            .collect();
        json!({
            "activityId": 18606916834u64,
            "measurementCount": keys.len(),
            "metricsCount": declared,
            "totalMetricsCount": 4179,
            "metricDescriptors": descriptors,
            "activityDetailMetrics": metrics,
            "geoPolylineDTO": null,
            "detailsAvailable": true
        })
    }

    #[test]
    fn test_full_response_streams_match_declared_size() {
        let details = GarminActivityDetails::from_json(details_json(4179, 4179), false).unwrap();
        assert_eq!(details.activity_id(), 18606916834);
        assert_eq!(details.original_size(), 4179);
        assert_eq!(details.streams_size(), 4179);

        let hr = details.heart_rate().unwrap();
        assert_eq!(hr.len(), 4179);
        assert!(hr.null_count() > 0);
        assert_eq!(details.elapsed_time().unwrap().values()[4178], Some(4178.0));
        assert_eq!(details.available_metrics().len(), 10);
        for key in details.available_metrics() {
            if !key.is_nullable() {
                assert_eq!(details.stream(key).unwrap().null_count(), 0, "{} has nulls", key);
            }
        }
        assert!(details.raw().is_none());
    }

    #[test]
    fn test_subsampled_response_is_checked_against_streams_size() {
        let details = GarminActivityDetails::from_json(details_json(75, 75), true).unwrap();
        assert_eq!(details.original_size(), 4179);
        assert_eq!(details.streams_size(), 75);
        for key in details.available_metrics() {
            assert_eq!(details.stream(key).unwrap().len(), 75);
        }
        assert!(details.raw().is_some());
    }

    #[test]
    fn test_size_mismatch_surfaces_on_access() {
        let details = GarminActivityDetails::from_json(details_json(74, 75), false).unwrap();
        let err = details.distance().unwrap_err();
        assert!(matches!(
            err,
            StreamError::StreamSize { actual_size: 74, expected_size: 75, .. }
        ));
        assert_eq!(details.heart_rate().unwrap_err(), err);
    }

    #[test]
    fn test_metric_absent_from_descriptors() {
        let mut data = details_json(10, 10);
        let descriptors = data["metricDescriptors"].as_array_mut().unwrap();
        descriptors.retain(|d| d["key"] != "directHeartRate");
        let details = GarminActivityDetails::from_json(data, false).unwrap();
        assert_eq!(
            details.heart_rate().unwrap_err(),
            StreamError::MissingMetric("heart_rate".to_string())
        );
        assert!(details.distance().is_ok());
    }

    #[test]
    fn test_missing_counts_is_json_error() {
        let result = GarminActivityDetails::from_json(json!({"activityId": 1}), false);
        assert!(matches!(result, Err(crate::error::SportError::Json(_))));
    }

    #[test]
    fn test_day_activity_start_time() {
        let day: DayActivities = serde_json::from_value(json!({
            "ActivitiesForDay": {"payload": [
                {"activityId": 18603794245u64, "activityName": "Cuneo Running",
                 "startTimeGMT": "2025-03-22 15:44:36"}
            ]}
        }))
        .unwrap();
        let start = day.activities()[0].start_time_utc().unwrap().unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-22T15:44:36+00:00");
    }

    #[test]
    fn test_summary_heart_rate_fields() {
        let summary: GarminActivitySummary = serde_json::from_value(json!({
            "activityId": 18606916834u64,
            "activityName": "Cuneo Running",
            "summaryDTO": {"startTimeGMT": "2025-03-22T15:44:36.0",
                "averageHR": 151.0, "maxHR": 178.0, "minHR": 92.0}
        }))
        .unwrap();
        assert_eq!(summary.summary.average_hr, Some(151.0));
        assert_eq!(summary.summary.min_hr, Some(92.0));
        assert!(summary.start_time_utc().unwrap().is_some());
    }
}
