//! Response and request models for the Strava REST API

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::parse_aware;
use crate::error::{Result, SportError};
use crate::segments::{SegmentEffort, SegmentEffortResolver};
use crate::streams::{
    DatasetSizeValidator, MetricKey, MovingTimeReconstructor, Stream, StreamError,
};

/// Activity as returned by the list endpoint (summary representation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub moving_time: Option<i64>,
    /// Seconds
    #[serde(default)]
    pub elapsed_time: Option<i64>,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// UTC, RFC 3339
    #[serde(default)]
    pub start_date: Option<String>,
    /// Wall-clock time at the start location, with a misleading `Z` suffix
    #[serde(default)]
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Seconds east of UTC
    #[serde(default)]
    pub utc_offset: Option<f64>,
    #[serde(default)]
    pub gear_id: Option<String>,
    #[serde(default)]
    pub has_heartrate: Option<bool>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
}

impl StravaActivity {
    pub fn start_date_utc(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .start_date
            .as_deref()
            .ok_or_else(|| SportError::invalid_response(format!("Activity {} has no start_date", self.id)))?;
        Ok(parse_aware(raw)?.with_timezone(&Utc))
    }

    /// Matches either the legacy `type` or the newer `sport_type`
    pub fn is_of_type(&self, activity_type: &str) -> bool {
        self.activity_type.as_deref() == Some(activity_type)
            || self.sport_type.as_deref() == Some(activity_type)
    }

    pub fn url(&self) -> String {
        format!("https://www.strava.com/activities/{}", self.id)
    }
}

/// Keep the activities of the given type, local filtering only
pub fn filter_by_activity_type<'a>(
    activities: &'a [StravaActivity],
    activity_type: &'a str,
) -> impl Iterator<Item = &'a StravaActivity> + 'a {
    activities.iter().filter(move |a| a.is_of_type(activity_type))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Detailed representation of one activity, with its raw payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StravaActivityDetails {
    #[serde(flatten)]
    pub summary: StravaActivity,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gear: Option<Gear>,
    #[serde(default, rename = "segment_efforts")]
    efforts: Vec<SegmentEffort>,
    #[serde(skip)]
    raw: Value,
}

impl StravaActivityDetails {
    pub fn from_json(data: Value) -> Result<Self> {
        let mut details: Self = serde_json::from_value(data.clone())?;
        details.raw = data;
        Ok(details)
    }

    pub fn id(&self) -> u64 {
        self.summary.id
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Segment efforts, optionally narrowed to `(segment id, name)` lookups
    pub fn segment_efforts(&self, filter: &[(u64, &str)]) -> Result<Vec<&SegmentEffort>> {
        SegmentEffortResolver::new(&self.efforts).resolve(filter)
    }
}

/// Streams Strava can return for an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Time,
    Distance,
    LatLng,
    Altitude,
    HeartRate,
    /// True while the athlete was moving
    Moving,
}

impl StreamType {
    pub const ALL: [StreamType; 6] = [
        StreamType::Time,
        StreamType::Distance,
        StreamType::LatLng,
        StreamType::Altitude,
        StreamType::HeartRate,
        StreamType::Moving,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Distance => "distance",
            Self::LatLng => "latlng",
            Self::Altitude => "altitude",
            Self::HeartRate => "heartrate",
            Self::Moving => "moving",
        }
    }
}

impl FromStr for StreamType {
    type Err = SportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SportError::InvalidStreamType(s.to_string()))
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample payload of one Strava stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamData {
    Numeric(Vec<Option<f64>>),
    LatLng(Vec<Option<[f64; 2]>>),
    Flags(Vec<bool>),
}

impl StreamData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::LatLng(v) => v.len(),
            Self::Flags(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamItem {
    #[serde(rename = "type")]
    pub stream_type: String,
    pub data: StreamData,
    #[serde(default)]
    pub series_type: Option<String>,
    pub original_size: usize,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Streams of one activity. Every stream must have the length the device
/// recorded (`original_size` of the first item); this is checked once, on
/// first access.
#[derive(Debug)]
pub struct StravaStreams {
    items: Vec<StreamItem>,
    size_check: OnceLock<std::result::Result<(), StreamError>>,
}

impl StravaStreams {
    pub fn new(items: Vec<StreamItem>) -> Self {
        Self {
            items,
            size_check: OnceLock::new(),
        }
    }

    pub fn from_json(data: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(data)?))
    }

    pub fn items(&self) -> &[StreamItem] {
        &self.items
    }

    pub fn original_dataset_size(&self) -> Option<usize> {
        self.items.first().map(|item| item.original_size)
    }

    fn check_sizes(&self) -> std::result::Result<(), StreamError> {
        self.size_check
            .get_or_init(|| match self.original_dataset_size() {
                Some(expected) => DatasetSizeValidator::new(expected).validate(
                    self.items
                        .iter()
                        .map(|item| (item.stream_type.as_str(), item.data.len())),
                ),
                None => Ok(()),
            })
            .clone()
    }

    /// Raw samples of a stream; the last item of that type wins
    pub fn data(&self, stream_type: StreamType) -> std::result::Result<&StreamData, StreamError> {
        self.check_sizes()?;
        self.items
            .iter()
            .rev()
            .find(|item| item.stream_type == stream_type.as_str())
            .map(|item| &item.data)
            .ok_or_else(|| StreamError::MissingMetric(stream_type.as_str().to_string()))
    }

    fn numeric(
        &self,
        stream_type: StreamType,
        key: MetricKey,
    ) -> std::result::Result<Stream, StreamError> {
        match self.data(stream_type)? {
            StreamData::Numeric(values) => Ok(Stream::new(key, values.clone())),
            _ => Err(StreamError::UnexpectedShape {
                stream: stream_type.as_str().to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Seconds since start, pauses included
    pub fn elapsed_time_stream(&self) -> std::result::Result<Stream, StreamError> {
        self.numeric(StreamType::Time, MetricKey::ElapsedTime)
    }

    pub fn distance_stream(&self) -> std::result::Result<Stream, StreamError> {
        self.numeric(StreamType::Distance, MetricKey::Distance)
    }

    pub fn altitude_stream(&self) -> std::result::Result<Stream, StreamError> {
        self.numeric(StreamType::Altitude, MetricKey::Altitude)
    }

    pub fn heartrate_stream(&self) -> std::result::Result<Stream, StreamError> {
        self.numeric(StreamType::HeartRate, MetricKey::HeartRate)
    }

    pub fn latlng_stream(&self) -> std::result::Result<Vec<Option<[f64; 2]>>, StreamError> {
        match self.data(StreamType::LatLng)? {
            StreamData::LatLng(values) => Ok(values.clone()),
            // empty or all-null arrays deserialize as numeric
            StreamData::Numeric(values) if values.iter().all(Option::is_none) => {
                Ok(vec![None; values.len()])
            }
            _ => Err(StreamError::UnexpectedShape {
                stream: "latlng".to_string(),
                expected: "[lat, lng]",
            }),
        }
    }

    pub fn moving_stream(&self) -> std::result::Result<Vec<bool>, StreamError> {
        match self.data(StreamType::Moving)? {
            StreamData::Flags(values) => Ok(values.clone()),
            StreamData::Numeric(values) if values.is_empty() => Ok(Vec::new()),
            _ => Err(StreamError::UnexpectedShape {
                stream: "moving".to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Elapsed time with long stationary gaps removed, using the default
    /// pause threshold
    pub fn moving_time_stream(&self) -> std::result::Result<Vec<f64>, StreamError> {
        self.moving_time_stream_with(&MovingTimeReconstructor::default())
    }

    pub fn moving_time_stream_with(
        &self,
        reconstructor: &MovingTimeReconstructor,
    ) -> std::result::Result<Vec<f64>, StreamError> {
        let elapsed = self.elapsed_time_stream()?.dense()?;
        let moving = self.moving_stream()?;
        reconstructor.reconstruct(&elapsed, &moving)
    }
}

/// Fields accepted by `PUT /activities/{id}`; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_from_home: Option<bool>,
}

/// A manual activity for `POST /activities`
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub name: String,
    pub sport_type: String,
    pub start_date: DateTime<FixedOffset>,
    pub elapsed_time_secs: i64,
    pub description: Option<String>,
}

impl NewActivity {
    /// Build from a textual start date, which must carry an offset
    pub fn parse(
        name: impl Into<String>,
        sport_type: impl Into<String>,
        start_date: &str,
        elapsed_time_secs: i64,
        description: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            sport_type: sport_type.into(),
            start_date: parse_aware(start_date)?,
            elapsed_time_secs,
            description,
        })
    }

    pub(crate) fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("name", self.name.clone()),
            ("sport_type", self.sport_type.clone()),
            ("start_date_local", self.start_date.to_rfc3339()),
            ("elapsed_time", self.elapsed_time_secs.to_string()),
        ];
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            form.push(("description", description.to_string()));
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streams_json() -> Value {
        json!([
            {"type": "moving", "data": [false, true, true, false, false, true],
             "series_type": "distance", "original_size": 6, "resolution": "high"},
            {"type": "latlng", "data": [[45.1, 9.1], [45.2, 9.2], [45.3, 9.3],
                [45.3, 9.3], [45.3, 9.3], [45.4, 9.4]],
             "series_type": "distance", "original_size": 6, "resolution": "high"},
            {"type": "distance", "data": [0.0, 3.1, 6.5, 6.5, 6.5, 9.9],
             "series_type": "distance", "original_size": 6, "resolution": "high"},
            {"type": "heartrate", "data": [90, 95, 101, null, 99, 104],
             "series_type": "distance", "original_size": 6, "resolution": "high"},
            {"type": "time", "data": [0, 1, 2, 3, 16, 17],
             "series_type": "distance", "original_size": 6, "resolution": "high"}
        ])
    }

    #[test]
    fn test_stream_accessors() {
        let streams = StravaStreams::from_json(streams_json()).unwrap();
        assert_eq!(streams.original_dataset_size(), Some(6));
        assert_eq!(streams.distance_stream().unwrap().len(), 6);
        assert_eq!(streams.latlng_stream().unwrap()[5], Some([45.4, 9.4]));
        assert!(!streams.moving_stream().unwrap()[0]);

        let hr = streams.heartrate_stream().unwrap();
        assert_eq!(hr.null_count(), 1);
        assert_eq!(hr.max(), Some(104.0));
    }

    #[test]
    fn test_moving_time_stream() {
        let streams = StravaStreams::from_json(streams_json()).unwrap();
        assert_eq!(
            streams.moving_time_stream().unwrap(),
            vec![0.0, 1.0, 2.0, 3.0, 3.0, 4.0]
        );
        let lenient = MovingTimeReconstructor::with_threshold(20.0);
        assert_eq!(
            streams.moving_time_stream_with(&lenient).unwrap(),
            vec![0.0, 1.0, 2.0, 3.0, 16.0, 17.0]
        );
    }

    #[test]
    fn test_absent_stream_is_missing_metric() {
        let mut data = streams_json();
        data.as_array_mut().unwrap().retain(|item| item["type"] != "altitude");
        let streams = StravaStreams::from_json(data).unwrap();
        assert_eq!(
            streams.altitude_stream().unwrap_err(),
            StreamError::MissingMetric("altitude".to_string())
        );
    }

    #[test]
    fn test_latlng_gps_dropout() {
        let streams = StravaStreams::from_json(json!([
            {"type": "latlng", "data": [null, null], "original_size": 2},
            {"type": "time", "data": [0, 1], "original_size": 2}
        ]))
        .unwrap();
        assert_eq!(streams.latlng_stream().unwrap(), vec![None, None]);

        let streams = StravaStreams::from_json(json!([
            {"type": "latlng", "data": [3.0, null], "original_size": 2}
        ]))
        .unwrap();
        assert!(matches!(
            streams.latlng_stream(),
            Err(StreamError::UnexpectedShape { .. })
        ));
    }

    #[test]
    fn test_size_mismatch_blocks_every_accessor() {
        let mut data = streams_json();
        data[3]["data"] = json!([90, 95, 101]);
        let streams = StravaStreams::from_json(data).unwrap();
        let err = streams.distance_stream().unwrap_err();
        assert_eq!(
            err,
            StreamError::StreamSize {
                stream_name: "heartrate".to_string(),
                actual_size: 3,
                expected_size: 6
            }
        );
        assert!(streams.moving_stream().is_err());
    }

    #[test]
    fn test_stream_type_parsing() {
        assert_eq!("heartrate".parse::<StreamType>().unwrap(), StreamType::HeartRate);
        assert!(matches!(
            "watts".parse::<StreamType>(),
            Err(SportError::InvalidStreamType(t)) if t == "watts"
        ));
    }

    #[test]
    fn test_activity_type_filter() {
        let activities: Vec<StravaActivity> = serde_json::from_value(json!([
            {"id": 1, "name": "a", "type": "Run", "sport_type": "TrailRun"},
            {"id": 2, "name": "b", "type": "Ride", "sport_type": "Ride"},
            {"id": 3, "name": "c", "type": "Run", "sport_type": "Run"}
        ]))
        .unwrap();
        let runs: Vec<u64> = filter_by_activity_type(&activities, "Run").map(|a| a.id).collect();
        assert_eq!(runs, vec![1, 3]);
        let trail: Vec<u64> = filter_by_activity_type(&activities, "TrailRun").map(|a| a.id).collect();
        assert_eq!(trail, vec![1]);
    }

    #[test]
    fn test_details_keep_raw_and_resolve_segments() {
        let data = json!({
            "id": 13389554554u64, "name": "6x300m", "type": "Run", "sport_type": "Run",
            "start_date": "2025-01-18T17:50:11Z", "description": "intervals",
            "gear_id": "g1", "gear": {"id": "g1", "name": "Pegasus", "distance": 812000.0},
            "segment_efforts": [
                {"id": 1, "name": "Via Solferino", "segment": {"id": 8167025}},
                {"id": 2, "name": "300m stazione Levate", "segment": {"id": 38355448}},
                {"id": 3, "name": "300m stazione Levate", "segment": {"id": 38355448}}
            ]
        });
        let details = StravaActivityDetails::from_json(data.clone()).unwrap();
        assert_eq!(details.id(), 13389554554);
        assert_eq!(details.raw(), &data);
        assert_eq!(details.gear.as_ref().unwrap().name.as_deref(), Some("Pegasus"));
        assert_eq!(details.segment_efforts(&[]).unwrap().len(), 3);
        assert_eq!(
            details
                .segment_efforts(&[(38355448, "300M STAZIONE LEVATE")])
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_new_activity_form() {
        let activity = NewActivity::parse(
            "test create 1",
            "WeightTraining",
            "2025-01-26T16:00:00+00:00",
            3600,
            Some(String::new()),
        )
        .unwrap();
        let form = activity.form();
        assert!(form.contains(&("start_date_local", "2025-01-26T16:00:00+00:00".to_string())));
        assert!(form.contains(&("elapsed_time", "3600".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "description"));

        assert!(matches!(
            NewActivity::parse("x", "Run", "2025-01-26T16:00:00", 60, None),
            Err(SportError::NaiveDatetime(_))
        ));
    }
}
