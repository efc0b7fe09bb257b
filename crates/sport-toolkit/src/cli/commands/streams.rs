//! Inspect the sample streams of one activity

use crate::client::garmin::DetailsOptions;
use crate::error::Result;
use crate::models::strava::{StravaStreams, StreamType};
use crate::streams::{Stream, StreamError};

use super::session::Context;

fn print_header() {
    println!(
        "{:<16} {:>8} {:>6} {:>10} {:>10} {:>10}",
        "Stream", "Samples", "Nulls", "Min", "Mean", "Max"
    );
    println!("{}", "-".repeat(65));
}

fn print_stream(stream: &Stream) {
    let fmt = |v: Option<f64>| v.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string());
    println!(
        "{:<16} {:>8} {:>6} {:>10} {:>10} {:>10}",
        stream.name(),
        stream.len(),
        stream.null_count(),
        fmt(stream.min()),
        fmt(stream.mean()),
        fmt(stream.max())
    );
}

type StravaAccessor = fn(&StravaStreams) -> std::result::Result<Stream, StreamError>;

/// Numeric Strava streams in table order; `None` marks a stream the
/// activity does not have
fn strava_rows(streams: &StravaStreams) -> Result<Vec<(StreamType, Option<Stream>)>> {
    let accessors: [(StreamType, StravaAccessor); 4] = [
        (StreamType::Time, StravaStreams::elapsed_time_stream),
        (StreamType::Distance, StravaStreams::distance_stream),
        (StreamType::Altitude, StravaStreams::altitude_stream),
        (StreamType::HeartRate, StravaStreams::heartrate_stream),
    ];
    accessors
        .into_iter()
        .map(|(stream_type, get)| match get(streams) {
            Ok(stream) => Ok((stream_type, Some(stream))),
            Err(StreamError::MissingMetric(_)) => Ok((stream_type, None)),
            Err(e) => Err(e.into()),
        })
        .collect()
}

fn print_missing(name: &str) {
    println!("{:<16} {:>8}", name, "not available");
}

/// Streams of a Strava activity, plus its reconstructed moving time
pub async fn strava(ctx: &Context, activity_id: u64) -> Result<()> {
    let client = ctx.strava().await?;
    let streams = client.get_streams(activity_id, &StreamType::ALL).await?;

    println!(
        "Strava activity {} ({} samples recorded)\n",
        activity_id,
        streams.original_dataset_size().unwrap_or_default()
    );
    print_header();
    for (stream_type, stream) in strava_rows(&streams)? {
        match stream {
            Some(stream) => print_stream(&stream),
            None => print_missing(stream_type.as_str()),
        }
    }
    match streams.latlng_stream() {
        Ok(latlng) => println!("{:<16} {:>8}", "latlng", latlng.len()),
        Err(StreamError::MissingMetric(_)) => print_missing("latlng"),
        Err(e) => return Err(e.into()),
    }

    match streams.moving_time_stream() {
        Ok(moving_time) => {
            let total = moving_time.last().copied().unwrap_or_default();
            println!("\nMoving time: {}", format_duration(total));
        }
        Err(e) => println!("\nMoving time unavailable: {}", e),
    }
    Ok(())
}

/// Streams of a Garmin activity
pub async fn garmin(ctx: &Context, activity_id: u64, max_metrics: u32) -> Result<()> {
    let (client, token) = ctx.garmin()?;
    let options = DetailsOptions {
        max_metrics_data_count: max_metrics,
        ..Default::default()
    };
    let details = client.get_activity_details(&token, activity_id, &options).await?;

    println!(
        "Garmin activity {} ({} samples in response, {} recorded)\n",
        details.activity_id(),
        details.streams_size(),
        details.original_size()
    );
    print_header();
    for key in details.available_metrics() {
        print_stream(details.stream(key)?);
    }
    Ok(())
}

fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::SportError;
    use serde_json::json;

    #[test]
    fn test_strava_rows_mark_absent_streams() {
        let streams = StravaStreams::from_json(json!([
            {"type": "time", "data": [0, 1, 2], "original_size": 3},
            {"type": "distance", "data": [0.0, 2.5, 5.1], "original_size": 3},
            {"type": "heartrate", "data": [101, null, 104], "original_size": 3}
        ]))
        .unwrap();
        let rows = strava_rows(&streams).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].0, StreamType::Altitude);
        assert!(rows[2].1.is_none());
        assert_eq!(rows[3].1.as_ref().unwrap().null_count(), 1);
    }

    #[test]
    fn test_strava_rows_fail_on_size_mismatch() {
        let streams = StravaStreams::from_json(json!([
            {"type": "time", "data": [0, 1, 2], "original_size": 3},
            {"type": "heartrate", "data": [101, 104], "original_size": 3}
        ]))
        .unwrap();
        assert!(matches!(
            strava_rows(&streams),
            Err(SportError::Stream(StreamError::StreamSize { actual_size: 2, expected_size: 3, .. }))
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(3725.4), "1:02:05");
    }
}
