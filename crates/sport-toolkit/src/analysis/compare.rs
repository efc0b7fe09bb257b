//! Heart-rate figures reported by Strava, by Garmin, and recomputed from the
//! Garmin sample stream.

use std::fmt;

use tracing::{info, warn};

use crate::client::garmin::{DetailsOptions, GarminClient};
use crate::client::strava::StravaClient;
use crate::client::tokens::OAuth2Token;
use crate::error::{Result, SportError};
use crate::streams::Stream;

const AVG_TOLERANCE_BPM: f64 = 6.0;
const MAX_TOLERANCE_BPM: f64 = 4.0;
const MIN_TOLERANCE_BPM: f64 = 4.0;

/// Enough to fetch the full-resolution heart-rate stream of any workout
const FULL_RESOLUTION_SAMPLES: u32 = 100_000;

/// One heart-rate figure from each source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateDiff {
    pub label: &'static str,
    /// Strava does not report a minimum
    pub strava: Option<f64>,
    pub garmin: f64,
    pub computed: f64,
    /// Combined deviation of the three sources
    pub diff: f64,
    pub tolerance: f64,
}

impl HeartRateDiff {
    /// Deviation of Strava and the computed value around Garmin's, or of the
    /// computed value alone when Strava has no figure
    fn new(label: &'static str, strava: Option<f64>, garmin: f64, computed: f64, tolerance: f64) -> Self {
        let diff = match strava {
            Some(strava) => (strava * 2.0 - garmin - computed).abs(),
            None => (garmin - computed).abs(),
        };
        Self {
            label,
            strava,
            garmin,
            computed,
            diff,
            tolerance,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.diff > self.tolerance
    }
}

impl fmt::Display for HeartRateDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strava = self
            .strava
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<4} strava={:<6} garmin={:<6.1} computed={:<6.1} diff={:.2}",
            self.label, strava, self.garmin, self.computed, self.diff
        )?;
        if self.is_mismatch() {
            write!(f, "  MISMATCH (> {})", self.tolerance)?;
        }
        Ok(())
    }
}

/// Average, maximum and minimum heart rate from the three sources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateComparison {
    pub avg: HeartRateDiff,
    pub max: HeartRateDiff,
    pub min: HeartRateDiff,
}

/// Heart-rate figures of one Garmin activity summary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarminHeartRate {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl HeartRateComparison {
    /// Compare vendor figures with those recomputed from `stream`, nulls skipped
    pub fn compute(
        strava_avg: f64,
        strava_max: f64,
        garmin: GarminHeartRate,
        stream: &Stream,
    ) -> Result<Self> {
        let (Some(avg), Some(max), Some(min)) = (stream.mean(), stream.max(), stream.min()) else {
            return Err(SportError::invalid_response("Garmin heart-rate stream has no samples"));
        };

        Ok(Self {
            avg: HeartRateDiff::new("avg", Some(strava_avg), garmin.avg, avg, AVG_TOLERANCE_BPM),
            max: HeartRateDiff::new("max", Some(strava_max), garmin.max, max, MAX_TOLERANCE_BPM),
            min: HeartRateDiff::new("min", None, garmin.min, min, MIN_TOLERANCE_BPM),
        })
    }

    pub fn diffs(&self) -> [&HeartRateDiff; 3] {
        [&self.avg, &self.max, &self.min]
    }

    pub fn has_mismatch(&self) -> bool {
        self.diffs().iter().any(|d| d.is_mismatch())
    }
}

fn require(value: Option<f64>, what: &str) -> Result<f64> {
    value.ok_or_else(|| SportError::invalid_response(format!("{} is missing", what)))
}

/// Fetch both activities and compare their heart-rate figures
pub async fn compare_heart_rate(
    strava: &StravaClient,
    garmin: &GarminClient,
    garmin_token: &OAuth2Token,
    strava_activity_id: u64,
    garmin_activity_id: u64,
) -> Result<HeartRateComparison> {
    let details = strava.get_activity_details(strava_activity_id).await?;
    let strava_avg = require(details.summary.average_heartrate, "Strava average_heartrate")?;
    let strava_max = require(details.summary.max_heartrate, "Strava max_heartrate")?;

    let summary = garmin.get_activity_summary(garmin_token, garmin_activity_id).await?;
    let garmin_hr = GarminHeartRate {
        avg: require(summary.summary.average_hr, "Garmin averageHR")?,
        max: require(summary.summary.max_hr, "Garmin maxHR")?,
        min: require(summary.summary.min_hr, "Garmin minHR")?,
    };

    let options = DetailsOptions {
        max_metrics_data_count: FULL_RESOLUTION_SAMPLES,
        ..Default::default()
    };
    let samples = garmin
        .get_activity_details(garmin_token, garmin_activity_id, &options)
        .await?;

    let comparison =
        HeartRateComparison::compute(strava_avg, strava_max, garmin_hr, samples.heart_rate()?)?;
    for diff in comparison.diffs() {
        if diff.is_mismatch() {
            warn!(%diff, "Heart rate mismatch");
        }
    }
    info!(strava_activity_id, garmin_activity_id, "Heart rate compared");
    Ok(comparison)
}
