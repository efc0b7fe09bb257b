use super::StreamError;

/// Stationary gaps shorter than this are left in moving time. Matches what
/// Garmin devices report; other vendors may need a different value.
pub const DEFAULT_PAUSE_THRESHOLD_SECS: f64 = 13.0;

/// Rebuilds a moving-time stream from elapsed time and a moving flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingTimeReconstructor {
    pause_threshold_secs: f64,
}

impl Default for MovingTimeReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl MovingTimeReconstructor {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_PAUSE_THRESHOLD_SECS)
    }

    pub fn with_threshold(pause_threshold_secs: f64) -> Self {
        Self {
            pause_threshold_secs,
        }
    }

    pub fn pause_threshold_secs(&self) -> f64 {
        self.pause_threshold_secs
    }

    /// Subtract every stationary gap of at least the threshold from the
    /// samples that follow it.
    ///
    /// Pause detection starts at the third sample; shorter inputs come back
    /// unchanged. Subtracting a gap shifts both ends of every later delta, so
    /// deltas are read from `elapsed` and a running offset replaces the
    /// in-place shift of all later samples.
    pub fn reconstruct(&self, elapsed: &[f64], moving: &[bool]) -> Result<Vec<f64>, StreamError> {
        if elapsed.len() != moving.len() {
            return Err(StreamError::StreamSize {
                stream_name: "moving".to_string(),
                actual_size: moving.len(),
                expected_size: elapsed.len(),
            });
        }

        let mut offset = 0.0;
        let mut result = Vec::with_capacity(elapsed.len());
        for (i, (&time, &is_moving)) in elapsed.iter().zip(moving).enumerate() {
            if i >= 2 && !is_moving {
                let diff = time - elapsed[i - 1];
                if diff >= self.pause_threshold_secs {
                    offset += diff;
                }
            }
            result.push(time - offset);
        }
        Ok(result)
    }
}
