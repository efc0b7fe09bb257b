//! Segment efforts within a Strava activity
//!
//! An athlete can ride or run the same segment several times in one activity
//! (interval laps), so one segment id may resolve to many efforts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SportError};

/// The course segment an effort was recorded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub average_grade: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
}

/// One traversal of a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEffort {
    pub id: u64,
    pub name: String,
    pub segment: Segment,
    #[serde(default)]
    pub elapsed_time: Option<i64>,
    #[serde(default)]
    pub moving_time: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub start_index: Option<usize>,
    #[serde(default)]
    pub end_index: Option<usize>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
}

/// Picks efforts out of an activity by `(segment id, name)` lookups
pub struct SegmentEffortResolver<'a> {
    efforts: &'a [SegmentEffort],
    by_segment: HashMap<u64, Vec<usize>>,
}

impl<'a> SegmentEffortResolver<'a> {
    pub fn new(efforts: &'a [SegmentEffort]) -> Self {
        let mut by_segment: HashMap<u64, Vec<usize>> = HashMap::new();
        for (i, effort) in efforts.iter().enumerate() {
            by_segment.entry(effort.segment.id).or_default().push(i);
        }
        Self {
            efforts,
            by_segment,
        }
    }

    /// Resolve lookups in the order given.
    ///
    /// Every effort on a looked-up segment is returned, in activity order.
    /// Names compare case-insensitively against the effort name. With no
    /// lookups, every effort is returned.
    pub fn resolve(&self, lookups: &[(u64, &str)]) -> Result<Vec<&'a SegmentEffort>> {
        if lookups.is_empty() {
            return Ok(self.efforts.iter().collect());
        }

        let mut resolved = Vec::new();
        for &(id, name) in lookups {
            let indices = match self.by_segment.get(&id) {
                Some(indices) => indices,
                None => {
                    return Err(SportError::SegmentEffortNotFound {
                        id,
                        name: name.to_string(),
                    })
                }
            };

            let wanted = name.to_lowercase();
            for &i in indices {
                let effort = &self.efforts[i];
                if effort.name.to_lowercase() != wanted {
                    return Err(SportError::SegmentNameMismatch {
                        id,
                        expected: name.to_string(),
                        actual: effort.name.clone(),
                    });
                }
                resolved.push(effort);
            }
        }
        Ok(resolved)
    }
}
