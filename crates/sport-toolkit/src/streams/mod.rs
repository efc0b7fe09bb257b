//! Time-series stream extraction for vendor activity payloads
//!
//! Vendors ship per-sample metrics as flat arrays whose column order is only
//! described by a per-response descriptor list. This module resolves those
//! descriptors to fixed semantic names, extracts aligned streams, checks
//! stream lengths against the declared dataset size and reconstructs moving
//! time from a boolean moving stream.
//!
//! Everything here is pure and synchronous: no I/O, no shared state.

mod descriptors;
mod extractor;
mod metric;
mod moving_time;
mod validator;

pub use descriptors::{MetricDescriptor, MetricDescriptorIndex};
pub use extractor::{RawRecord, Stream, StreamExtractor, StreamSet};
pub use metric::MetricKey;
pub use moving_time::{MovingTimeReconstructor, DEFAULT_PAUSE_THRESHOLD_SECS};
pub use validator::DatasetSizeValidator;

use thiserror::Error;

/// Errors raised while building or reading streams
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The vendor did not describe this metric in the current response
    #[error("Metric not available in this response: {0}")]
    MissingMetric(String),

    #[error("Stream '{stream_name}' has {actual_size} samples, expected {expected_size}")]
    StreamSize {
        stream_name: String,
        actual_size: usize,
        expected_size: usize,
    },

    #[error("Stream '{stream}' has a null sample at index {index}")]
    UnexpectedNull { stream: String, index: usize },

    #[error("Stream '{stream}' does not hold {expected} samples")]
    UnexpectedShape {
        stream: String,
        expected: &'static str,
    },

    #[error("Record {record} has no value at position {position}")]
    MalformedRecord { record: usize, position: usize },
}
