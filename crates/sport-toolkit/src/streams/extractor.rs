use std::collections::BTreeMap;

use super::descriptors::MetricDescriptorIndex;
use super::metric::MetricKey;
use super::StreamError;

/// One sample row as shipped by the vendor: a value per described metric
pub type RawRecord = Vec<Option<f64>>;

/// A named, ordered sequence of samples. Nulls mark sensor dropouts.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    key: MetricKey,
    values: Vec<Option<f64>>,
}

impl Stream {
    pub fn new(key: MetricKey, values: Vec<Option<f64>>) -> Self {
        Self { key, values }
    }

    pub fn key(&self) -> MetricKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.as_str()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every sample, nulls included
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Samples with nulls stripped
    pub fn present_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// Samples as plain numbers; fails on the first null
    pub fn dense(&self) -> Result<Vec<f64>, StreamError> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value.ok_or_else(|| StreamError::UnexpectedNull {
                    stream: self.name().to_string(),
                    index,
                })
            })
            .collect()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn mean(&self) -> Option<f64> {
        let present = self.present_values();
        if present.is_empty() {
            return None;
        }
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::max)
    }

    pub fn into_values(self) -> Vec<Option<f64>> {
        self.values
    }
}

/// The streams extracted from one response, keyed by metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSet {
    streams: BTreeMap<MetricKey, Stream>,
}

impl StreamSet {
    pub fn insert(&mut self, stream: Stream) {
        self.streams.insert(stream.key(), stream);
    }

    /// Look up a stream; absent metrics are an error, never an empty stream
    pub fn get(&self, key: MetricKey) -> Result<&Stream, StreamError> {
        self.streams
            .get(&key)
            .ok_or_else(|| StreamError::MissingMetric(key.as_str().to_string()))
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.streams.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    /// `(name, length)` pairs, the shape the size validator consumes
    pub fn sizes(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.streams.values().map(|s| (s.name(), s.len()))
    }
}

/// Turns raw records into named streams using a resolved descriptor index
pub struct StreamExtractor<'a> {
    index: &'a MetricDescriptorIndex,
}

impl<'a> StreamExtractor<'a> {
    pub fn new(index: &'a MetricDescriptorIndex) -> Self {
        Self { index }
    }

    /// Build one stream per requested metric, in record order.
    ///
    /// Every requested metric must have a resolved position, otherwise
    /// `MissingMetric` is returned and nothing is built.
    pub fn extract(
        &self,
        records: &[RawRecord],
        wanted: &[MetricKey],
    ) -> Result<StreamSet, StreamError> {
        let mut positions = Vec::with_capacity(wanted.len());
        for &key in wanted {
            let position = self
                .index
                .position(key)
                .ok_or_else(|| StreamError::MissingMetric(key.as_str().to_string()))?;
            positions.push((key, position));
        }

        let mut set = StreamSet::default();
        for (key, position) in positions {
            let values = records
                .iter()
                .enumerate()
                .map(|(record, row)| {
                    row.get(position)
                        .copied()
                        .ok_or(StreamError::MalformedRecord { record, position })
                })
                .collect::<Result<Vec<_>, _>>()?;
            set.insert(Stream::new(key, values));
        }
        Ok(set)
    }

    /// Build a stream for every metric the index resolved
    pub fn extract_available(&self, records: &[RawRecord]) -> Result<StreamSet, StreamError> {
        let wanted: Vec<MetricKey> = self.index.keys().collect();
        self.extract(records, &wanted)
    }
}
