use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metric::MetricKey;

/// One entry of a response's `metricDescriptors` list.
///
/// `position` is only meaningful inside the response it came from; the
/// vendor reorders metrics between responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub key: String,
    #[serde(rename = "metricsIndex")]
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<serde_json::Value>,
}

impl MetricDescriptor {
    pub fn new(key: impl Into<String>, position: usize) -> Self {
        Self {
            key: key.into(),
            position,
            unit: None,
        }
    }
}

/// Semantic metric name to record position, for a single response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDescriptorIndex {
    positions: BTreeMap<MetricKey, usize>,
}

impl MetricDescriptorIndex {
    /// Resolve every known metric present in `descriptors`
    pub fn resolve_all(descriptors: &[MetricDescriptor]) -> Self {
        Self::resolve(descriptors, &MetricKey::ALL)
    }

    /// Resolve the `wanted` metrics present in `descriptors`.
    ///
    /// Vendor keys outside the table and wanted metrics the response does not
    /// describe are skipped without error. A vendor key listed twice keeps
    /// its last position.
    pub fn resolve(descriptors: &[MetricDescriptor], wanted: &[MetricKey]) -> Self {
        let mut positions = BTreeMap::new();
        for descriptor in descriptors {
            if let Some(key) = MetricKey::from_vendor_key(&descriptor.key) {
                if wanted.contains(&key) {
                    positions.insert(key, descriptor.position);
                }
            }
        }
        Self { positions }
    }

    pub fn position(&self, key: MetricKey) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.positions.contains_key(&key)
    }

    /// Resolved metrics, in [`MetricKey`] order
    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.positions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
