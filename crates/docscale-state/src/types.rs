//! Store-specific types: fixtures, metric series, settle reports.

use std::collections::BTreeMap;

use docscale_core::{AlarmState, ClusterSnapshot, Dimension, InstanceSnapshot, MetricQuery, Statistic};
use serde::{Deserialize, Serialize};

pub const STATUS_CREATING: &str = "creating";
pub const STATUS_DELETING: &str = "deleting";

/// Identity of one metric time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub namespace: String,
    pub metric_name: String,
    pub dimension: Dimension,
    pub statistic: Statistic,
}

impl Series {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}={}/{}",
            self.namespace, self.metric_name, self.dimension.name, self.dimension.value, self.statistic
        )
    }
}

impl From<&MetricQuery> for Series {
    fn from(query: &MetricQuery) -> Self {
        Self {
            namespace: query.namespace.clone(),
            metric_name: query.metric_name.clone(),
            dimension: query.dimension.clone(),
            statistic: query.statistic,
        }
    }
}

/// A datapoint in a fixture file. Either pin it with `timestamp_ms` or
/// place it `age_secs` before the moment the fixture is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSample {
    #[serde(flatten)]
    pub series: Series,
    pub value: f64,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub age_secs: u64,
}

/// Seed data for a standalone store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub clusters: Vec<ClusterSnapshot>,
    pub instances: Vec<InstanceSnapshot>,
    pub alarms: BTreeMap<String, AlarmState>,
    pub samples: Vec<FixtureSample>,
}

/// What `settle` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettleReport {
    /// Instances moved to "available".
    pub promoted: Vec<String>,
    /// Instances dropped after deletion.
    pub removed: Vec<String>,
}
