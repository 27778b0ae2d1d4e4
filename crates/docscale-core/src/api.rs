//! Collaborator interfaces.
//!
//! The autoscaler never talks to a provider SDK directly. Each invocation
//! borrows explicitly constructed implementations of these traits, which
//! keeps their lifetime scoped to the invocation and lets tests substitute
//! fakes.
//!
//! ```text
//! ClusterApi     describe_cluster / describe_instances / create_instance / delete_instance
//! MetricsApi     describe_alarm_state / get_statistic_samples
//! TelemetrySink  write_point
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::*;

/// Cluster management service.
#[allow(async_fn_in_trait)]
pub trait ClusterApi {
    /// Fetch the cluster's member list.
    async fn describe_cluster(&self, cluster_id: &str) -> anyhow::Result<ClusterSnapshot>;

    /// Fetch every instance that belongs to the cluster.
    async fn describe_instances(&self, cluster_id: &str) -> anyhow::Result<Vec<InstanceSnapshot>>;

    /// Launch a new instance into the cluster.
    async fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<InstanceSnapshot>;

    /// Delete an instance by identifier.
    async fn delete_instance(&self, instance_id: &str) -> anyhow::Result<InstanceSnapshot>;
}

/// Alarm and metric statistics service.
#[allow(async_fn_in_trait)]
pub trait MetricsApi {
    async fn describe_alarm_state(&self, alarm_name: &str) -> anyhow::Result<AlarmState>;

    /// Datapoints of `query.statistic` inside `query.window`.
    async fn get_statistic_samples(&self, query: &MetricQuery) -> anyhow::Result<Vec<MetricSample>>;
}

/// Time-series telemetry sink.
#[allow(async_fn_in_trait)]
pub trait TelemetrySink {
    async fn write_point(&self, point: &TelemetryPoint) -> Result<WriteAck, TelemetryError>;
}

/// Acknowledgement of an accepted telemetry write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub records_ingested: u32,
}

/// A record the sink refused, with the sink's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub record_index: usize,
    pub reason: String,
    pub existing_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("{} record(s) rejected", .0.len())]
    Rejected(Vec<RejectedRecord>),

    #[error("transport error: {0}")]
    Transport(String),
}
