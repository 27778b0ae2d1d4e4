//! Shared types used across docscale crates.
//!
//! These mirror what the cluster-management, metrics, and telemetry
//! services hand back, trimmed to the fields scaling decisions read.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

/// Identifier of a database cluster.
pub type ClusterId = String;

/// Identifier of a single database instance.
pub type InstanceId = String;

/// Instance status reported once an instance is stable.
pub const STATUS_AVAILABLE: &str = "available";

// ── Cluster ───────────────────────────────────────────────────────

/// One entry of a cluster's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub instance_id: InstanceId,
    pub is_writer: bool,
}

/// Point-in-time view of a cluster's membership, in API-returned order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster_id: ClusterId,
    pub members: Vec<ClusterMember>,
}

impl ClusterSnapshot {
    /// The writer member, matched by its flag.
    pub fn writer(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.is_writer)
    }

    /// Non-writer members in snapshot order.
    pub fn replicas(&self) -> impl Iterator<Item = &ClusterMember> {
        self.members.iter().filter(|m| !m.is_writer)
    }

    pub fn replica_count(&self) -> u32 {
        self.replicas().count() as u32
    }
}

/// Point-in-time view of a single instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance_id: InstanceId,
    pub cluster_id: ClusterId,
    pub instance_class: String,
    /// Provider status string: "available", "creating", "modifying", ...
    pub status: String,
}

impl InstanceSnapshot {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

/// Parameters of a create-instance call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstance {
    pub cluster_id: ClusterId,
    pub instance_id: InstanceId,
    pub instance_class: String,
    pub engine: String,
}

// ── Capacity ──────────────────────────────────────────────────────

/// Permitted replica-count band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub min_capacity: u32,
    pub max_capacity: u32,
}

impl CapacityPolicy {
    pub fn new(min_capacity: u32, max_capacity: u32) -> Self {
        Self {
            min_capacity,
            max_capacity,
        }
    }

    /// Reject a band whose floor sits above its ceiling.
    pub fn validate(&self) -> Result<(), ScaleError> {
        if self.min_capacity > self.max_capacity {
            return Err(ScaleError::Config(format!(
                "min_capacity ({}) cannot be greater than max_capacity ({})",
                self.min_capacity, self.max_capacity
            )));
        }
        Ok(())
    }
}

/// Which edge of the capacity band was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityBound {
    Floor,
    Ceiling,
}

impl fmt::Display for CapacityBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityBound::Floor => write!(f, "minimum"),
            CapacityBound::Ceiling => write!(f, "maximum"),
        }
    }
}

// ── Alarms and metrics ────────────────────────────────────────────

/// State of an externally evaluated alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
    #[serde(other)]
    Unknown,
}

impl FromStr for AlarmState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "OK" => AlarmState::Ok,
            "ALARM" => AlarmState::Alarm,
            "INSUFFICIENT_DATA" => AlarmState::InsufficientData,
            _ => AlarmState::Unknown,
        })
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmState::Ok => "OK",
            AlarmState::Alarm => "ALARM",
            AlarmState::InsufficientData => "INSUFFICIENT_DATA",
            AlarmState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Statistic requested from the metrics service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
            Statistic::SampleCount => "SampleCount",
        };
        f.write_str(s)
    }
}

impl FromStr for Statistic {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Average" => Ok(Statistic::Average),
            "Sum" => Ok(Statistic::Sum),
            "Minimum" => Ok(Statistic::Minimum),
            "Maximum" => Ok(Statistic::Maximum),
            "SampleCount" => Ok(Statistic::SampleCount),
            other => Err(ScaleError::Config(format!("unknown statistic: {other}"))),
        }
    }
}

/// One datapoint of a metric statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp_ms: u64,
    pub value: f64,
}

/// Name/value pair used both for metric dimensions and telemetry dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Closed time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeWindow {
    /// The `period_secs` seconds leading up to `now_ms`.
    pub fn trailing(period_secs: u64, now_ms: u64) -> Self {
        Self {
            start_ms: now_ms.saturating_sub(period_secs.saturating_mul(1000)),
            end_ms: now_ms,
        }
    }

    pub fn contains(&self, timestamp_ms: u64) -> bool {
        (self.start_ms..=self.end_ms).contains(&timestamp_ms)
    }
}

/// A statistic query against the metrics service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension: Dimension,
    pub window: TimeWindow,
    pub period_secs: u64,
    pub statistic: Statistic,
}

// ── Telemetry ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasureType {
    Bigint,
    Double,
}

/// A single time-series point written to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub database: String,
    pub table: String,
    pub dimensions: Vec<Dimension>,
    pub measure_name: String,
    pub measure_value: String,
    pub measure_type: MeasureType,
    pub time_ms: u64,
}

// ── Decisions ─────────────────────────────────────────────────────

/// What an invocation decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingDecision {
    /// One busy-gated replica addition.
    AddReplica,
    /// One busy-gated replica removal.
    RemoveReplica,
    /// Busy-bypassing additions until the floor is restored.
    CatchUp { missing: u32 },
    NoAction,
    Abort(String),
}

impl ScalingDecision {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ScalingDecision::AddReplica
                | ScalingDecision::RemoveReplica
                | ScalingDecision::CatchUp { .. }
        )
    }
}

impl fmt::Display for ScalingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingDecision::AddReplica => write!(f, "add replica"),
            ScalingDecision::RemoveReplica => write!(f, "remove replica"),
            ScalingDecision::CatchUp { missing } => write!(f, "catch up {missing} replica(s)"),
            ScalingDecision::NoAction => write!(f, "no action"),
            ScalingDecision::Abort(reason) => write!(f, "abort: {reason}"),
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
