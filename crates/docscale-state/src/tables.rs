//! redb table definitions for the docscale state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Composite keys follow the pattern `{parent}:{child}`; timestamps in keys are
//! zero-padded to 20 digits so lexical order matches time order.

use redb::TableDefinition;

/// Shape shared by every table in the store.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Cluster membership keyed by `{cluster_id}`.
pub const CLUSTERS: JsonTable = TableDefinition::new("clusters");

/// Instance snapshots keyed by `{cluster_id}:{instance_id}`.
pub const INSTANCES: JsonTable = TableDefinition::new("instances");

/// Alarm states keyed by `{alarm_name}`.
pub const ALARMS: JsonTable = TableDefinition::new("alarms");

/// Metric samples keyed by `{series}:{timestamp_ms}`.
pub const SAMPLES: JsonTable = TableDefinition::new("samples");

/// Telemetry points keyed by `{database}/{table}:{time_ms}`.
pub const TELEMETRY: JsonTable = TableDefinition::new("telemetry");

pub fn instance_key(cluster_id: &str, instance_id: &str) -> String {
    format!("{cluster_id}:{instance_id}")
}

pub fn sample_key(series: &str, timestamp_ms: u64) -> String {
    format!("{series}:{timestamp_ms:020}")
}

pub fn telemetry_key(database: &str, table: &str, time_ms: u64) -> String {
    format!("{database}/{table}:{time_ms:020}")
}
