//! Replica-count telemetry.
//!
//! After each successful mutation the controller hands the reporter the
//! replica count it read from its pre-mutation snapshot. The reported value
//! therefore lags the cluster by one step; the next invocation's report
//! catches up. Reporting is best-effort: every failure is logged and
//! swallowed so it can never fail the scaling operation.

use docscale_core::{
    Dimension, MeasureType, ScalerConfig, TelemetryError, TelemetryPoint, TelemetrySink,
    WriteAck, epoch_millis,
};
use tracing::{debug, error, info};

/// Measure name written for every report.
pub const REPLICA_COUNT_MEASURE: &str = "replica_count";

/// Dimension carrying the cluster identifier.
pub const CLUSTER_DIMENSION: &str = "cluster_identifier";

/// Best-effort writer of replica-count points.
pub struct TelemetryReporter<'a, T> {
    sink: &'a T,
    cluster_id: String,
    database: String,
    table: String,
    enabled: bool,
}

impl<'a, T: TelemetrySink> TelemetryReporter<'a, T> {
    pub fn new(sink: &'a T, config: &ScalerConfig) -> Self {
        Self {
            sink,
            cluster_id: config.cluster_identifier.clone(),
            database: config.telemetry.database.clone(),
            table: config.telemetry_table(),
            enabled: config.telemetry.enabled,
        }
    }

    /// Build the point for a replica count observed at `time_ms`.
    pub fn point(&self, replica_count: u32, time_ms: u64) -> TelemetryPoint {
        TelemetryPoint {
            database: self.database.clone(),
            table: self.table.clone(),
            dimensions: vec![Dimension::new(CLUSTER_DIMENSION, &self.cluster_id)],
            measure_name: REPLICA_COUNT_MEASURE.to_string(),
            measure_value: replica_count.to_string(),
            measure_type: MeasureType::Bigint,
            time_ms,
        }
    }

    /// Write one replica-count point. Returns the acknowledgement, or `None`
    /// when reporting is disabled or the write failed.
    pub async fn report(&self, replica_count: u32) -> Option<WriteAck> {
        if !self.enabled {
            debug!(cluster = %self.cluster_id, "telemetry disabled, skipping replica_count point");
            return None;
        }

        let point = self.point(replica_count, epoch_millis());
        match self.sink.write_point(&point).await {
            Ok(ack) => {
                info!(
                    cluster = %self.cluster_id,
                    table = %self.table,
                    replicas = replica_count,
                    ingested = ack.records_ingested,
                    "replica_count written"
                );
                Some(ack)
            }
            Err(TelemetryError::Rejected(records)) => {
                for record in &records {
                    error!(
                        cluster = %self.cluster_id,
                        index = record.record_index,
                        reason = %record.reason,
                        existing_version = ?record.existing_version,
                        "telemetry record rejected"
                    );
                }
                None
            }
            Err(e) => {
                error!(cluster = %self.cluster_id, error = %e, "telemetry write failed");
                None
            }
        }
    }
}
