//! Collaborator implementations over the state store.
//!
//! Lets `docscaled` run the autoscaler end to end on a single machine:
//! the store answers as cluster-management service, metrics service, and
//! telemetry sink at once.

use docscale_core::*;
use tracing::debug;

use crate::error::StateError;
use crate::store::StateStore;
use crate::types::Series;

impl ClusterApi for StateStore {
    async fn describe_cluster(&self, cluster_id: &str) -> anyhow::Result<ClusterSnapshot> {
        let cluster = self
            .get_cluster(cluster_id)?
            .ok_or_else(|| StateError::NotFound(format!("cluster {cluster_id}")))?;
        Ok(cluster)
    }

    async fn describe_instances(&self, cluster_id: &str) -> anyhow::Result<Vec<InstanceSnapshot>> {
        Ok(self.list_instances(cluster_id)?)
    }

    async fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<InstanceSnapshot> {
        Ok(self.launch_instance(request)?)
    }

    async fn delete_instance(&self, instance_id: &str) -> anyhow::Result<InstanceSnapshot> {
        Ok(self.retire_instance(instance_id)?)
    }
}

impl MetricsApi for StateStore {
    async fn describe_alarm_state(&self, alarm_name: &str) -> anyhow::Result<AlarmState> {
        let state = self
            .get_alarm_state(alarm_name)?
            .ok_or_else(|| StateError::NotFound(format!("alarm {alarm_name}")))?;
        Ok(state)
    }

    async fn get_statistic_samples(&self, query: &MetricQuery) -> anyhow::Result<Vec<MetricSample>> {
        let series = Series::from(query);
        let samples = self.list_samples(&series, &query.window)?;
        debug!(series = %series.key(), samples = samples.len(), "statistic samples read");
        Ok(samples)
    }
}

impl TelemetrySink for StateStore {
    /// Accepts BIGINT/DOUBLE points; rejects malformed values and rewrites
    /// of an existing point with a different value.
    async fn write_point(&self, point: &TelemetryPoint) -> Result<WriteAck, TelemetryError> {
        if let Some(reason) = invalid_measure(point) {
            return Err(reject(reason, None));
        }

        let existing = self
            .get_point(&point.database, &point.table, point.time_ms)
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if let Some(existing) = existing
            && existing.measure_value != point.measure_value
        {
            return Err(reject(
                format!(
                    "a point at {} already holds {}",
                    point.time_ms, existing.measure_value
                ),
                Some(1),
            ));
        }

        self.put_point(point)
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        Ok(WriteAck {
            records_ingested: 1,
        })
    }
}

fn invalid_measure(point: &TelemetryPoint) -> Option<String> {
    if point.time_ms == 0 {
        return Some("time is missing".to_string());
    }
    let parses = match point.measure_type {
        MeasureType::Bigint => point.measure_value.parse::<i64>().is_ok(),
        MeasureType::Double => point.measure_value.parse::<f64>().is_ok(),
    };
    (!parses).then(|| {
        format!(
            "{} is not a valid {:?} value",
            point.measure_value, point.measure_type
        )
    })
}

fn reject(reason: String, existing_version: Option<i64>) -> TelemetryError {
    TelemetryError::Rejected(vec![RejectedRecord {
        record_index: 0,
        reason,
        existing_version,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: &str, time_ms: u64) -> TelemetryPoint {
        TelemetryPoint {
            database: "bria".to_string(),
            table: "docdb-c1".to_string(),
            dimensions: vec![Dimension::new("cluster_identifier", "c1")],
            measure_name: "replica_count".to_string(),
            measure_value: value.to_string(),
            measure_type: MeasureType::Bigint,
            time_ms,
        }
    }

    #[tokio::test]
    async fn describe_unknown_cluster_fails() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.describe_cluster("nope").await.unwrap_err();
        assert!(err.to_string().contains("cluster nope"));
    }

    #[tokio::test]
    async fn unknown_alarm_fails() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.describe_alarm_state("missing").await.is_err());

        store.set_alarm_state("present", AlarmState::Ok).unwrap();
        assert_eq!(
            store.describe_alarm_state("present").await.unwrap(),
            AlarmState::Ok
        );
    }

    #[tokio::test]
    async fn write_point_stores_and_lists() {
        let store = StateStore::open_in_memory().unwrap();

        let ack = store.write_point(&point("2", 1_000)).await.unwrap();
        assert_eq!(ack.records_ingested, 1);
        // Identical rewrite is idempotent.
        store.write_point(&point("2", 1_000)).await.unwrap();
        store.write_point(&point("3", 2_000)).await.unwrap();

        let points = store.list_points("bria", "docdb-c1").unwrap();
        let values: Vec<&str> = points.iter().map(|p| p.measure_value.as_str()).collect();
        assert_eq!(values, ["2", "3"]);
    }

    #[tokio::test]
    async fn write_point_rejects_conflicts_and_bad_values() {
        let store = StateStore::open_in_memory().unwrap();
        store.write_point(&point("2", 1_000)).await.unwrap();

        match store.write_point(&point("5", 1_000)).await {
            Err(TelemetryError::Rejected(records)) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].record_index, 0);
                assert_eq!(records[0].existing_version, Some(1));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        assert!(matches!(
            store.write_point(&point("two", 3_000)).await,
            Err(TelemetryError::Rejected(_))
        ));
        assert!(matches!(
            store.write_point(&point("2", 0)).await,
            Err(TelemetryError::Rejected(_))
        ));
    }
}
