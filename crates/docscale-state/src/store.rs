//! StateStore: redb-backed standalone state for docscale.
//!
//! Holds cluster membership, instance snapshots, alarm states, metric
//! samples, and written telemetry. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use docscale_core::*;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [CLUSTERS, INSTANCES, ALARMS, SAMPLES, TELEMETRY] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic JSON access ────────────────────────────────────────

    fn put_json<V: Serialize>(&self, table: JsonTable, key: &str, value: &V) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<V: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<V>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All values whose key starts with `prefix`, in key order.
    fn scan_json<V: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> StateResult<Vec<V>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let value = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(value);
            }
        }
        Ok(results)
    }

    // ── Clusters and instances ─────────────────────────────────────

    /// Insert or replace a cluster's membership.
    pub fn put_cluster(&self, cluster: &ClusterSnapshot) -> StateResult<()> {
        self.put_json(CLUSTERS, &cluster.cluster_id, cluster)?;
        debug!(cluster = %cluster.cluster_id, members = cluster.members.len(), "cluster stored");
        Ok(())
    }

    pub fn get_cluster(&self, cluster_id: &str) -> StateResult<Option<ClusterSnapshot>> {
        self.get_json(CLUSTERS, cluster_id)
    }

    pub fn list_clusters(&self) -> StateResult<Vec<ClusterSnapshot>> {
        self.scan_json(CLUSTERS, "")
    }

    /// Insert or update an instance snapshot.
    pub fn put_instance(&self, instance: &InstanceSnapshot) -> StateResult<()> {
        let key = instance_key(&instance.cluster_id, &instance.instance_id);
        self.put_json(INSTANCES, &key, instance)
    }

    /// List all instances of a cluster.
    pub fn list_instances(&self, cluster_id: &str) -> StateResult<Vec<InstanceSnapshot>> {
        self.scan_json(INSTANCES, &format!("{cluster_id}:"))
    }

    /// Find an instance by identifier in any cluster.
    pub fn find_instance(&self, instance_id: &str) -> StateResult<Option<InstanceSnapshot>> {
        let all: Vec<InstanceSnapshot> = self.scan_json(INSTANCES, "")?;
        Ok(all.into_iter().find(|i| i.instance_id == instance_id))
    }

    /// Add a replica the way a managed service does: it joins the member
    /// list right away and stays "creating" until settled.
    pub fn launch_instance(&self, request: &CreateInstance) -> StateResult<InstanceSnapshot> {
        let mut cluster = self
            .get_cluster(&request.cluster_id)?
            .ok_or_else(|| StateError::NotFound(format!("cluster {}", request.cluster_id)))?;
        if cluster
            .members
            .iter()
            .any(|m| m.instance_id == request.instance_id)
        {
            return Err(StateError::Conflict(format!(
                "instance {} already exists",
                request.instance_id
            )));
        }

        let instance = InstanceSnapshot {
            instance_id: request.instance_id.clone(),
            cluster_id: request.cluster_id.clone(),
            instance_class: request.instance_class.clone(),
            status: STATUS_CREATING.to_string(),
        };
        cluster.members.push(ClusterMember {
            instance_id: request.instance_id.clone(),
            is_writer: false,
        });

        let cluster_value = serde_json::to_vec(&cluster).map_err(map_err!(Serialize))?;
        let instance_value = serde_json::to_vec(&instance).map_err(map_err!(Serialize))?;
        let key = instance_key(&instance.cluster_id, &instance.instance_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut clusters = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            clusters
                .insert(cluster.cluster_id.as_str(), cluster_value.as_slice())
                .map_err(map_err!(Write))?;
            let mut instances = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            instances
                .insert(key.as_str(), instance_value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, engine = %request.engine, class = %instance.instance_class, "instance launched");
        Ok(instance)
    }

    /// Start deleting a replica. It stays listed as "deleting" until settled.
    pub fn retire_instance(&self, instance_id: &str) -> StateResult<InstanceSnapshot> {
        let mut instance = self
            .find_instance(instance_id)?
            .ok_or_else(|| StateError::NotFound(format!("instance {instance_id}")))?;
        let is_writer = self
            .get_cluster(&instance.cluster_id)?
            .and_then(|c| c.writer().map(|w| w.instance_id == instance_id))
            .unwrap_or(false);
        if is_writer {
            return Err(StateError::Conflict(format!(
                "instance {instance_id} is the cluster writer"
            )));
        }

        instance.status = STATUS_DELETING.to_string();
        self.put_instance(&instance)?;
        debug!(instance = %instance_id, "instance deleting");
        Ok(instance)
    }

    /// Finish in-flight modifications: pending instances become available,
    /// deleting instances leave the cluster.
    pub fn settle(&self, cluster_id: &str) -> StateResult<SettleReport> {
        let mut cluster = self
            .get_cluster(cluster_id)?
            .ok_or_else(|| StateError::NotFound(format!("cluster {cluster_id}")))?;
        let instances = self.list_instances(cluster_id)?;
        let mut report = SettleReport::default();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            for mut instance in instances {
                let key = instance_key(cluster_id, &instance.instance_id);
                if instance.status == STATUS_DELETING {
                    table.remove(key.as_str()).map_err(map_err!(Write))?;
                    cluster
                        .members
                        .retain(|m| m.instance_id != instance.instance_id);
                    report.removed.push(instance.instance_id);
                } else if !instance.is_available() {
                    instance.status = STATUS_AVAILABLE.to_string();
                    let value = serde_json::to_vec(&instance).map_err(map_err!(Serialize))?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                    report.promoted.push(instance.instance_id);
                }
            }

            let value = serde_json::to_vec(&cluster).map_err(map_err!(Serialize))?;
            let mut clusters = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            clusters
                .insert(cluster_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            cluster = %cluster_id,
            promoted = report.promoted.len(),
            removed = report.removed.len(),
            "cluster settled"
        );
        Ok(report)
    }

    // ── Alarms ─────────────────────────────────────────────────────

    pub fn set_alarm_state(&self, alarm_name: &str, state: AlarmState) -> StateResult<()> {
        self.put_json(ALARMS, alarm_name, &state)
    }

    pub fn get_alarm_state(&self, alarm_name: &str) -> StateResult<Option<AlarmState>> {
        self.get_json(ALARMS, alarm_name)
    }

    // ── Metric samples ─────────────────────────────────────────────

    pub fn put_sample(&self, series: &Series, sample: &MetricSample) -> StateResult<()> {
        let key = sample_key(&series.key(), sample.timestamp_ms);
        self.put_json(SAMPLES, &key, sample)
    }

    /// Samples of one series inside `window`, oldest first.
    pub fn list_samples(&self, series: &Series, window: &TimeWindow) -> StateResult<Vec<MetricSample>> {
        let samples: Vec<MetricSample> = self.scan_json(SAMPLES, &format!("{}:", series.key()))?;
        Ok(samples
            .into_iter()
            .filter(|s| window.contains(s.timestamp_ms))
            .collect())
    }

    // ── Telemetry ──────────────────────────────────────────────────

    pub fn get_point(&self, database: &str, table: &str, time_ms: u64) -> StateResult<Option<TelemetryPoint>> {
        self.get_json(TELEMETRY, &telemetry_key(database, table, time_ms))
    }

    pub fn put_point(&self, point: &TelemetryPoint) -> StateResult<()> {
        let key = telemetry_key(&point.database, &point.table, point.time_ms);
        self.put_json(TELEMETRY, &key, point)
    }

    /// Telemetry points of one table, oldest first.
    pub fn list_points(&self, database: &str, table: &str) -> StateResult<Vec<TelemetryPoint>> {
        self.scan_json(TELEMETRY, &format!("{database}/{table}:"))
    }

    // ── Fixtures ───────────────────────────────────────────────────

    /// Seed the store. Relative sample ages are resolved against `now_ms`.
    pub fn load_fixture(&self, fixture: &Fixture, now_ms: u64) -> StateResult<()> {
        for cluster in &fixture.clusters {
            self.put_cluster(cluster)?;
        }
        for instance in &fixture.instances {
            self.put_instance(instance)?;
        }
        for (name, state) in &fixture.alarms {
            self.set_alarm_state(name, *state)?;
        }
        for sample in &fixture.samples {
            let timestamp_ms = sample
                .timestamp_ms
                .unwrap_or_else(|| now_ms.saturating_sub(sample.age_secs.saturating_mul(1000)));
            self.put_sample(
                &sample.series,
                &MetricSample {
                    timestamp_ms,
                    value: sample.value,
                },
            )?;
        }
        debug!(
            clusters = fixture.clusters.len(),
            instances = fixture.instances.len(),
            alarms = fixture.alarms.len(),
            samples = fixture.samples.len(),
            "fixture loaded"
        );
        Ok(())
    }
}
