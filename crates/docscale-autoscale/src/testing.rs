//! In-process fake of all three collaborators, recording every call.

use std::cell::{Cell, RefCell};

use docscale_core::*;

pub(crate) const WRITER_CLASS: &str = "db.r6g.xlarge";

pub(crate) struct FakeCloud {
    pub snapshot: ClusterSnapshot,
    pub instances: Vec<InstanceSnapshot>,
    pub alarm_state: AlarmState,
    pub samples: Vec<MetricSample>,
    pub fail_create: bool,
    pub telemetry_error: Option<TelemetryError>,

    pub describe_calls: Cell<u32>,
    pub alarm_reads: Cell<u32>,
    pub sample_queries: RefCell<Vec<MetricQuery>>,
    pub created: RefCell<Vec<CreateInstance>>,
    pub deleted: RefCell<Vec<String>>,
    pub points: RefCell<Vec<TelemetryPoint>>,
}

impl FakeCloud {
    /// A writer followed by `replicas` available replicas.
    pub fn with_replicas(cluster_id: &str, replicas: u32) -> Self {
        let mut members = vec![ClusterMember {
            instance_id: format!("{cluster_id}-writer"),
            is_writer: true,
        }];
        members.extend((0..replicas).map(|i| ClusterMember {
            instance_id: format!("{cluster_id}-r{i}"),
            is_writer: false,
        }));
        let instances = members
            .iter()
            .map(|m| InstanceSnapshot {
                instance_id: m.instance_id.clone(),
                cluster_id: cluster_id.to_string(),
                instance_class: WRITER_CLASS.to_string(),
                status: STATUS_AVAILABLE.to_string(),
            })
            .collect();

        Self {
            snapshot: ClusterSnapshot {
                cluster_id: cluster_id.to_string(),
                members,
            },
            instances,
            alarm_state: AlarmState::Ok,
            samples: Vec::new(),
            fail_create: false,
            telemetry_error: None,
            describe_calls: Cell::new(0),
            alarm_reads: Cell::new(0),
            sample_queries: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
            points: RefCell::new(Vec::new()),
        }
    }

    /// Mark the last instance as mid-modification.
    pub fn busy(mut self) -> Self {
        if let Some(last) = self.instances.last_mut() {
            last.status = "modifying".to_string();
        }
        self
    }

    pub fn with_alarm(mut self, state: AlarmState) -> Self {
        self.alarm_state = state;
        self
    }

    pub fn with_samples(mut self, values: &[f64]) -> Self {
        self.samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample {
                timestamp_ms: 1_000 * i as u64,
                value: *v,
            })
            .collect();
        self
    }

    pub fn mutations(&self) -> usize {
        self.created.borrow().len() + self.deleted.borrow().len()
    }
}

impl ClusterApi for FakeCloud {
    async fn describe_cluster(&self, _cluster_id: &str) -> anyhow::Result<ClusterSnapshot> {
        self.describe_calls.set(self.describe_calls.get() + 1);
        Ok(self.snapshot.clone())
    }

    async fn describe_instances(&self, _cluster_id: &str) -> anyhow::Result<Vec<InstanceSnapshot>> {
        Ok(self.instances.clone())
    }

    async fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<InstanceSnapshot> {
        self.created.borrow_mut().push(request.clone());
        if self.fail_create {
            anyhow::bail!("insufficient instance capacity");
        }
        Ok(InstanceSnapshot {
            instance_id: request.instance_id.clone(),
            cluster_id: request.cluster_id.clone(),
            instance_class: request.instance_class.clone(),
            status: "creating".to_string(),
        })
    }

    async fn delete_instance(&self, instance_id: &str) -> anyhow::Result<InstanceSnapshot> {
        self.deleted.borrow_mut().push(instance_id.to_string());
        let mut instance = self
            .instances
            .iter()
            .find(|i| i.instance_id == instance_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("instance {instance_id} not found"))?;
        instance.status = "deleting".to_string();
        Ok(instance)
    }
}

impl MetricsApi for FakeCloud {
    async fn describe_alarm_state(&self, _alarm_name: &str) -> anyhow::Result<AlarmState> {
        self.alarm_reads.set(self.alarm_reads.get() + 1);
        Ok(self.alarm_state)
    }

    async fn get_statistic_samples(&self, query: &MetricQuery) -> anyhow::Result<Vec<MetricSample>> {
        self.sample_queries.borrow_mut().push(query.clone());
        Ok(self.samples.clone())
    }
}

impl TelemetrySink for FakeCloud {
    async fn write_point(&self, point: &TelemetryPoint) -> Result<WriteAck, TelemetryError> {
        self.points.borrow_mut().push(point.clone());
        match &self.telemetry_error {
            Some(err) => Err(err.clone()),
            None => Ok(WriteAck {
                records_ingested: 1,
            }),
        }
    }
}

/// Scaffolded configuration with the given capacity band.
pub(crate) fn config(cluster_id: &str, min: u32, max: u32) -> ScalerConfig {
    let mut config = ScalerConfig::scaffold(cluster_id);
    config.min_capacity = min;
    config.max_capacity = max;
    config
}
