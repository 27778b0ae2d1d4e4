//! ReplicaCapacityController: guarded add/remove over one cluster snapshot.
//!
//! The controller reads the cluster and its instances exactly once, when it
//! is built, and answers every question from that read. Nothing is
//! refreshed mid-decision, so a decision may act on slightly stale state.
//!
//! The busy check is check-then-act: another invocation can start a
//! modification between `is_busy()` returning false and the create/delete
//! call landing. No lock or conditional write closes that window.

use anyhow::Context;
use tracing::{debug, info, warn};

use docscale_core::*;
use docscale_metrics::TelemetryReporter;

/// Snapshot-backed capacity guard for a single cluster.
pub struct ReplicaCapacityController<'a, C, T> {
    cluster: &'a C,
    telemetry: &'a TelemetryReporter<'a, T>,
    policy: CapacityPolicy,
    engine: String,
    fallback_instance_class: String,
    snapshot: ClusterSnapshot,
    instances: Vec<InstanceSnapshot>,
}

impl<'a, C: ClusterApi, T: TelemetrySink> ReplicaCapacityController<'a, C, T> {
    /// Validate the capacity band and take the cluster snapshot.
    pub async fn new(
        cluster: &'a C,
        telemetry: &'a TelemetryReporter<'a, T>,
        config: &ScalerConfig,
    ) -> ScaleResult<Self> {
        let policy = config.capacity_policy();
        policy.validate()?;

        let cluster_id = config.cluster_identifier.as_str();
        let snapshot = cluster
            .describe_cluster(cluster_id)
            .await
            .with_context(|| format!("describe cluster {cluster_id}"))?;
        let instances = cluster
            .describe_instances(cluster_id)
            .await
            .with_context(|| format!("describe instances of {cluster_id}"))?;

        debug!(
            cluster = %cluster_id,
            members = snapshot.members.len(),
            instances = instances.len(),
            "cluster snapshot taken"
        );

        Ok(Self {
            cluster,
            telemetry,
            policy,
            engine: config.cluster.engine.clone(),
            fallback_instance_class: config.cluster.fallback_instance_class.clone(),
            snapshot,
            instances,
        })
    }

    pub fn cluster_id(&self) -> &str {
        &self.snapshot.cluster_id
    }

    /// True if any instance is in a state other than "available".
    pub fn is_busy(&self) -> bool {
        self.instances.iter().any(|i| !i.is_available())
    }

    /// Number of members whose writer flag is false.
    pub fn replica_count(&self) -> u32 {
        self.snapshot.replica_count()
    }

    /// Class of the writer instance, or the configured fallback when the
    /// writer cannot be cross-referenced against the instance list.
    pub fn primary_instance_class(&self) -> &str {
        let class = self.snapshot.writer().and_then(|writer| {
            self.instances
                .iter()
                .find(|i| i.instance_id == writer.instance_id)
                .map(|i| i.instance_class.as_str())
        });

        match class {
            Some(class) => class,
            None => {
                warn!(
                    cluster = %self.cluster_id(),
                    fallback = %self.fallback_instance_class,
                    "writer instance not found in snapshot, using fallback class"
                );
                &self.fallback_instance_class
            }
        }
    }

    /// Add one replica with the writer's instance class.
    pub async fn add_replica(&self, ignore_busy: bool) -> ScaleResult<InstanceSnapshot> {
        let replicas = self.replica_count();
        if replicas >= self.policy.max_capacity {
            return Err(ScaleError::CapacityExhausted {
                bound: CapacityBound::Ceiling,
                replicas,
                limit: self.policy.max_capacity,
            });
        }
        if !ignore_busy && self.is_busy() {
            return Err(ScaleError::ClusterBusy {
                cluster_id: self.cluster_id().to_string(),
            });
        }

        let request = CreateInstance {
            cluster_id: self.cluster_id().to_string(),
            instance_id: new_instance_id(self.cluster_id()),
            instance_class: self.primary_instance_class().to_string(),
            engine: self.engine.clone(),
        };
        let created = self
            .cluster
            .create_instance(&request)
            .await
            .with_context(|| format!("create instance {}", request.instance_id))?;

        info!(
            cluster = %request.cluster_id,
            instance = %created.instance_id,
            class = %request.instance_class,
            ignore_busy,
            "replica creation requested"
        );

        self.telemetry.report(replicas).await;
        Ok(created)
    }

    /// Remove the first non-writer member in snapshot order. Which replica
    /// goes is a policy of this controller, not a guarantee of the API's
    /// member ordering.
    pub async fn remove_replica(&self, ignore_busy: bool) -> ScaleResult<InstanceSnapshot> {
        let replicas = self.replica_count();
        if replicas <= self.policy.min_capacity {
            return Err(ScaleError::CapacityExhausted {
                bound: CapacityBound::Floor,
                replicas,
                limit: self.policy.min_capacity,
            });
        }
        if !ignore_busy && self.is_busy() {
            return Err(ScaleError::ClusterBusy {
                cluster_id: self.cluster_id().to_string(),
            });
        }

        let target = self.snapshot.replicas().next().ok_or_else(|| {
            ScaleError::InconsistentState(format!(
                "cluster {} reports {replicas} replica(s) but lists none",
                self.cluster_id()
            ))
        })?;
        let deleted = self
            .cluster
            .delete_instance(&target.instance_id)
            .await
            .with_context(|| format!("delete instance {}", target.instance_id))?;

        info!(
            cluster = %self.cluster_id(),
            instance = %deleted.instance_id,
            ignore_busy,
            "replica deletion requested"
        );

        self.telemetry.report(replicas).await;
        Ok(deleted)
    }
}

/// `{cluster_id}-{8 hex chars}`.
fn new_instance_id(cluster_id: &str) -> String {
    format!("{cluster_id}-{:08x}", rand::random::<u32>())
}
