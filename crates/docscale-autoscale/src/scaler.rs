//! Autoscaler: the scale-up and scale-down procedures.
//!
//! An `Autoscaler` borrows the configuration and the three collaborators
//! for the length of one invocation. Each procedure builds a fresh
//! controller (one snapshot read), decides, and issues at most one
//! mutating call. The exception is scale-up catch-up, which issues one
//! busy-bypassing add per missing replica without re-reading state.

use std::cmp::Ordering;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use docscale_core::config::DispatchConfig;
use docscale_core::*;
use docscale_metrics::{MetricEvaluator, TelemetryReporter};

use crate::controller::ReplicaCapacityController;
use crate::event::{AlarmKey, TriggerEvent};

/// Per-invocation scaling context.
pub struct Autoscaler<'a, C, M, T> {
    config: &'a ScalerConfig,
    cluster: &'a C,
    metrics: &'a M,
    telemetry: TelemetryReporter<'a, T>,
}

impl<'a, C, M, T> Autoscaler<'a, C, M, T>
where
    C: ClusterApi,
    M: MetricsApi,
    T: TelemetrySink,
{
    pub fn new(config: &'a ScalerConfig, cluster: &'a C, metrics: &'a M, sink: &'a T) -> Self {
        Self {
            config,
            cluster,
            metrics,
            telemetry: TelemetryReporter::new(sink, config),
        }
    }

    pub fn config(&self) -> &ScalerConfig {
        self.config
    }

    async fn controller(&self) -> ScaleResult<ReplicaCapacityController<'_, C, T>> {
        ReplicaCapacityController::new(self.cluster, &self.telemetry, self.config).await
    }

    /// Scale-up procedure. Returns the decision that was carried out.
    pub async fn scale_up(&self, event: &TriggerEvent) -> ScaleResult<ScalingDecision> {
        let policy = self.config.capacity_policy();
        policy.validate()?;

        let controller = self.controller().await?;
        let replicas = controller.replica_count();
        info!(
            cluster = %controller.cluster_id(),
            replicas,
            min = policy.min_capacity,
            max = policy.max_capacity,
            alarm = ?event.alarm_name,
            "scale-up initiated"
        );

        let decision = plan_scale_up(&policy, replicas, event, &self.config.dispatch);
        match &decision {
            ScalingDecision::NoAction => {
                info!(replicas, max = policy.max_capacity, "at or above max_capacity, no action taken");
            }
            ScalingDecision::CatchUp { missing } => {
                warn!(replicas, missing, "below min_capacity, adding replicas to meet the minimum");
                let mut first_failure = None;
                for attempt in 1..=*missing {
                    // Baseline establishment proceeds through transient busy states.
                    if let Err(e) = controller.add_replica(true).await {
                        error!(attempt, missing, error = %e, "catch-up replica add failed");
                        first_failure.get_or_insert(e);
                    }
                }
                if let Some(e) = first_failure {
                    return Err(e);
                }
            }
            ScalingDecision::AddReplica => {
                controller.add_replica(false).await?;
            }
            ScalingDecision::RemoveReplica => {
                controller.remove_replica(false).await?;
            }
            ScalingDecision::Abort(reason) => {
                return Err(ScaleError::InconsistentState(reason.clone()));
            }
        }
        Ok(decision)
    }

    /// Scale-down procedure. Returns the decision that was carried out.
    pub async fn scale_down(&self) -> ScaleResult<ScalingDecision> {
        let policy = self.config.capacity_policy();
        policy.validate()?;

        let controller = self.controller().await?;
        let replicas = controller.replica_count();
        info!(
            cluster = %controller.cluster_id(),
            replicas,
            min = policy.min_capacity,
            "scale-down initiated"
        );

        match replicas.cmp(&policy.min_capacity) {
            Ordering::Equal => {
                info!(replicas, "replica count equals min_capacity, no action taken");
                return Ok(ScalingDecision::NoAction);
            }
            Ordering::Less => {
                return Err(ScaleError::InconsistentState(format!(
                    "{replicas} replica(s) is below min_capacity {}; scale-up should have restored the baseline",
                    policy.min_capacity
                )));
            }
            Ordering::Greater => {}
        }

        let alarm = self.config.scaleup_alarm_name.as_str();
        let state = self
            .metrics
            .describe_alarm_state(alarm)
            .await
            .with_context(|| format!("describe alarm {alarm}"))?;
        debug!(%alarm, %state, "scale-up alarm state read");

        match state {
            AlarmState::Alarm => {
                info!(%alarm, "scale-up alarm is active, no action taken");
                Ok(ScalingDecision::NoAction)
            }
            AlarmState::InsufficientData => {
                info!(%alarm, "scale-up alarm has insufficient data, no action taken");
                Ok(ScalingDecision::NoAction)
            }
            AlarmState::Unknown => Err(ScaleError::InconsistentState(format!(
                "could not determine the state of alarm {alarm}"
            ))),
            AlarmState::Ok => {
                let query = self.metric_query(epoch_millis());
                let samples = self
                    .metrics
                    .get_statistic_samples(&query)
                    .await
                    .with_context(|| format!("get {} {}", query.statistic, query.metric_name))?;
                let average = MetricEvaluator::mean_of(&samples)?;
                let target = self.config.scaledown_target;

                if average < target {
                    info!(
                        statistic = %query.statistic,
                        metric = %query.metric_name,
                        average,
                        target,
                        period = query.period_secs,
                        "metric below scaledown_target, scaling down"
                    );
                    controller.remove_replica(false).await?;
                    Ok(ScalingDecision::RemoveReplica)
                } else {
                    info!(
                        statistic = %query.statistic,
                        metric = %query.metric_name,
                        average,
                        target,
                        period = query.period_secs,
                        "metric at or above scaledown_target, no action taken"
                    );
                    Ok(ScalingDecision::NoAction)
                }
            }
        }
    }

    /// Statistic query over the trailing `period` seconds ending at `now_ms`.
    pub fn metric_query(&self, now_ms: u64) -> MetricQuery {
        MetricQuery {
            namespace: self.config.metric_source.namespace.clone(),
            metric_name: self.config.metric_name.clone(),
            dimension: Dimension::new(
                &self.config.metric_source.dimension_name,
                &self.config.cluster_identifier,
            ),
            window: TimeWindow::trailing(self.config.period, now_ms),
            period_secs: self.config.period,
            statistic: self.config.statistic,
        }
    }
}

/// Decide what scale-up should do for a replica count inside a valid band.
pub fn plan_scale_up(
    policy: &CapacityPolicy,
    replicas: u32,
    event: &TriggerEvent,
    dispatch: &DispatchConfig,
) -> ScalingDecision {
    if replicas >= policy.max_capacity {
        return ScalingDecision::NoAction;
    }
    if replicas < policy.min_capacity {
        return ScalingDecision::CatchUp {
            missing: policy.min_capacity - replicas,
        };
    }

    match dispatch.policy {
        ScaleUpDispatch::Capacity => ScalingDecision::AddReplica,
        ScaleUpDispatch::AlarmSuffix => match event.alarm_key(dispatch) {
            AlarmKey::ScaleUp => ScalingDecision::AddReplica,
            AlarmKey::ScaleDown => ScalingDecision::RemoveReplica,
            AlarmKey::Unrecognized => ScalingDecision::Abort(format!(
                "alarm {} matches neither {:?} nor {:?}",
                event.alarm_name.as_deref().unwrap_or_default(),
                dispatch.scaleup_suffix,
                dispatch.scaledown_suffix
            )),
            AlarmKey::Missing => {
                ScalingDecision::Abort("triggering event carries no alarm name".to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, config};

    fn autoscaler<'a>(
        cfg: &'a ScalerConfig,
        cloud: &'a FakeCloud,
    ) -> Autoscaler<'a, FakeCloud, FakeCloud, FakeCloud> {
        Autoscaler::new(cfg, cloud, cloud, cloud)
    }

    // ── plan_scale_up ──────────────────────────────────────────────

    #[test]
    fn plan_is_no_action_at_ceiling() {
        let dispatch = DispatchConfig::default();
        let event = TriggerEvent::for_alarm("c1-scaleup");
        let policy = CapacityPolicy::new(0, 3);
        assert_eq!(plan_scale_up(&policy, 3, &event, &dispatch), ScalingDecision::NoAction);
        assert_eq!(plan_scale_up(&policy, 7, &event, &dispatch), ScalingDecision::NoAction);
    }

    #[test]
    fn plan_catches_up_regardless_of_event() {
        let dispatch = DispatchConfig::default();
        let policy = CapacityPolicy::new(4, 6);
        for event in [
            TriggerEvent::default(),
            TriggerEvent::for_alarm("c1-scaledown"),
            TriggerEvent::for_alarm("garbage"),
        ] {
            assert_eq!(
                plan_scale_up(&policy, 1, &event, &dispatch),
                ScalingDecision::CatchUp { missing: 3 }
            );
        }
    }

    #[test]
    fn plan_dispatches_on_alarm_suffix() {
        let dispatch = DispatchConfig::default();
        let policy = CapacityPolicy::new(1, 5);
        assert_eq!(
            plan_scale_up(&policy, 2, &TriggerEvent::for_alarm("c1-scaleup"), &dispatch),
            ScalingDecision::AddReplica
        );
        assert_eq!(
            plan_scale_up(&policy, 2, &TriggerEvent::for_alarm("c1-scaledown"), &dispatch),
            ScalingDecision::RemoveReplica
        );
        assert!(matches!(
            plan_scale_up(&policy, 2, &TriggerEvent::for_alarm("c1-cpu"), &dispatch),
            ScalingDecision::Abort(_)
        ));
        assert!(matches!(
            plan_scale_up(&policy, 2, &TriggerEvent::default(), &dispatch),
            ScalingDecision::Abort(_)
        ));
    }

    #[test]
    fn plan_capacity_dispatch_ignores_event() {
        let dispatch = DispatchConfig {
            policy: ScaleUpDispatch::Capacity,
            ..DispatchConfig::default()
        };
        let policy = CapacityPolicy::new(1, 5);
        assert_eq!(
            plan_scale_up(&policy, 2, &TriggerEvent::for_alarm("c1-scaledown"), &dispatch),
            ScalingDecision::AddReplica
        );
        assert_eq!(
            plan_scale_up(&policy, 2, &TriggerEvent::default(), &dispatch),
            ScalingDecision::AddReplica
        );
    }

    // ── scale_up ───────────────────────────────────────────────────

    #[tokio::test]
    async fn scale_up_catch_up_from_zero() {
        let cloud = FakeCloud::with_replicas("c1", 0);
        let cfg = config("c1", 2, 5);

        let decision = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::default())
            .await
            .unwrap();

        assert_eq!(decision, ScalingDecision::CatchUp { missing: 2 });
        assert_eq!(cloud.created.borrow().len(), 2);
        assert_eq!(cloud.alarm_reads.get(), 0);
        assert_eq!(cloud.describe_calls.get(), 1);
    }

    #[tokio::test]
    async fn scale_up_catch_up_bypasses_busy_state() {
        let cloud = FakeCloud::with_replicas("c1", 1).busy();
        let cfg = config("c1", 4, 6);

        let decision = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaledown"))
            .await
            .unwrap();

        assert_eq!(decision, ScalingDecision::CatchUp { missing: 3 });
        assert_eq!(cloud.created.borrow().len(), 3);
        assert!(cloud.deleted.borrow().is_empty());
    }

    #[tokio::test]
    async fn scale_up_catch_up_issues_every_call_even_after_failures() {
        let mut cloud = FakeCloud::with_replicas("c1", 0);
        cloud.fail_create = true;
        let cfg = config("c1", 3, 5);

        let result = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::default())
            .await;

        assert!(matches!(result, Err(ScaleError::Api(_))));
        assert_eq!(cloud.created.borrow().len(), 3);
    }

    #[tokio::test]
    async fn scale_up_at_floor_and_ceiling_is_pure_no_action() {
        let cloud = FakeCloud::with_replicas("c1", 1);
        let cfg = config("c1", 1, 1);

        let decision = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaleup"))
            .await
            .unwrap();

        assert_eq!(decision, ScalingDecision::NoAction);
        assert_eq!(cloud.mutations(), 0);
        assert_eq!(cloud.alarm_reads.get(), 0);
        assert!(cloud.points.borrow().is_empty());
    }

    #[tokio::test]
    async fn scale_up_rejects_inverted_band_without_reading() {
        let cloud = FakeCloud::with_replicas("c1", 1);
        let cfg = config("c1", 5, 2);

        let result = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaleup"))
            .await;

        assert!(matches!(result, Err(ScaleError::Config(_))));
        assert_eq!(cloud.describe_calls.get(), 0);
    }

    #[tokio::test]
    async fn scale_up_alarm_adds_one_replica() {
        let cloud = FakeCloud::with_replicas("c1", 2);
        let cfg = config("c1", 1, 5);

        let decision = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaleup"))
            .await
            .unwrap();

        assert_eq!(decision, ScalingDecision::AddReplica);
        assert_eq!(cloud.created.borrow().len(), 1);
        assert_eq!(cloud.points.borrow().len(), 1);
    }

    #[tokio::test]
    async fn scale_down_alarm_on_scale_up_path_removes_one_replica() {
        let cloud = FakeCloud::with_replicas("c1", 2);
        let cfg = config("c1", 1, 5);

        let decision = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaledown"))
            .await
            .unwrap();

        assert_eq!(decision, ScalingDecision::RemoveReplica);
        assert_eq!(*cloud.deleted.borrow(), vec!["c1-r0".to_string()]);
    }

    #[tokio::test]
    async fn scale_up_unrecognized_alarm_is_inconsistent_state() {
        let cloud = FakeCloud::with_replicas("c1", 2);
        let cfg = config("c1", 1, 5);

        let result = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-latency"))
            .await;

        assert!(matches!(result, Err(ScaleError::InconsistentState(_))));
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn scale_up_busy_cluster_blocks_single_add() {
        let cloud = FakeCloud::with_replicas("c1", 2).busy();
        let cfg = config("c1", 1, 5);

        let result = autoscaler(&cfg, &cloud)
            .scale_up(&TriggerEvent::for_alarm("c1-scaleup"))
            .await;

        assert!(matches!(result, Err(ScaleError::ClusterBusy { .. })));
        assert_eq!(cloud.mutations(), 0);
    }

    // ── scale_down ─────────────────────────────────────────────────

    #[tokio::test]
    async fn scale_down_at_floor_is_no_action() {
        let cloud = FakeCloud::with_replicas("c1", 2).with_samples(&[1.0]);
        let cfg = config("c1", 2, 5);

        let decision = autoscaler(&cfg, &cloud).scale_down().await.unwrap();

        assert_eq!(decision, ScalingDecision::NoAction);
        assert_eq!(cloud.alarm_reads.get(), 0);
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn scale_down_below_floor_is_inconsistent_state() {
        let cloud = FakeCloud::with_replicas("c1", 1);
        let cfg = config("c1", 2, 5);

        let result = autoscaler(&cfg, &cloud).scale_down().await;

        assert!(matches!(result, Err(ScaleError::InconsistentState(_))));
        assert_eq!(cloud.mutations(), 0);
        assert_eq!(cloud.alarm_reads.get(), 0);
    }

    #[tokio::test]
    async fn scale_down_with_active_alarm_never_acts() {
        for state in [AlarmState::Alarm, AlarmState::InsufficientData] {
            let cloud = FakeCloud::with_replicas("c1", 3)
                .with_alarm(state)
                .with_samples(&[0.0, 0.0]);
            let cfg = config("c1", 1, 5);

            let decision = autoscaler(&cfg, &cloud).scale_down().await.unwrap();

            assert_eq!(decision, ScalingDecision::NoAction);
            assert!(cloud.sample_queries.borrow().is_empty());
            assert_eq!(cloud.mutations(), 0);
        }
    }

    #[tokio::test]
    async fn scale_down_with_unknown_alarm_state_is_inconsistent() {
        let cloud = FakeCloud::with_replicas("c1", 3)
            .with_alarm(AlarmState::Unknown)
            .with_samples(&[0.0]);
        let cfg = config("c1", 1, 5);

        let result = autoscaler(&cfg, &cloud).scale_down().await;

        assert!(matches!(result, Err(ScaleError::InconsistentState(_))));
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn scale_down_below_target_removes_exactly_one() {
        let cloud = FakeCloud::with_replicas("c1", 3).with_samples(&[4.0, 6.0]);
        let mut cfg = config("c1", 1, 5);
        cfg.scaledown_target = 10.0;

        let decision = autoscaler(&cfg, &cloud).scale_down().await.unwrap();

        assert_eq!(decision, ScalingDecision::RemoveReplica);
        assert_eq!(cloud.deleted.borrow().len(), 1);
        assert!(cloud.created.borrow().is_empty());
        assert_eq!(cloud.alarm_reads.get(), 1);
    }

    #[tokio::test]
    async fn scale_down_at_or_above_target_is_no_action() {
        for samples in [[10.0, 10.0], [50.0, 70.0]] {
            let cloud = FakeCloud::with_replicas("c1", 3).with_samples(&samples);
            let mut cfg = config("c1", 1, 5);
            cfg.scaledown_target = 10.0;

            let decision = autoscaler(&cfg, &cloud).scale_down().await.unwrap();

            assert_eq!(decision, ScalingDecision::NoAction);
            assert_eq!(cloud.mutations(), 0);
        }
    }

    #[tokio::test]
    async fn scale_down_without_samples_aborts() {
        let cloud = FakeCloud::with_replicas("c1", 3);
        let cfg = config("c1", 1, 5);

        let result = autoscaler(&cfg, &cloud).scale_down().await;

        assert!(matches!(result, Err(ScaleError::EmptySamples)));
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn scale_down_busy_cluster_is_blocked() {
        let cloud = FakeCloud::with_replicas("c1", 3).busy().with_samples(&[1.0]);
        let cfg = config("c1", 1, 5);

        let result = autoscaler(&cfg, &cloud).scale_down().await;

        assert!(matches!(result, Err(ScaleError::ClusterBusy { .. })));
        assert_eq!(cloud.mutations(), 0);
    }

    #[tokio::test]
    async fn scale_down_queries_the_configured_series() {
        let cloud = FakeCloud::with_replicas("c1", 3).with_samples(&[99.0]);
        let mut cfg = config("c1", 1, 5);
        cfg.period = 600;
        cfg.statistic = Statistic::Maximum;

        autoscaler(&cfg, &cloud).scale_down().await.unwrap();

        let queries = cloud.sample_queries.borrow();
        assert_eq!(queries.len(), 1);
        let q = &queries[0];
        assert_eq!(q.namespace, "AWS/DocDB");
        assert_eq!(q.metric_name, "CPUUtilization");
        assert_eq!(q.dimension, Dimension::new("DBClusterIdentifier", "c1"));
        assert_eq!(q.statistic, Statistic::Maximum);
        assert_eq!(q.period_secs, 600);
        assert_eq!(q.window.end_ms - q.window.start_ms, 600_000);
    }

    #[test]
    fn metric_query_window_ends_now() {
        let cloud = FakeCloud::with_replicas("c1", 0);
        let cfg = config("c1", 0, 5);
        let query = autoscaler(&cfg, &cloud).metric_query(1_000_000);
        assert_eq!(query.window, TimeWindow::trailing(300, 1_000_000));
    }
}
