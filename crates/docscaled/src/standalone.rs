//! Store tooling: seed fixtures, settle pending changes, inspect a cluster.

use std::path::Path;

use anyhow::Context as _;
use serde_json::json;
use tracing::info;

use docscale_core::{ScalerConfig, epoch_millis};
use docscale_state::Fixture;

use crate::invoke::{self, Context};

pub fn seed(data_dir: &Path, fixture_path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(fixture_path)
        .with_context(|| format!("reading fixture {}", fixture_path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("parsing fixture")?;

    let store = invoke::open_store(data_dir)?;
    store.load_fixture(&fixture, epoch_millis())?;
    info!(
        clusters = fixture.clusters.len(),
        instances = fixture.instances.len(),
        alarms = fixture.alarms.len(),
        samples = fixture.samples.len(),
        "fixture loaded"
    );
    Ok(())
}

pub fn settle(ctx: &Context) -> anyhow::Result<()> {
    let report = ctx.store.settle(&ctx.config.cluster_identifier)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "cluster": ctx.config.cluster_identifier,
            "promoted": report.promoted,
            "removed": report.removed,
        }))?
    );
    Ok(())
}

pub fn status(ctx: &Context) -> anyhow::Result<()> {
    let cluster_id = &ctx.config.cluster_identifier;
    let cluster = ctx
        .store
        .get_cluster(cluster_id)?
        .with_context(|| format!("cluster {cluster_id} is not in the store"))?;
    let instances = ctx.store.list_instances(cluster_id)?;

    let members: Vec<_> = cluster
        .members
        .iter()
        .map(|m| {
            let status = instances
                .iter()
                .find(|i| i.instance_id == m.instance_id)
                .map(|i| i.status.as_str())
                .unwrap_or("unknown");
            json!({
                "instance": m.instance_id,
                "writer": m.is_writer,
                "status": status,
            })
        })
        .collect();

    let alarm = ctx.store.get_alarm_state(&ctx.config.scaleup_alarm_name)?;
    let telemetry = &ctx.config.telemetry;
    let points = ctx
        .store
        .list_points(&telemetry.database, &ctx.config.telemetry_table())?;
    let latest = points.last().map(|p| json!({ "time_ms": p.time_ms, "value": p.measure_value }));

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "cluster": cluster_id,
            "replicas": cluster.replica_count(),
            "capacity": { "min": ctx.config.min_capacity, "max": ctx.config.max_capacity },
            "busy": instances.iter().any(|i| !i.is_available()),
            "members": members,
            "scaleup_alarm": {
                "name": ctx.config.scaleup_alarm_name,
                "state": alarm.map(|a| a.to_string()),
            },
            "telemetry": { "points": points.len(), "latest": latest },
        }))?
    );
    Ok(())
}

pub fn init(cluster: &str) -> anyhow::Result<()> {
    print!("{}", ScalerConfig::scaffold(cluster).to_toml_string()?);
    Ok(())
}
