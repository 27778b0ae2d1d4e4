//! docscale.toml configuration parser.
//!
//! The ten recognised options sit at the top level of the file and share
//! their names with the environment variables read by [`ScalerConfig::from_env`].
//! Everything else lives in optional tables with provider defaults.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScaleError, ScaleResult};
use crate::types::{CapacityPolicy, Statistic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerConfig {
    pub cluster_identifier: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Alarm that fires when the cluster needs more replicas. Scale-down
    /// refuses to act unless it reads OK.
    pub scaleup_alarm_name: String,
    pub metric_name: String,
    /// Scale-up threshold of the external alarm. Recorded, not evaluated here.
    pub target: f64,
    pub scaledown_target: f64,
    pub statistic: Statistic,
    /// Trailing metric window in seconds.
    pub period: u64,
    /// Alarm cooldown in seconds. Recorded, not evaluated here.
    pub cooldown: u64,
    /// Surface faults as a failed invocation instead of only logging them.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub metric_source: MetricSourceConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub engine: String,
    /// Class used for new replicas when the writer cannot be resolved.
    pub fallback_instance_class: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            engine: "docdb".to_string(),
            fallback_instance_class: "db.r5.large".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSourceConfig {
    pub namespace: String,
    /// Dimension whose value is the cluster identifier.
    pub dimension_name: String,
}

impl Default for MetricSourceConfig {
    fn default() -> Self {
        Self {
            namespace: "AWS/DocDB".to_string(),
            dimension_name: "DBClusterIdentifier".to_string(),
        }
    }
}

/// How scale-up chooses its action once the replica count sits inside the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleUpDispatch {
    /// Key off the triggering alarm's name suffix.
    #[default]
    AlarmSuffix,
    /// Add a replica whenever there is room, whatever the event says.
    Capacity,
}

impl FromStr for ScaleUpDispatch {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "alarm_suffix" => Ok(ScaleUpDispatch::AlarmSuffix),
            "capacity" => Ok(ScaleUpDispatch::Capacity),
            other => Err(ScaleError::Config(format!("unknown dispatch policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub policy: ScaleUpDispatch,
    pub scaleup_suffix: String,
    pub scaledown_suffix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: ScaleUpDispatch::AlarmSuffix,
            scaleup_suffix: "-scaleup".to_string(),
            scaledown_suffix: "-scaledown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub database: String,
    /// The table name is this prefix followed by the cluster identifier.
    pub table_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: "bria".to_string(),
            table_prefix: "docdb-".to_string(),
        }
    }
}

impl ScalerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScalerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> ScaleResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any name lookup. Each option is tried
    /// under its own name, then upper-cased.
    pub fn from_lookup<F>(lookup: F) -> ScaleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&name.to_uppercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            get(name).ok_or_else(|| ScaleError::Config(format!("missing option: {name}")))
        };

        let mut config = ScalerConfig {
            cluster_identifier: required("cluster_identifier")?,
            min_capacity: parse_option("min_capacity", &required("min_capacity")?)?,
            max_capacity: parse_option("max_capacity", &required("max_capacity")?)?,
            scaleup_alarm_name: required("scaleup_alarm_name")?,
            metric_name: required("metric_name")?,
            target: parse_option("target", &required("target")?)?,
            scaledown_target: parse_option("scaledown_target", &required("scaledown_target")?)?,
            statistic: required("statistic")?.parse()?,
            period: parse_option("period", &required("period")?)?,
            cooldown: parse_option("cooldown", &required("cooldown")?)?,
            strict: false,
            cluster: ClusterSettings::default(),
            metric_source: MetricSourceConfig::default(),
            dispatch: DispatchConfig::default(),
            telemetry: TelemetryConfig::default(),
        };

        if let Some(v) = get("strict") {
            config.strict = parse_option("strict", &v)?;
        }
        if let Some(v) = get("engine") {
            config.cluster.engine = v;
        }
        if let Some(v) = get("fallback_instance_class") {
            config.cluster.fallback_instance_class = v;
        }
        if let Some(v) = get("metric_namespace") {
            config.metric_source.namespace = v;
        }
        if let Some(v) = get("dimension_name") {
            config.metric_source.dimension_name = v;
        }
        if let Some(v) = get("scaleup_dispatch") {
            config.dispatch.policy = v.parse()?;
        }
        if let Some(v) = get("scaleup_suffix") {
            config.dispatch.scaleup_suffix = v;
        }
        if let Some(v) = get("scaledown_suffix") {
            config.dispatch.scaledown_suffix = v;
        }
        if let Some(v) = get("telemetry_enabled") {
            config.telemetry.enabled = parse_option("telemetry_enabled", &v)?;
        }
        if let Some(v) = get("telemetry_database") {
            config.telemetry.database = v;
        }
        if let Some(v) = get("telemetry_table_prefix") {
            config.telemetry.table_prefix = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Structural checks applied at load time. The capacity band is left to
    /// each invocation, which reports an inverted band as a `Config`
    /// outcome instead of failing before it starts.
    pub fn validate(&self) -> ScaleResult<()> {
        if self.cluster_identifier.trim().is_empty() {
            return Err(ScaleError::Config("cluster_identifier is empty".to_string()));
        }
        if self.scaleup_alarm_name.trim().is_empty() {
            return Err(ScaleError::Config("scaleup_alarm_name is empty".to_string()));
        }
        if self.metric_name.trim().is_empty() {
            return Err(ScaleError::Config("metric_name is empty".to_string()));
        }
        if self.period == 0 {
            return Err(ScaleError::Config("period must be at least one second".to_string()));
        }
        if !self.scaledown_target.is_finite() || !self.target.is_finite() {
            return Err(ScaleError::Config("targets must be finite numbers".to_string()));
        }
        Ok(())
    }

    pub fn capacity_policy(&self) -> CapacityPolicy {
        CapacityPolicy::new(self.min_capacity, self.max_capacity)
    }

    /// Telemetry table for this cluster.
    pub fn telemetry_table(&self) -> String {
        format!("{}{}", self.telemetry.table_prefix, self.cluster_identifier)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a starter configuration for the given cluster.
    pub fn scaffold(cluster_identifier: &str) -> Self {
        ScalerConfig {
            cluster_identifier: cluster_identifier.to_string(),
            min_capacity: 0,
            max_capacity: 15,
            scaleup_alarm_name: format!("{cluster_identifier}-scaleup"),
            metric_name: "CPUUtilization".to_string(),
            target: 70.0,
            scaledown_target: 30.0,
            statistic: Statistic::Average,
            period: 300,
            cooldown: 120,
            strict: false,
            cluster: ClusterSettings::default(),
            metric_source: MetricSourceConfig::default(),
            dispatch: DispatchConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn parse_option<T: FromStr>(name: &str, value: &str) -> ScaleResult<T> {
    value
        .parse()
        .map_err(|_| ScaleError::Config(format!("option {name} has an invalid value: {value}")))
}
