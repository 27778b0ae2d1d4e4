//! Invocation entry points.
//!
//! `scale_up` and `scale_down` always complete: every outcome, including
//! configuration faults, is reported through the returned [`Invocation`]
//! and a log line whose severity tells "nothing to do" apart from
//! "something is wrong". Callers that want faults surfaced to the
//! invoking platform check [`Invocation::is_fault`].

use std::fmt;

use tracing::{error, info, warn};

use docscale_core::*;

use crate::event::TriggerEvent;
use crate::scaler::Autoscaler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    ScaleUp,
    ScaleDown,
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::ScaleUp => write!(f, "scale-up"),
            Procedure::ScaleDown => write!(f, "scale-down"),
        }
    }
}

/// Log severity of an invocation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Outcome of one entry-point call.
#[derive(Debug)]
pub struct Invocation {
    pub procedure: Procedure,
    pub cluster_id: String,
    pub result: ScaleResult<ScalingDecision>,
}

impl Invocation {
    pub fn severity(&self) -> Severity {
        match &self.result {
            Ok(_) => Severity::Info,
            Err(e) if e.is_fault() => Severity::Critical,
            Err(_) => Severity::Warning,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_fault())
    }

    /// The decision that was carried out, if the invocation got that far.
    pub fn decision(&self) -> Option<&ScalingDecision> {
        self.result.as_ref().ok()
    }

    fn log(&self) {
        let procedure = self.procedure;
        let cluster = self.cluster_id.as_str();
        match (&self.result, self.severity()) {
            (Ok(decision), _) => {
                let mutated = decision.is_mutation();
                info!(%procedure, %cluster, %decision, mutated, "invocation complete");
            }
            (Err(e), Severity::Critical) => {
                error!(%procedure, %cluster, error = %e, "invocation aborted");
            }
            (Err(e), _) => {
                warn!(%procedure, %cluster, error = %e, "invocation ended without action");
            }
        }
    }
}

/// Scale-up entry point.
pub async fn scale_up<C, M, T>(scaler: &Autoscaler<'_, C, M, T>, event: &TriggerEvent) -> Invocation
where
    C: ClusterApi,
    M: MetricsApi,
    T: TelemetrySink,
{
    let invocation = Invocation {
        procedure: Procedure::ScaleUp,
        cluster_id: scaler.config().cluster_identifier.clone(),
        result: scaler.scale_up(event).await,
    };
    invocation.log();
    invocation
}

/// Scale-down entry point. The event is accepted for symmetry with
/// scale-up; the procedure decides from the scale-up alarm and the metric.
pub async fn scale_down<C, M, T>(scaler: &Autoscaler<'_, C, M, T>, event: &TriggerEvent) -> Invocation
where
    C: ClusterApi,
    M: MetricsApi,
    T: TelemetrySink,
{
    if let Some(alarm) = &event.alarm_name {
        info!(%alarm, "scale-down triggered by alarm");
    }
    let invocation = Invocation {
        procedure: Procedure::ScaleDown,
        cluster_id: scaler.config().cluster_identifier.clone(),
        result: scaler.scale_down().await,
    };
    invocation.log();
    invocation
}
