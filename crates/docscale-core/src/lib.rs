//! docscale-core: shared types, configuration, and collaborator traits.
//!
//! Everything the autoscaler needs to describe a cluster, a capacity band,
//! an alarm, or a telemetry point lives here, along with the three traits
//! (`ClusterApi`, `MetricsApi`, `TelemetrySink`) that stand in for the
//! provider services.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use api::{ClusterApi, MetricsApi, RejectedRecord, TelemetryError, TelemetrySink, WriteAck};
pub use config::{ScaleUpDispatch, ScalerConfig};
pub use error::{ScaleError, ScaleResult};
pub use types::*;
