//! docscale-metrics: metric aggregation and replica-count telemetry.
//!
//! # Architecture
//!
//! ```text
//! MetricEvaluator
//!   └── mean() ← scale-down compares it against scaledown_target
//!
//! TelemetryReporter
//!   └── report() → one replica_count point per successful mutation
//! ```

pub mod evaluator;
pub mod telemetry;

pub use evaluator::MetricEvaluator;
pub use telemetry::TelemetryReporter;
