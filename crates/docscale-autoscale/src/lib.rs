//! docscale-autoscale: capacity-banded read-replica scaling.
//!
//! Each invocation takes one snapshot of the cluster, decides, and issues
//! at most one mutating call (catch-up excepted). Nothing is carried from
//! one invocation to the next.
//!
//! # Scaling Algorithm
//!
//! ```text
//! scale-up:
//!   min > max                  → abort (config)
//!   replicas >= max            → no action
//!   replicas <  min            → add (min - replicas) replicas, busy state ignored
//!   otherwise, by dispatch policy:
//!     alarm_suffix: "-scaleup"   → add one (busy-gated)
//!                   "-scaledown" → remove one (busy-gated)
//!                   other        → abort (inconsistent state)
//!     capacity:                  → add one (busy-gated)
//!
//! scale-down:
//!   replicas == min            → no action
//!   replicas <  min            → abort (inconsistent state)
//!   scale-up alarm ALARM / INSUFFICIENT_DATA → no action
//!   scale-up alarm OK          → mean(statistic over period) < scaledown_target
//!                                  ? remove one (busy-gated) : no action
//!   scale-up alarm unknown     → abort (inconsistent state)
//! ```

pub mod controller;
pub mod event;
pub mod handler;
pub mod scaler;

#[cfg(test)]
mod testing;

pub use controller::ReplicaCapacityController;
pub use event::TriggerEvent;
pub use handler::{Invocation, Procedure, Severity};
pub use scaler::{Autoscaler, plan_scale_up};
