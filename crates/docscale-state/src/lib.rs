//! docscale-state: standalone stand-in for the provider services.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for cluster membership, instances, alarm states, metric samples,
//! and telemetry points, and implements `ClusterApi`, `MetricsApi`, and
//! `TelemetrySink` over it.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{cluster}:{instance}`, `{series}:{timestamp}`) enable
//! prefix scans for related records.
//!
//! Mutations behave like a managed service: created replicas start out
//! "creating", deleted ones linger as "deleting", and `settle()` completes
//! both. That keeps the busy gate observable between invocations.

pub mod cloud;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
