//! Error types for docscale.

use thiserror::Error;

use crate::types::CapacityBound;

/// Result type alias for scaling operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Reasons an invocation stops before (or instead of) mutating the cluster.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{bound} capacity reached: {replicas} replica(s), limit {limit}")]
    CapacityExhausted {
        bound: CapacityBound,
        replicas: u32,
        limit: u32,
    },

    #[error("cluster {cluster_id} is busy: an instance is not available")]
    ClusterBusy { cluster_id: String },

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("no metric samples to aggregate")]
    EmptySamples,

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl ScaleError {
    /// Whether this outcome points at something broken rather than
    /// "nothing to do right now".
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ScaleError::Config(_) | ScaleError::InconsistentState(_) | ScaleError::Api(_)
        )
    }
}
