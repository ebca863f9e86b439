//! Error type shared by the instance model and the transition engine.

use thiserror::Error;

/// Errors raised while building instances or driving an environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A generation or configuration argument is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A pickup found no free onboard slot. Unreachable while the
    /// feasibility mask is respected.
    #[error(
        "capacity violation in batch element {batch_index}: vehicle {vehicle} has no free onboard slot for node {node}"
    )]
    CapacityViolation {
        batch_index: usize,
        vehicle: usize,
        node: usize,
    },

    /// The caller selected a node that is masked for the active vehicle.
    #[error("invalid action in batch element {batch_index}: node {node} is not feasible for vehicle {vehicle:?}")]
    InvalidAction {
        batch_index: usize,
        vehicle: Option<usize>,
        node: usize,
    },

    /// Shapes of instance data, actions or snapshots disagree.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A rollout did not terminate within its step bound.
    #[error("episode did not terminate within {limit} steps")]
    StepLimitExceeded { limit: usize },

    /// Snapshot or configuration (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnvError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
