//! Serializable capture of an environment's mutable state.

use serde::{Deserialize, Serialize};

use super::{EnvConfig, EpisodeState};
use crate::error::EnvError;

/// Everything needed to resume a batch of episodes on the same instances.
///
/// The instances themselves are not included; restore a snapshot into an
/// environment built over the batch it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    vehicle_count: usize,
    node_count: usize,
    config: EnvConfig,
    episodes: Vec<EpisodeState>,
}

impl Snapshot {
    pub(crate) fn new(
        vehicle_count: usize,
        node_count: usize,
        config: EnvConfig,
        episodes: Vec<EpisodeState>,
    ) -> Self {
        Self {
            vehicle_count,
            node_count,
            config,
            episodes,
        }
    }

    /// Vehicles per episode at capture time.
    pub fn vehicle_count(&self) -> usize {
        self.vehicle_count
    }

    /// Nodes per instance at capture time.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Configuration in force at capture time.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Captured episode states, one per batch element.
    pub fn episodes(&self) -> &[EpisodeState] {
        &self.episodes
    }

    pub(crate) fn into_parts(self) -> (EnvConfig, Vec<EpisodeState>) {
        (self.config, self.episodes)
    }

    /// Serializes to JSON. Floats round-trip exactly.
    pub fn to_json(&self) -> Result<String, EnvError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, EnvError> {
        Ok(serde_json::from_str(json)?)
    }
}
