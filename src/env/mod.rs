//! Transition engine for batched dynamic routing episodes.
//!
//! An [`Environment`] owns one [`EpisodeState`] per instance of a batch.
//! Each step moves the active vehicle (the one with the earliest clock) of
//! every episode to the selected node, recomputes the vehicle × node
//! [`FeasibilityMask`] and reports a reward: travel distance, delivery
//! terms for entities unloaded at the depot, and terminal penalties for
//! customers left unserved.

mod config;
mod environment;
mod episode;
mod mask;
mod reward;
mod snapshot;
mod vehicle;

#[cfg(test)]
mod properties;

pub use config::{DoneCriterion, EnvConfig};
pub use environment::{Environment, StepOutcome};
pub use episode::{EpisodeContext, EpisodeState, Phase, StepReport};
pub use mask::FeasibilityMask;
pub use reward::{delivery_reward, TerminalPenalty};
pub use snapshot::Snapshot;
pub use vehicle::{Onboard, OnboardSet, VehicleState};
