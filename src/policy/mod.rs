//! Decision sources for the environment.
//!
//! A [`Policy`] looks at one batch element through an [`Observation`] and
//! returns the next node for its active vehicle. [`rollout`] drives a whole
//! batch to termination and records the routes each vehicle took.
//!
//! - [`NearestFeasible`]: greedy nearest feasible customer
//! - [`RandomFeasible`]: uniform among feasible customers
//! - [`FixedRoutes`]: replay of routes planned offline

mod fixed;
mod nearest;
mod random;
mod rollout;
mod route;

pub use fixed::FixedRoutes;
pub use nearest::NearestFeasible;
pub use random::RandomFeasible;
pub use rollout::{rollout, rollout_with_limit, step_limit, Rollout};
pub use route::{Route, Visit};

use crate::distance::DistanceMatrix;
use crate::env::{EnvConfig, Environment, EpisodeContext, EpisodeState, VehicleState};
use crate::models::{Fleet, Instance};

/// Chooses the next node for the active vehicle of one batch element.
///
/// Implementations should pick a node the observation reports as
/// feasible; anything else makes the environment reject the whole step.
pub trait Policy {
    /// Returns the node to visit next.
    fn select(&mut self, obs: &Observation<'_>) -> usize;
}

/// Read-only view of one batch element: its instance and episode state.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    ctx: EpisodeContext<'a>,
    episode: &'a EpisodeState,
}

impl<'a> Observation<'a> {
    /// Observes batch element `b` of `env`.
    pub fn of(env: &'a Environment<'_>, b: usize) -> Self {
        Self {
            ctx: env.context(b),
            episode: env.episode(b),
        }
    }

    /// Position of the element in its batch.
    pub fn batch_index(&self) -> usize {
        self.ctx.batch_index
    }

    /// The instance being solved.
    pub fn instance(&self) -> &'a Instance {
        self.ctx.instance
    }

    /// Distances between the instance's nodes.
    pub fn distances(&self) -> &'a DistanceMatrix {
        self.ctx.distances
    }

    /// Fleet parameters.
    pub fn fleet(&self) -> &'a Fleet {
        self.ctx.fleet
    }

    /// Environment configuration.
    pub fn config(&self) -> &'a EnvConfig {
        self.ctx.config
    }

    /// Full episode state.
    pub fn episode(&self) -> &'a EpisodeState {
        self.episode
    }

    /// Vehicle whose turn it is, `None` once terminated.
    pub fn active_vehicle(&self) -> Option<usize> {
        self.episode.active_vehicle()
    }

    /// State of the active vehicle.
    pub fn vehicle(&self) -> Option<&'a VehicleState> {
        let episode = self.episode;
        episode.active_vehicle().map(|v| &episode.vehicles()[v])
    }

    /// Nodes the active vehicle may select (only the depot once
    /// terminated).
    pub fn feasible_nodes(&self) -> Vec<usize> {
        self.episode.feasible_nodes()
    }

    /// Whether `node` may be selected now.
    pub fn is_feasible(&self, node: usize) -> bool {
        match self.episode.active_mask() {
            Some(row) => row.get(node).copied().unwrap_or(false),
            None => node == 0,
        }
    }
}
