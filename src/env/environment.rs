//! Batched environment driving one episode per instance in lockstep.

use tracing::{debug, warn};

use super::{EnvConfig, EpisodeContext, EpisodeState, Snapshot, StepReport};
use crate::distance::DistanceMatrix;
use crate::error::EnvError;
use crate::models::InstanceBatch;

/// Result of one batched step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// One report per batch element.
    pub reports: Vec<StepReport>,
    /// Whether every episode of the batch is terminated.
    pub done: bool,
}

impl StepOutcome {
    /// Step reward per batch element.
    pub fn rewards(&self) -> Vec<f64> {
        self.reports.iter().map(|r| r.reward).collect()
    }

    /// Terminated flag per batch element.
    pub fn terminated(&self) -> Vec<bool> {
        self.reports.iter().map(|r| r.terminated).collect()
    }
}

/// Simulation environment over a batch of instances.
///
/// Every call to [`step`](Self::step) takes one node per batch element,
/// moves that element's active vehicle, recomputes masks and reports the
/// rewards. Elements evolve independently but advance together; an element
/// that terminated early keeps accepting the depot as a no-op.
///
/// Selecting a masked node is rejected: the whole step fails with
/// [`EnvError::InvalidAction`] and no element is modified.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{EnvConfig, Environment};
/// use u_routing_env::models::{Fleet, Instance, InstanceBatch, Node, ProblemVariant};
///
/// let instance = Instance::new(vec![
///     Node::depot(0.0, 0.0),
///     Node::customer(3.0, 4.0, 1),
/// ]).unwrap();
/// let fleet = Fleet::new(1, 2, 1.0).unwrap();
/// let batch = InstanceBatch::new(ProblemVariant::Cvrp, fleet, vec![instance]).unwrap();
///
/// let mut env = Environment::new(&batch, EnvConfig::default()).unwrap();
/// assert_eq!(env.action_mask(0), vec![true, true]);
///
/// let out = env.step(&[1]).unwrap();
/// assert_eq!(out.rewards(), vec![-5.0]);
/// let out = env.step(&[0]).unwrap();
/// assert!(out.done);
/// assert_eq!(env.returns(), vec![-10.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Environment<'a> {
    batch: &'a InstanceBatch,
    distances: Vec<DistanceMatrix>,
    config: EnvConfig,
    episodes: Vec<EpisodeState>,
}

impl<'a> Environment<'a> {
    /// Creates an environment and resets every episode.
    pub fn new(batch: &'a InstanceBatch, config: EnvConfig) -> Result<Self, EnvError> {
        config.validate()?;
        if batch.is_empty() {
            return Err(EnvError::invalid("cannot simulate an empty batch"));
        }
        let distances = batch.instances().iter().map(|i| i.distances()).collect();
        let mut env = Self {
            batch,
            distances,
            config,
            episodes: Vec::new(),
        };
        env.reset();
        Ok(env)
    }

    /// Starts a fresh episode for every instance.
    pub fn reset(&mut self) {
        self.episodes = (0..self.batch.len())
            .map(|b| EpisodeState::new(&self.context(b)))
            .collect();
        debug!(
            batch_size = self.batch.len(),
            vehicles = self.batch.fleet().vehicle_count(),
            nodes = self.batch.num_nodes(),
            "environment reset"
        );
    }

    /// Read-only transition context of batch element `b`.
    pub fn context(&self, b: usize) -> EpisodeContext<'_> {
        EpisodeContext {
            batch_index: b,
            instance: self.batch.instance(b),
            distances: &self.distances[b],
            fleet: self.batch.fleet(),
            config: &self.config,
        }
    }

    /// Applies one node selection per batch element.
    ///
    /// All selections are checked against the masks before any element is
    /// modified.
    pub fn step(&mut self, actions: &[usize]) -> Result<StepOutcome, EnvError> {
        if actions.len() != self.episodes.len() {
            return Err(EnvError::DimensionMismatch {
                what: "actions per step",
                expected: self.episodes.len(),
                actual: actions.len(),
            });
        }
        for (b, (episode, &node)) in self.episodes.iter().zip(actions).enumerate() {
            if let Err(err) = episode.check_action(b, node) {
                warn!(batch_index = b, node, "rejected masked action");
                return Err(err);
            }
        }

        let mut episodes = std::mem::take(&mut self.episodes);
        let result = episodes
            .iter_mut()
            .zip(actions)
            .enumerate()
            .map(|(b, (episode, &node))| episode.step(&self.context(b), node))
            .collect::<Result<Vec<_>, _>>();
        self.episodes = episodes;

        let reports = result?;
        Ok(StepOutcome {
            reports,
            done: self.is_done(),
        })
    }

    /// Returns `true` once every episode is terminated.
    pub fn is_done(&self) -> bool {
        self.episodes.iter().all(EpisodeState::is_terminated)
    }

    /// Number of batch elements.
    pub fn batch_size(&self) -> usize {
        self.episodes.len()
    }

    /// The simulated batch.
    pub fn batch(&self) -> &'a InstanceBatch {
        self.batch
    }

    /// Active configuration.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Episode state of batch element `b`.
    pub fn episode(&self, b: usize) -> &EpisodeState {
        &self.episodes[b]
    }

    /// All episode states.
    pub fn episodes(&self) -> &[EpisodeState] {
        &self.episodes
    }

    /// Active vehicle per batch element.
    pub fn active_vehicles(&self) -> Vec<Option<usize>> {
        self.episodes.iter().map(EpisodeState::active_vehicle).collect()
    }

    /// Nodes selectable by batch element `b`: the active vehicle's mask
    /// row, or only the depot once terminated.
    pub fn action_mask(&self, b: usize) -> Vec<bool> {
        let episode = &self.episodes[b];
        match episode.active_mask() {
            Some(row) => row.to_vec(),
            None => {
                let mut row = vec![false; self.batch.num_nodes()];
                row[0] = true;
                row
            }
        }
    }

    /// Accumulated return per batch element.
    pub fn returns(&self) -> Vec<f64> {
        self.episodes.iter().map(EpisodeState::total_reward).collect()
    }

    /// Captures the full mutable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.batch.fleet().vehicle_count(),
            self.batch.num_nodes(),
            self.config.clone(),
            self.episodes.clone(),
        )
    }

    /// Replaces the mutable state with a snapshot taken on the same batch
    /// layout.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), EnvError> {
        let expected_vehicles = self.batch.fleet().vehicle_count();
        let expected_nodes = self.batch.num_nodes();
        if snapshot.vehicle_count() != expected_vehicles {
            return Err(EnvError::DimensionMismatch {
                what: "snapshot vehicles",
                expected: expected_vehicles,
                actual: snapshot.vehicle_count(),
            });
        }
        if snapshot.node_count() != expected_nodes {
            return Err(EnvError::DimensionMismatch {
                what: "snapshot nodes",
                expected: expected_nodes,
                actual: snapshot.node_count(),
            });
        }
        if snapshot.episodes().len() != self.batch.len() {
            return Err(EnvError::DimensionMismatch {
                what: "snapshot episodes",
                expected: self.batch.len(),
                actual: snapshot.episodes().len(),
            });
        }
        for episode in snapshot.episodes() {
            let Some((vehicles, nodes)) = episode.dimensions() else {
                return Err(EnvError::DimensionMismatch {
                    what: "snapshot mask rows",
                    expected: expected_vehicles,
                    actual: episode.mask().vehicles(),
                });
            };
            if vehicles != expected_vehicles {
                return Err(EnvError::DimensionMismatch {
                    what: "snapshot vehicles",
                    expected: expected_vehicles,
                    actual: vehicles,
                });
            }
            if nodes != expected_nodes {
                return Err(EnvError::DimensionMismatch {
                    what: "snapshot nodes",
                    expected: expected_nodes,
                    actual: nodes,
                });
            }
        }
        snapshot.config().validate()?;

        let (config, mut episodes) = snapshot.into_parts();
        for (b, episode) in episodes.iter_mut().enumerate() {
            episode.revalidate(&self.context(b))?;
        }
        self.config = config;
        self.episodes = episodes;
        debug!(batch_size = self.episodes.len(), "environment restored");
        Ok(())
    }
}
