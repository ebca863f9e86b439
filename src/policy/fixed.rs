//! Replay of a-priori routes through the environment.

use super::{Observation, Policy, Rollout};

/// Replays given node sequences, one per batch element and vehicle.
///
/// Each vehicle follows its own sequence. Entries the mask rejects at
/// their turn (served by now, late, or over capacity) are skipped; a `0`
/// entry sends the vehicle back to the depot. Once its sequence is
/// exhausted the vehicle returns to the depot.
///
/// This evaluates routes planned offline, e.g. by an external solver,
/// under the environment's dynamics.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{EnvConfig, Environment};
/// use u_routing_env::models::{Fleet, Instance, InstanceBatch, Node, ProblemVariant};
/// use u_routing_env::policy::{rollout, FixedRoutes};
///
/// let instance = Instance::new(vec![
///     Node::depot(0.0, 0.0),
///     Node::customer(3.0, 4.0, 1),
///     Node::customer(0.0, 5.0, 1),
/// ]).unwrap();
/// let fleet = Fleet::new(2, 1, 1.0).unwrap();
/// let batch = InstanceBatch::new(ProblemVariant::Cvrp, fleet, vec![instance]).unwrap();
/// let mut env = Environment::new(&batch, EnvConfig::default()).unwrap();
///
/// let mut policy = FixedRoutes::new(vec![vec![vec![2], vec![1]]]);
/// let result = rollout(&mut env, &mut policy).unwrap();
/// assert_eq!(result.routes()[0][0].customer_ids(), vec![2]);
/// assert_eq!(result.routes()[0][1].customer_ids(), vec![1]);
/// assert_eq!(result.returns(), &[-20.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixedRoutes {
    routes: Vec<Vec<Vec<usize>>>,
    cursors: Vec<Vec<usize>>,
}

impl FixedRoutes {
    /// Creates the policy from `routes[batch element][vehicle]` node
    /// sequences. Missing elements or vehicles are treated as empty.
    pub fn new(routes: Vec<Vec<Vec<usize>>>) -> Self {
        let cursors = routes.iter().map(|r| vec![0; r.len()]).collect();
        Self { routes, cursors }
    }

    /// Replays the visits recorded by a rollout.
    pub fn from_rollout(rollout: &Rollout) -> Self {
        Self::new(
            rollout
                .routes()
                .iter()
                .map(|vehicles| vehicles.iter().map(|r| r.nodes()).collect())
                .collect(),
        )
    }

    /// Rewinds every vehicle to the start of its sequence.
    pub fn rewind(&mut self) {
        for cursor in self.cursors.iter_mut().flatten() {
            *cursor = 0;
        }
    }
}

impl Policy for FixedRoutes {
    fn select(&mut self, obs: &Observation<'_>) -> usize {
        let Some(v) = obs.active_vehicle() else {
            return 0;
        };
        let b = obs.batch_index();
        let Some(sequence) = self.routes.get(b).and_then(|r| r.get(v)) else {
            return 0;
        };
        let cursor = &mut self.cursors[b][v];
        while let Some(&node) = sequence.get(*cursor) {
            *cursor += 1;
            if obs.is_feasible(node) {
                return node;
            }
        }
        0
    }
}
