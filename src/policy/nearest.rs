//! Greedy nearest-feasible policy.
//!
//! The online counterpart of the nearest-neighbor construction heuristic:
//! every decision visits the closest customer the mask still allows, and
//! heads back to the depot when none is left.

use super::{Observation, Policy};

/// Selects the nearest feasible customer, or the depot when none is
/// feasible. Ties go to the lower node index.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{EnvConfig, Environment};
/// use u_routing_env::models::{Fleet, Instance, InstanceBatch, Node, ProblemVariant};
/// use u_routing_env::policy::{rollout, NearestFeasible};
///
/// let instance = Instance::new(vec![
///     Node::depot(0.0, 0.0),
///     Node::customer(10.0, 0.0, 1),
///     Node::customer(1.0, 0.0, 1),
/// ]).unwrap();
/// let fleet = Fleet::new(1, 5, 1.0).unwrap();
/// let batch = InstanceBatch::new(ProblemVariant::Cvrp, fleet, vec![instance]).unwrap();
/// let mut env = Environment::new(&batch, EnvConfig::default()).unwrap();
///
/// let result = rollout(&mut env, &mut NearestFeasible).unwrap();
/// assert_eq!(result.routes()[0][0].nodes(), vec![2, 1, 0]);
/// assert_eq!(result.returns(), &[-20.0]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFeasible;

impl Policy for NearestFeasible {
    fn select(&mut self, obs: &Observation<'_>) -> usize {
        let Some(vehicle) = obs.vehicle() else {
            return 0;
        };
        let customers = obs.feasible_nodes().into_iter().filter(|&j| j != 0);
        obs.distances()
            .nearest_neighbor(vehicle.node(), customers)
            .unwrap_or(0)
    }
}
