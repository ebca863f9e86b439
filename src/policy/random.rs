//! Uniformly random feasible policy.

use rand::Rng;

use super::{Observation, Policy};

/// Picks uniformly among the feasible customers.
///
/// Returns to the depot when no customer is feasible, or early with the
/// configured probability.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use u_routing_env::env::{EnvConfig, Environment};
/// use u_routing_env::models::{generate, GeneratorConfig};
/// use u_routing_env::policy::{rollout, RandomFeasible};
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let batch = generate(&GeneratorConfig::ambulance(4, 10, 2), &mut rng).unwrap();
/// let mut env = Environment::new(&batch, EnvConfig::default()).unwrap();
///
/// let mut policy = RandomFeasible::new(rand::rngs::StdRng::seed_from_u64(1));
/// let result = rollout(&mut env, &mut policy).unwrap();
/// assert_eq!(result.returns().len(), 4);
/// assert!(env.is_done());
/// ```
#[derive(Debug, Clone)]
pub struct RandomFeasible<R> {
    rng: R,
    return_probability: f64,
}

impl<R: Rng> RandomFeasible<R> {
    /// Creates a policy that only returns when nothing else is feasible.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            return_probability: 0.0,
        }
    }

    /// Sets the probability of heading back to the depot although some
    /// customer is still feasible. Clamped to `[0, 1]`; NaN means never.
    pub fn with_return_probability(mut self, p: f64) -> Self {
        self.return_probability = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        self
    }

    /// Early return probability.
    pub fn return_probability(&self) -> f64 {
        self.return_probability
    }
}

impl<R: Rng> Policy for RandomFeasible<R> {
    fn select(&mut self, obs: &Observation<'_>) -> usize {
        let customers: Vec<usize> = obs
            .feasible_nodes()
            .into_iter()
            .filter(|&j| j != 0)
            .collect();
        if customers.is_empty() || self.rng.random_bool(self.return_probability) {
            return 0;
        }
        customers[self.rng.random_range(0..customers.len())]
    }
}
