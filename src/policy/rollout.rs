//! Driving an environment to termination with a policy.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Observation, Policy, Route, Visit};
use crate::env::Environment;
use crate::error::EnvError;
use crate::models::InstanceBatch;

/// Returns and recorded routes of one rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    returns: Vec<f64>,
    routes: Vec<Vec<Route>>,
    steps: usize,
}

impl Rollout {
    /// Accumulated reward per batch element.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Mean return over the batch.
    pub fn mean_return(&self) -> f64 {
        self.returns.iter().sum::<f64>() / self.returns.len() as f64
    }

    /// Routes per batch element, one per vehicle.
    pub fn routes(&self) -> &[Vec<Route>] {
        &self.routes
    }

    /// Batched steps taken until every episode terminated.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Default step bound: every customer picked and unloaded once, plus one
/// final depot selection per vehicle.
pub fn step_limit(batch: &InstanceBatch) -> usize {
    2 * batch.num_nodes().saturating_sub(1) + batch.fleet().vehicle_count() + 1
}

/// Resets `env` and drives it to termination with `policy`.
///
/// Fails with [`EnvError::StepLimitExceeded`] if the batch has not
/// terminated within [`step_limit`] steps, and with
/// [`EnvError::InvalidAction`] if the policy selects a masked node.
pub fn rollout<P: Policy + ?Sized>(
    env: &mut Environment<'_>,
    policy: &mut P,
) -> Result<Rollout, EnvError> {
    let limit = step_limit(env.batch());
    rollout_with_limit(env, policy, limit)
}

/// [`rollout`] with an explicit step bound.
pub fn rollout_with_limit<P: Policy + ?Sized>(
    env: &mut Environment<'_>,
    policy: &mut P,
    limit: usize,
) -> Result<Rollout, EnvError> {
    env.reset();
    let vehicles = env.batch().fleet().vehicle_count();
    let mut routes: Vec<Vec<Route>> = (0..env.batch_size())
        .map(|_| (0..vehicles).map(Route::new).collect())
        .collect();

    let mut steps = 0;
    while !env.is_done() {
        if steps >= limit {
            warn!(limit, "rollout hit its step limit");
            return Err(EnvError::StepLimitExceeded { limit });
        }
        let actions: Vec<usize> = (0..env.batch_size())
            .map(|b| policy.select(&Observation::of(env, b)))
            .collect();
        let outcome = env.step(&actions)?;

        for (b, (report, &node)) in outcome.reports.iter().zip(&actions).enumerate() {
            let Some(v) = report.vehicle else {
                continue;
            };
            let vehicle = &env.episode(b).vehicles()[v];
            routes[b][v].push_visit(
                Visit {
                    node,
                    time: vehicle.clock(),
                    load_after: vehicle.onboard().load(),
                },
                report.distance,
            );
        }
        steps += 1;
    }

    let returns = env.returns();
    debug!(
        steps,
        mean_return = returns.iter().sum::<f64>() / returns.len() as f64,
        "rollout finished"
    );
    Ok(Rollout {
        returns,
        routes,
        steps,
    })
}
