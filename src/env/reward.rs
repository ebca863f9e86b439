//! Delivery and terminal reward terms.

use serde::{Deserialize, Serialize};

use super::{EnvConfig, Onboard};

/// Reward for unloading `entities` at the depot at time `arrival`.
///
/// For each entity with survival deadline `S`, let `T = arrival - S`.
/// A late entity (`T >= 0`) costs `1 + gamma * T^2`; an early one earns
/// `sigma / max(|T|, min_time_gap)`. Entities without a deadline add
/// nothing.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{delivery_reward, EnvConfig, Onboard};
///
/// let cfg = EnvConfig::default();
/// let late = Onboard { node: 1, demand: 1, survival_deadline: Some(80.0) };
/// assert_eq!(delivery_reward([&late], 90.0, &cfg), -(1.0 + 100.0));
/// ```
pub fn delivery_reward<'a>(
    entities: impl IntoIterator<Item = &'a Onboard>,
    arrival: f64,
    config: &EnvConfig,
) -> f64 {
    entities
        .into_iter()
        .filter_map(|o| o.survival_deadline)
        .map(|deadline| {
            let t = arrival - deadline;
            if t >= 0.0 {
                -(1.0 + config.gamma * t * t)
            } else {
                config.sigma / t.abs().max(config.min_time_gap)
            }
        })
        .sum()
}

/// Penalties charged once when an episode terminates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TerminalPenalty {
    /// Valid customers never served.
    pub unserved: usize,
    /// `pending_cost × unserved`.
    pub pending: f64,
    /// `vacancy_coefficient × unused capacity`, zero when all were served.
    pub vacancy: f64,
}

impl TerminalPenalty {
    /// Computes both terms from the final fleet state.
    pub fn compute(unserved: usize, vacant_capacity: i32, config: &EnvConfig) -> Self {
        let pending = config.pending_cost * unserved as f64;
        let vacancy = if unserved > 0 {
            config.vacancy_coefficient * f64::from(vacant_capacity)
        } else {
            0.0
        };
        Self {
            unserved,
            pending,
            vacancy,
        }
    }

    /// Sum of both terms (subtracted from the reward).
    pub fn total(&self) -> f64 {
        self.pending + self.vacancy
    }
}
