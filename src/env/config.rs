//! Reward coefficients and episode rules.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// When a vehicle leaves the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneCriterion {
    /// Selecting the depot ends the vehicle's shift (one trip per vehicle).
    #[default]
    DepotReturn,
    /// Selecting the depot while already parked there ends the shift, so
    /// vehicles may unload and head out again.
    IdleAtDepot,
}

/// Environment configuration.
///
/// Keys match the experiment files (`gamma`, `sigma`, `pending_cost`,
/// `vacancy_coefficient`); anything missing takes its default.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{DoneCriterion, EnvConfig};
///
/// let cfg = EnvConfig::from_json_str(r#"{"gamma": 2.0, "pending_cost": 500}"#).unwrap();
/// assert_eq!(cfg.gamma, 2.0);
/// assert_eq!(cfg.sigma, 1.0);
/// assert_eq!(cfg.pending_cost, 500.0);
/// assert_eq!(cfg.done_criterion, DoneCriterion::DepotReturn);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Late delivery coefficient: a patient `T` time units late costs
    /// `1 + gamma * T^2`.
    pub gamma: f64,
    /// Early delivery coefficient: `sigma / |T|` for a patient `T` units early.
    pub sigma: f64,
    /// Floor on `|T|` in the early delivery bonus.
    pub min_time_gap: f64,
    /// Terminal cost per unserved customer.
    pub pending_cost: f64,
    /// Terminal cost per unit of unused capacity, charged only when some
    /// customer is left unserved.
    pub vacancy_coefficient: f64,
    /// Rule ending a vehicle's participation.
    pub done_criterion: DoneCriterion,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            sigma: 1.0,
            min_time_gap: 1e-2,
            pending_cost: 1000.0,
            vacancy_coefficient: 100.0,
            done_criterion: DoneCriterion::DepotReturn,
        }
    }
}

impl EnvConfig {
    /// Sets the done criterion.
    pub fn with_done_criterion(mut self, criterion: DoneCriterion) -> Self {
        self.done_criterion = criterion;
        self
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects negative or non-finite coefficients and a non-positive
    /// time gap floor.
    pub fn validate(&self) -> Result<(), EnvError> {
        let coefficients = [
            ("gamma", self.gamma),
            ("sigma", self.sigma),
            ("pending_cost", self.pending_cost),
            ("vacancy_coefficient", self.vacancy_coefficient),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() || value < 0.0 {
                return Err(EnvError::invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.min_time_gap.is_finite() || self.min_time_gap <= 0.0 {
            return Err(EnvError::invalid(format!(
                "min_time_gap must be positive, got {}",
                self.min_time_gap
            )));
        }
        Ok(())
    }
}
