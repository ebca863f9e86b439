//! Random instance generation.
//!
//! Depot and customers are drawn uniformly from one square coordinate
//! range. The deadline parameters pick the problem variant:
//!
//! - [`DeadlineParams::None`]: CVRP, uniform integer demands.
//! - [`DeadlineParams::TimeWindows`]: VRPTW, a share of customers gets a
//!   random window placed so it can be reached from and left back to the
//!   depot within the horizon.
//! - [`DeadlineParams::Survival`]: ambulance routing, unit demands and a
//!   survival deadline; the latest pickup is the survival deadline minus
//!   the travel time back to the depot.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Fleet, Instance, InstanceBatch, Node, ProblemVariant, TimeWindow};
use crate::error::EnvError;

/// Deadline generation parameters, one variant per problem family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadlineParams {
    /// No deadlines (CVRP).
    None,
    /// Hard time windows (VRPTW).
    TimeWindows {
        /// Depot closing time.
        horizon: f64,
        /// Window width range `[lo, hi)`.
        width_range: (f64, f64),
        /// Share of customers with a restricted window.
        ratio: f64,
    },
    /// Survival deadlines (ambulance routing).
    Survival {
        /// Survival deadline range `[lo, hi)`.
        range: (f64, f64),
    },
}

impl DeadlineParams {
    /// Problem family implied by these parameters.
    pub fn variant(&self) -> ProblemVariant {
        match self {
            Self::None => ProblemVariant::Cvrp,
            Self::TimeWindows { .. } => ProblemVariant::Vrptw,
            Self::Survival { .. } => ProblemVariant::Ambulance,
        }
    }
}

/// Instance generation parameters.
///
/// [`GeneratorConfig::from_json_str`] reads either the native keys or an
/// experiment file, whose keys map as follows:
///
/// - `patient_count`, `ambulance_count`, `ambulance_capacity`: aliases of
///   `customer_count`, `vehicle_count` and `capacity`.
/// - `problem_type`: `"cvrp"`, `"vrptw"` or `"arp"` (ambulance routing)
///   picks the family defaults; it cannot be combined with `deadlines`.
/// - `survival_time_range`: survival deadline range of ambulance routing.
/// - `rng_seed` and the environment and training keys are accepted and
///   left to their own consumers (see `EnvConfig::from_json_str`).
///
/// Any other key is rejected.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::{GeneratorConfig, ProblemVariant};
///
/// let cfg = GeneratorConfig::from_json_str(r#"{
///     "rng_seed": 412873019,
///     "problem_type": "arp",
///     "patient_count": 10,
///     "ambulance_count": 2,
///     "ambulance_capacity": 2,
///     "survival_time_range": [30, 240],
///     "speed": 1.0,
///     "gamma": 1.0
/// }"#).unwrap();
/// assert_eq!(cfg.customer_count, 10);
/// assert_eq!(cfg.vehicle_count, 2);
/// assert_eq!(cfg.deadlines.variant(), ProblemVariant::Ambulance);
///
/// assert!(GeneratorConfig::from_json_str(r#"{"patient_cnt": 10}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeneratorConfig")]
pub struct GeneratorConfig {
    /// Number of instances in the batch.
    pub count: usize,
    /// Customer slots per instance.
    pub customer_count: usize,
    /// Vehicles per instance.
    pub vehicle_count: usize,
    /// Capacity of each vehicle.
    pub capacity: i32,
    /// Coordinate range `[lo, hi)` for both axes.
    pub location_range: (f64, f64),
    /// Demand range `[lo, hi)`; ignored for ambulance routing.
    pub demand_range: (i32, i32),
    /// Deadline parameters.
    pub deadlines: DeadlineParams,
    /// Vehicle speed.
    pub speed: f64,
    /// If set, each instance keeps a random number of customers in
    /// `[min_customer_count, customer_count]`.
    pub min_customer_count: Option<usize>,
}

/// Experiment file keys consumed outside the generator.
const FOREIGN_KEYS: &[&str] = &[
    "rng_seed",
    "gamma",
    "sigma",
    "min_time_gap",
    "pending_cost",
    "vacancy_coefficient",
    "done_criterion",
    "epoch_count",
    "iter_count",
    "baseline_type",
    "plot_period",
    "plot_select",
];

#[derive(Deserialize)]
struct RawGeneratorConfig {
    count: Option<usize>,
    #[serde(alias = "patient_count")]
    customer_count: Option<usize>,
    #[serde(alias = "ambulance_count")]
    vehicle_count: Option<usize>,
    #[serde(alias = "ambulance_capacity")]
    capacity: Option<i32>,
    location_range: Option<(f64, f64)>,
    demand_range: Option<(i32, i32)>,
    deadlines: Option<DeadlineParams>,
    speed: Option<f64>,
    min_customer_count: Option<usize>,
    problem_type: Option<String>,
    survival_time_range: Option<(f64, f64)>,
    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawGeneratorConfig> for GeneratorConfig {
    type Error = EnvError;

    fn try_from(raw: RawGeneratorConfig) -> Result<Self, Self::Error> {
        if let Some(key) = raw.other.keys().find(|k| !FOREIGN_KEYS.contains(&k.as_str())) {
            return Err(EnvError::invalid(format!("unknown generator key `{key}`")));
        }
        let mut cfg = match raw.problem_type.as_deref() {
            None => Self::default(),
            Some(_) if raw.deadlines.is_some() => {
                return Err(EnvError::invalid(
                    "`problem_type` and `deadlines` are mutually exclusive",
                ))
            }
            Some("cvrp") => Self::default(),
            Some("vrptw") => Self::vrptw(1, 100, 25),
            Some("arp") => Self::ambulance(1, 100, 25),
            Some(other @ ("svrptw" | "sdvrptw")) => {
                return Err(EnvError::invalid(format!(
                    "stochastic problem type `{other}` is not supported"
                )))
            }
            Some(other) => {
                return Err(EnvError::invalid(format!("unknown problem type `{other}`")))
            }
        };
        if let Some(deadlines) = raw.deadlines {
            cfg.deadlines = deadlines;
        }
        if let Some(range) = raw.survival_time_range {
            match &mut cfg.deadlines {
                DeadlineParams::Survival { range: r } => *r = range,
                _ => {
                    return Err(EnvError::invalid(
                        "`survival_time_range` only applies to ambulance routing",
                    ))
                }
            }
        }
        cfg.count = raw.count.unwrap_or(cfg.count);
        cfg.customer_count = raw.customer_count.unwrap_or(cfg.customer_count);
        cfg.vehicle_count = raw.vehicle_count.unwrap_or(cfg.vehicle_count);
        cfg.capacity = raw.capacity.unwrap_or(cfg.capacity);
        cfg.location_range = raw.location_range.unwrap_or(cfg.location_range);
        cfg.demand_range = raw.demand_range.unwrap_or(cfg.demand_range);
        cfg.speed = raw.speed.unwrap_or(cfg.speed);
        cfg.min_customer_count = raw.min_customer_count.or(cfg.min_customer_count);
        Ok(cfg)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 1,
            customer_count: 100,
            vehicle_count: 25,
            capacity: 200,
            location_range: (0.0, 101.0),
            demand_range: (5, 41),
            deadlines: DeadlineParams::None,
            speed: 1.0,
            min_customer_count: None,
        }
    }
}

impl GeneratorConfig {
    /// CVRP defaults.
    pub fn cvrp(count: usize, customer_count: usize, vehicle_count: usize) -> Self {
        Self {
            count,
            customer_count,
            vehicle_count,
            ..Self::default()
        }
    }

    /// VRPTW defaults: horizon 480, windows of width `[30, 91)` for half of
    /// the customers.
    pub fn vrptw(count: usize, customer_count: usize, vehicle_count: usize) -> Self {
        Self {
            deadlines: DeadlineParams::TimeWindows {
                horizon: 480.0,
                width_range: (30.0, 91.0),
                ratio: 0.5,
            },
            ..Self::cvrp(count, customer_count, vehicle_count)
        }
    }

    /// Ambulance defaults: capacity 2, survival deadlines in `[30, 240)`.
    pub fn ambulance(count: usize, customer_count: usize, vehicle_count: usize) -> Self {
        Self {
            capacity: 2,
            deadlines: DeadlineParams::Survival {
                range: (30.0, 240.0),
            },
            ..Self::cvrp(count, customer_count, vehicle_count)
        }
    }

    /// Parses a configuration from JSON; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        let raw: RawGeneratorConfig = serde_json::from_str(json)?;
        let cfg = Self::try_from(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every parameter range.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.count < 1 {
            return Err(EnvError::invalid("count must be at least 1"));
        }
        if self.customer_count < 1 {
            return Err(EnvError::invalid("customer_count must be at least 1"));
        }
        Fleet::new(self.vehicle_count, self.capacity, self.speed)?;
        check_range("location_range", self.location_range)?;
        if self.deadlines.variant() != ProblemVariant::Ambulance {
            let (lo, hi) = self.demand_range;
            if lo >= hi {
                return Err(EnvError::invalid(format!(
                    "demand_range lower bound {lo} must be below upper bound {hi}"
                )));
            }
            if lo < 1 {
                return Err(EnvError::invalid("demand_range must start at 1 or more"));
            }
        }
        match self.deadlines {
            DeadlineParams::None => {}
            DeadlineParams::TimeWindows {
                horizon,
                width_range,
                ratio,
            } => {
                if !horizon.is_finite() || horizon <= 0.0 {
                    return Err(EnvError::invalid(format!(
                        "horizon must be positive, got {horizon}"
                    )));
                }
                check_range("width_range", width_range)?;
                if !(0.0..=1.0).contains(&ratio) {
                    return Err(EnvError::invalid(format!(
                        "window ratio must be within [0, 1], got {ratio}"
                    )));
                }
            }
            DeadlineParams::Survival { range } => check_range("survival range", range)?,
        }
        if let Some(min) = self.min_customer_count {
            if min > self.customer_count {
                return Err(EnvError::invalid(format!(
                    "min_customer_count {min} exceeds customer_count {}",
                    self.customer_count
                )));
            }
        }
        Ok(())
    }
}

fn check_range(name: &str, (lo, hi): (f64, f64)) -> Result<(), EnvError> {
    if !lo.is_finite() || !hi.is_finite() || lo >= hi {
        return Err(EnvError::invalid(format!(
            "{name} lower bound {lo} must be below upper bound {hi}"
        )));
    }
    Ok(())
}

/// Generates a batch of random instances.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use u_routing_env::models::{generate, GeneratorConfig, ProblemVariant};
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let batch = generate(&GeneratorConfig::ambulance(8, 10, 2), &mut rng).unwrap();
/// assert_eq!(batch.len(), 8);
/// assert_eq!(batch.num_nodes(), 11);
/// assert_eq!(batch.variant(), ProblemVariant::Ambulance);
/// ```
pub fn generate<R: Rng>(config: &GeneratorConfig, rng: &mut R) -> Result<InstanceBatch, EnvError> {
    config.validate()?;
    let fleet = Fleet::new(config.vehicle_count, config.capacity, config.speed)?;

    let mut instances = Vec::with_capacity(config.count);
    for _ in 0..config.count {
        instances.push(generate_instance(config, &fleet, rng)?);
    }

    let mut batch = InstanceBatch::new(config.deadlines.variant(), fleet, instances)?;
    if let Some(min) = config.min_customer_count {
        batch.apply_validity_mask(min, rng)?;
    }

    debug!(
        count = config.count,
        customers = config.customer_count,
        variant = ?batch.variant(),
        "generated instance batch"
    );
    Ok(batch)
}

fn generate_instance<R: Rng>(
    config: &GeneratorConfig,
    fleet: &Fleet,
    rng: &mut R,
) -> Result<Instance, EnvError> {
    let (lo, hi) = config.location_range;
    let sample_loc = |rng: &mut R| (rng.random_range(lo..hi), rng.random_range(lo..hi));

    let (dx, dy) = sample_loc(rng);
    let mut depot = Node::depot(dx, dy);
    if let DeadlineParams::TimeWindows { horizon, .. } = config.deadlines {
        depot = depot.with_time_window(window(0.0, horizon)?);
    }

    let mut nodes = Vec::with_capacity(config.customer_count + 1);
    nodes.push(depot.clone());

    for _ in 0..config.customer_count {
        let (x, y) = sample_loc(rng);
        let node = match config.deadlines {
            DeadlineParams::None => {
                Node::customer(x, y, rng.random_range(config.demand_range.0..config.demand_range.1))
            }
            DeadlineParams::TimeWindows {
                horizon,
                width_range,
                ratio,
            } => {
                let node = Node::customer(
                    x,
                    y,
                    rng.random_range(config.demand_range.0..config.demand_range.1),
                );
                let travel = fleet.travel_time(depot.distance_to(&node));
                let tw = if rng.random_bool(ratio) {
                    let width = rng.random_range(width_range.0..width_range.1);
                    let earliest = travel;
                    let latest = horizon - travel - width;
                    let ready = if latest > earliest {
                        rng.random_range(earliest..latest)
                    } else {
                        earliest.min(horizon - width).max(0.0)
                    };
                    window(ready, ready + width)?
                } else {
                    window(0.0, horizon)?
                };
                node.with_time_window(tw)
            }
            DeadlineParams::Survival { range } => {
                let node = Node::customer(x, y, 1);
                let survival = rng.random_range(range.0..range.1);
                let latest_pickup = survival - fleet.travel_time(node.distance_to(&depot));
                let tw = TimeWindow::closing_at(latest_pickup)
                    .ok_or_else(|| EnvError::invalid("non-finite latest pickup time"))?;
                node.with_time_window(tw).with_survival_deadline(survival)
            }
        };
        nodes.push(node);
    }

    Instance::new(nodes)
}

fn window(ready: f64, due: f64) -> Result<TimeWindow, EnvError> {
    TimeWindow::new(ready, due)
        .ok_or_else(|| EnvError::invalid(format!("invalid time window [{ready}, {due}]")))
}
