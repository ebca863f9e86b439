//! Single-instance episode state and its transition function.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::reward::{delivery_reward, TerminalPenalty};
use super::{DoneCriterion, EnvConfig, FeasibilityMask, Onboard, VehicleState};
use crate::distance::DistanceMatrix;
use crate::error::EnvError;
use crate::models::{Fleet, Instance};

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// At least one vehicle still acts.
    Active,
    /// Every vehicle is done; only the depot no-op is accepted.
    Terminated,
}

/// Read-only data an episode transitions against.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeContext<'a> {
    /// Position of the instance in its batch (used in error reports).
    pub batch_index: usize,
    /// The instance being solved.
    pub instance: &'a Instance,
    /// Distances between the instance's nodes.
    pub distances: &'a DistanceMatrix,
    /// Fleet parameters.
    pub fleet: &'a Fleet,
    /// Reward coefficients and done rule.
    pub config: &'a EnvConfig,
}

impl EpisodeContext<'_> {
    fn travel_time(&self, from: usize, to: usize) -> f64 {
        self.fleet.travel_time(self.distances.get(from, to))
    }
}

/// Outcome of one transition of one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Vehicle that moved (`None` for a no-op on a terminated episode).
    pub vehicle: Option<usize>,
    /// Distance travelled.
    pub distance: f64,
    /// Reward of this step, terminal penalties included.
    pub reward: f64,
    /// Whether the episode is terminated after this step.
    pub terminated: bool,
    /// Terminal penalties, on the step that terminated the episode.
    pub terminal: Option<TerminalPenalty>,
}

/// Mutable state of one episode: vehicles, served flags, mask and the
/// active vehicle.
///
/// Transitions read the instance through an [`EpisodeContext`]; the state
/// itself holds no reference, so it serializes as a plain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    vehicles: Vec<VehicleState>,
    served: Vec<bool>,
    mask: FeasibilityMask,
    active: Option<usize>,
    phase: Phase,
    total_reward: f64,
    steps: usize,
    terminal: Option<TerminalPenalty>,
}

impl EpisodeState {
    /// Initial state: every vehicle at the depot at time zero.
    pub fn new(ctx: &EpisodeContext<'_>) -> Self {
        let vehicle_count = ctx.fleet.vehicle_count();
        let node_count = ctx.instance.num_nodes();
        let mut state = Self {
            vehicles: vec![VehicleState::at_depot(ctx.fleet.capacity()); vehicle_count],
            served: vec![false; node_count],
            mask: FeasibilityMask::new(vehicle_count, node_count),
            active: None,
            phase: Phase::Active,
            total_reward: 0.0,
            steps: 0,
            terminal: None,
        };
        state.select_active_vehicle();
        state.recompute_mask(ctx);
        state
    }

    /// Reinitializes every field, as at construction.
    pub fn reset(&mut self, ctx: &EpisodeContext<'_>) {
        *self = Self::new(ctx);
    }

    /// Picks the not-done vehicle with the smallest clock, lowest index on
    /// ties. `None` once every vehicle is done.
    pub fn select_active_vehicle(&mut self) -> Option<usize> {
        self.active = self
            .vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_done())
            .min_by(|(_, a), (_, b)| a.clock().total_cmp(&b.clock()))
            .map(|(i, _)| i);
        self.active
    }

    /// Recomputes every row of the feasibility mask from scratch.
    ///
    /// A customer is infeasible for a vehicle if it is invalid or served,
    /// the vehicle is done or lacks capacity, or the arrival misses the
    /// customer's window or survival deadline. It is also infeasible if,
    /// after waiting for its window to open, the trip back to the depot
    /// would miss the customer's own survival deadline or the earliest one
    /// aboard. The depot is always feasible.
    pub fn recompute_mask(&mut self, ctx: &EpisodeContext<'_>) {
        for (v, vehicle) in self.vehicles.iter().enumerate() {
            let earliest_onboard = vehicle.onboard().earliest_deadline();
            let row = self.mask.row_mut(v);
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = j == 0 || node_feasible(ctx, &self.served, vehicle, earliest_onboard, j);
            }
        }
    }

    /// Applies one decision for the active vehicle.
    ///
    /// Fails with `InvalidAction` (leaving the state untouched) if `node`
    /// is masked for the active vehicle. A terminated episode only accepts
    /// the depot, as a zero-reward no-op.
    pub fn step(&mut self, ctx: &EpisodeContext<'_>, node: usize) -> Result<StepReport, EnvError> {
        self.check_action(ctx.batch_index, node)?;
        let Some(v) = self.active else {
            return Ok(StepReport {
                vehicle: None,
                distance: 0.0,
                reward: 0.0,
                terminated: true,
                terminal: None,
            });
        };

        let from = self.vehicles[v].node();
        let target = ctx.instance.node(node);
        let distance = ctx.distances.get(from, node);
        let clock = target.service_start(self.vehicles[v].clock() + ctx.travel_time(from, node));

        let mut reward = -distance;
        let vehicle = &mut self.vehicles[v];
        if node == 0 {
            vehicle.move_to(node, clock);
            let unloaded = vehicle.unload(ctx.fleet.capacity());
            reward += delivery_reward(&unloaded, clock, ctx.config);
            let finishes = match ctx.config.done_criterion {
                DoneCriterion::DepotReturn => true,
                DoneCriterion::IdleAtDepot => from == 0,
            };
            if finishes {
                vehicle.finish();
            }
        } else {
            let entity = Onboard {
                node,
                demand: target.demand(),
                survival_deadline: target.survival_deadline(),
            };
            vehicle
                .pick_up(entity)
                .map_err(|_| EnvError::CapacityViolation {
                    batch_index: ctx.batch_index,
                    vehicle: v,
                    node,
                })?;
            vehicle.move_to(node, clock);
            self.served[node] = true;
        }

        self.steps += 1;
        self.select_active_vehicle();
        self.recompute_mask(ctx);

        let mut terminal = None;
        if self.vehicles.iter().all(VehicleState::is_done) {
            let penalty = TerminalPenalty::compute(
                self.unserved_count(ctx.instance),
                self.vehicles.iter().map(VehicleState::remaining_capacity).sum(),
                ctx.config,
            );
            reward -= penalty.total();
            self.phase = Phase::Terminated;
            self.terminal = Some(penalty);
            terminal = Some(penalty);
        }
        self.total_reward += reward;

        trace!(
            batch_index = ctx.batch_index,
            vehicle = v,
            from,
            to = node,
            clock,
            reward,
            "vehicle moved"
        );
        if terminal.is_some() {
            debug!(
                batch_index = ctx.batch_index,
                steps = self.steps,
                total_reward = self.total_reward,
                "episode terminated"
            );
        }

        Ok(StepReport {
            vehicle: Some(v),
            distance,
            reward,
            terminated: self.is_terminated(),
            terminal,
        })
    }

    /// Checks `node` against the active vehicle's mask without mutating.
    pub fn check_action(&self, batch_index: usize, node: usize) -> Result<(), EnvError> {
        let allowed = match self.active {
            Some(v) => node < self.mask.nodes() && self.mask.get(v, node),
            None => node == 0,
        };
        if allowed {
            Ok(())
        } else {
            Err(EnvError::InvalidAction {
                batch_index,
                vehicle: self.active,
                node,
            })
        }
    }

    fn unserved_count(&self, instance: &Instance) -> usize {
        (1..self.served.len())
            .filter(|&j| instance.is_valid(j) && !self.served[j])
            .count()
    }

    /// Vehicle states.
    pub fn vehicles(&self) -> &[VehicleState] {
        &self.vehicles
    }

    /// Per-node served flags (the depot is never served).
    pub fn served(&self) -> &[bool] {
        &self.served
    }

    /// Full `[vehicles × nodes]` mask.
    pub fn mask(&self) -> &FeasibilityMask {
        &self.mask
    }

    /// Vehicle whose turn it is, `None` once terminated.
    pub fn active_vehicle(&self) -> Option<usize> {
        self.active
    }

    /// Mask row of the active vehicle.
    pub fn active_mask(&self) -> Option<&[bool]> {
        self.active.map(|v| self.mask.row(v))
    }

    /// Nodes the active vehicle may select next (only the depot once
    /// terminated).
    pub fn feasible_nodes(&self) -> Vec<usize> {
        match self.active_mask() {
            Some(row) => row
                .iter()
                .enumerate()
                .filter(|(_, ok)| **ok)
                .map(|(j, _)| j)
                .collect(),
            None => vec![0],
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns `true` once every vehicle is done.
    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Sum of all step rewards so far.
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// Number of transitions applied since reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Terminal penalty breakdown, once terminated.
    pub fn terminal_penalty(&self) -> Option<&TerminalPenalty> {
        self.terminal.as_ref()
    }

    /// `(vehicles, nodes)`, or `None` if the mask disagrees with the
    /// vehicle and node counts.
    pub(crate) fn dimensions(&self) -> Option<(usize, usize)> {
        let dims = (self.vehicles.len(), self.served.len());
        (self.mask.vehicles() == dims.0 && self.mask.nodes() == dims.1).then_some(dims)
    }

    /// Checks a loaded state against its context, then rebuilds the active
    /// vehicle and the mask from the vehicle states.
    pub(crate) fn revalidate(&mut self, ctx: &EpisodeContext<'_>) -> Result<(), EnvError> {
        let nodes = ctx.instance.num_nodes();
        if self.served.first().copied().unwrap_or(true) {
            return Err(EnvError::invalid(format!(
                "batch element {}: depot marked served",
                ctx.batch_index
            )));
        }
        if let Some(v) = self
            .vehicles
            .iter()
            .position(|v| !v.is_consistent(ctx.fleet.capacity(), nodes))
        {
            return Err(EnvError::invalid(format!(
                "batch element {}: vehicle {v} state is inconsistent with capacity {}",
                ctx.batch_index,
                ctx.fleet.capacity()
            )));
        }
        if self.is_terminated() != self.vehicles.iter().all(VehicleState::is_done) {
            return Err(EnvError::invalid(format!(
                "batch element {}: phase disagrees with vehicle states",
                ctx.batch_index
            )));
        }
        self.select_active_vehicle();
        self.recompute_mask(ctx);
        Ok(())
    }
}

fn node_feasible(
    ctx: &EpisodeContext<'_>,
    served: &[bool],
    vehicle: &VehicleState,
    earliest_onboard: Option<f64>,
    j: usize,
) -> bool {
    if vehicle.is_done() || served[j] || !ctx.instance.is_valid(j) {
        return false;
    }
    let node = ctx.instance.node(j);
    if vehicle.remaining_capacity() < node.demand() {
        return false;
    }
    let arrival = vehicle.clock() + ctx.travel_time(vehicle.node(), j);
    if node.is_late(arrival) {
        return false;
    }
    let limit = match (earliest_onboard, node.survival_deadline()) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    match limit {
        Some(limit) => node.service_start(arrival) + ctx.travel_time(j, 0) <= limit,
        None => true,
    }
}
