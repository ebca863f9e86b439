//! Per-vehicle mutable state.

use serde::{Deserialize, Serialize};

/// A customer currently carried by a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Onboard {
    /// Node the entity was picked up at.
    pub node: usize,
    /// Units of capacity it occupies.
    pub demand: i32,
    /// Time by which it must reach the depot, if any.
    pub survival_deadline: Option<f64>,
}

/// Fixed-capacity onboard set: one slot per capacity unit plus an
/// occupancy count. Pickups take the first free slot.
///
/// # Examples
///
/// ```
/// use u_routing_env::env::{Onboard, OnboardSet};
///
/// let mut set = OnboardSet::with_slots(2);
/// set.board(Onboard { node: 3, demand: 1, survival_deadline: Some(80.0) }).unwrap();
/// set.board(Onboard { node: 5, demand: 1, survival_deadline: Some(60.0) }).unwrap();
/// assert_eq!(set.count(), 2);
/// assert_eq!(set.earliest_deadline(), Some(60.0));
/// assert!(set.board(Onboard { node: 7, demand: 1, survival_deadline: None }).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardSet {
    slots: Vec<Option<Onboard>>,
    count: usize,
}

impl OnboardSet {
    /// Creates an empty set with `n` slots.
    pub fn with_slots(n: usize) -> Self {
        Self {
            slots: vec![None; n],
            count: 0,
        }
    }

    /// Puts `entity` into the first free slot and returns its index.
    ///
    /// Hands the entity back if every slot is taken.
    pub fn board(&mut self, entity: Onboard) -> Result<usize, Onboard> {
        let Some(idx) = self.slots.iter().position(Option::is_none) else {
            return Err(entity);
        };
        self.slots[idx] = Some(entity);
        self.count += 1;
        Ok(idx)
    }

    /// Empties every slot, returning the entities that were aboard.
    pub fn unload(&mut self) -> Vec<Onboard> {
        self.count = 0;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// Occupied slots.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is aboard.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Entities aboard, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Onboard> {
        self.slots.iter().flatten()
    }

    /// Summed demand aboard.
    pub fn load(&self) -> i32 {
        self.iter().map(|o| o.demand).sum()
    }

    /// Earliest survival deadline among entities aboard.
    pub fn earliest_deadline(&self) -> Option<f64> {
        self.iter()
            .filter_map(|o| o.survival_deadline)
            .reduce(f64::min)
    }

    /// Raw slots, `None` marking a free one.
    pub fn slots(&self) -> &[Option<Onboard>] {
        &self.slots
    }

    fn is_consistent(&self) -> bool {
        self.count == self.iter().count() && self.iter().all(|o| o.demand >= 1)
    }
}

/// Position, load and clock of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    node: usize,
    remaining_capacity: i32,
    clock: f64,
    onboard: OnboardSet,
    done: bool,
}

impl VehicleState {
    /// A vehicle parked at the depot at time zero with full capacity.
    pub fn at_depot(capacity: i32) -> Self {
        Self {
            node: 0,
            remaining_capacity: capacity,
            clock: 0.0,
            onboard: OnboardSet::with_slots(capacity.max(0) as usize),
            done: false,
        }
    }

    /// Node the vehicle currently stands at.
    pub fn node(&self) -> usize {
        self.node
    }

    /// Unused capacity.
    pub fn remaining_capacity(&self) -> i32 {
        self.remaining_capacity
    }

    /// Time at which the vehicle becomes free.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Entities aboard.
    pub fn onboard(&self) -> &OnboardSet {
        &self.onboard
    }

    /// Returns `true` once the vehicle has left the episode.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn move_to(&mut self, node: usize, clock: f64) {
        self.node = node;
        self.clock = clock;
    }

    pub(crate) fn pick_up(&mut self, entity: Onboard) -> Result<usize, Onboard> {
        let slot = self.onboard.board(entity)?;
        self.remaining_capacity -= entity.demand;
        Ok(slot)
    }

    pub(crate) fn unload(&mut self, capacity: i32) -> Vec<Onboard> {
        self.remaining_capacity = capacity;
        self.onboard.unload()
    }

    pub(crate) fn finish(&mut self) {
        self.done = true;
    }

    /// Whether a loaded state obeys the fleet's capacity and node range:
    /// one slot per capacity unit, and remaining capacity plus onboard load
    /// equal to the capacity.
    pub(crate) fn is_consistent(&self, capacity: i32, nodes: usize) -> bool {
        self.node < nodes
            && self.onboard.is_consistent()
            && self.onboard.capacity() == capacity.max(0) as usize
            && self.remaining_capacity >= 0
            && self.remaining_capacity + self.onboard.load() == capacity
    }
}
