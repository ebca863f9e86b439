//! Route and visit records produced by a rollout.

use serde::{Deserialize, Serialize};

/// A single node visit within a recorded route.
///
/// Tracks the node along with the vehicle clock and onboard load after the
/// step that reached it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Node visited (0 for a depot return).
    pub node: usize,
    /// Vehicle clock after the visit, waiting included.
    pub time: f64,
    /// Onboard load after the visit (0 after a depot unload).
    pub load_after: i32,
}

/// The ordered visits one vehicle made during an episode.
///
/// Unlike a static plan, a recorded route keeps its depot returns, so a
/// vehicle that unloads and heads out again shows every trip.
///
/// # Examples
///
/// ```
/// use u_routing_env::policy::{Route, Visit};
///
/// let mut route = Route::new(0);
/// route.push_visit(Visit { node: 4, time: 10.0, load_after: 1 }, 10.0);
/// route.push_visit(Visit { node: 0, time: 20.0, load_after: 0 }, 10.0);
/// assert_eq!(route.len(), 2);
/// assert_eq!(route.customer_ids(), vec![4]);
/// assert_eq!(route.total_distance(), 20.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    vehicle_id: usize,
    visits: Vec<Visit>,
    total_distance: f64,
}

impl Route {
    /// Creates an empty route for the given vehicle.
    pub fn new(vehicle_id: usize) -> Self {
        Self {
            vehicle_id,
            visits: Vec::new(),
            total_distance: 0.0,
        }
    }

    /// Appends a visit reached after travelling `distance`.
    pub fn push_visit(&mut self, visit: Visit, distance: f64) {
        self.total_distance += distance;
        self.visits.push(visit);
    }

    /// Returns the vehicle this route belongs to.
    pub fn vehicle_id(&self) -> usize {
        self.vehicle_id
    }

    /// Returns the ordered sequence of visits.
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Number of visits, depot returns included.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Returns `true` if the vehicle never moved.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Customer nodes in visit order.
    pub fn customer_ids(&self) -> Vec<usize> {
        self.visits
            .iter()
            .map(|v| v.node)
            .filter(|&n| n != 0)
            .collect()
    }

    /// Every visited node in order, depot returns included.
    pub fn nodes(&self) -> Vec<usize> {
        self.visits.iter().map(|v| v.node).collect()
    }

    /// Number of depot returns.
    pub fn trips(&self) -> usize {
        self.visits.iter().filter(|v| v.node == 0).count()
    }

    /// Distance travelled along this route.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Clock at the last visit, 0 for an empty route.
    pub fn end_time(&self) -> f64 {
        self.visits.last().map_or(0.0, |v| v.time)
    }
}
