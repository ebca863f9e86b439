//! Node and time window types.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// A time window constraint for arrival at a node.
///
/// The vehicle must arrive no later than `due`. Arriving before `ready`
/// means waiting until `ready`.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::TimeWindow;
///
/// let tw = TimeWindow::new(100.0, 200.0).unwrap();
/// assert_eq!(tw.waiting_time(40.0), 60.0);
/// assert!(tw.is_violated(250.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    ready: f64,
    due: f64,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// Returns `None` if `ready > due` or either value is non-finite.
    pub fn new(ready: f64, due: f64) -> Option<Self> {
        if !ready.is_finite() || !due.is_finite() || ready > due {
            return None;
        }
        Some(Self { ready, due })
    }

    /// A window that only bounds the latest arrival.
    ///
    /// `due` may be negative (a deadline already missed at time zero), in
    /// which case the window is `[due, due]`. Returns `None` if `due` is
    /// non-finite.
    pub fn closing_at(due: f64) -> Option<Self> {
        Self::new(due.min(0.0), due)
    }

    /// Earliest allowable start of service.
    pub fn ready(&self) -> f64 {
        self.ready
    }

    /// Latest allowable arrival time.
    pub fn due(&self) -> f64 {
        self.due
    }

    /// Returns the waiting time if arriving at the given time.
    ///
    /// Zero if the vehicle arrives within or after the window.
    pub fn waiting_time(&self, arrival: f64) -> f64 {
        if arrival < self.ready {
            self.ready - arrival
        } else {
            0.0
        }
    }

    /// Returns `true` if arriving at the given time violates this window.
    pub fn is_violated(&self, arrival: f64) -> bool {
        arrival > self.due
    }

    pub(crate) fn scaled(&self, factor: f64) -> Self {
        Self {
            ready: self.ready / factor,
            due: self.due / factor,
        }
    }
}

#[derive(Deserialize)]
struct RawTimeWindow {
    ready: f64,
    due: f64,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = EnvError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        Self::new(raw.ready, raw.due).ok_or_else(|| {
            EnvError::invalid(format!("invalid time window [{}, {}]", raw.ready, raw.due))
        })
    }
}

/// A depot or customer location in a routing instance.
///
/// Node 0 of every instance is the depot: demand 0, never served. Customers
/// carry a demand, an optional time window and, for ambulance routing, a
/// survival deadline by which the patient must reach the depot.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::{Node, TimeWindow};
///
/// let depot = Node::depot(35.0, 35.0);
/// assert_eq!(depot.demand(), 0);
///
/// let c = Node::customer(41.0, 49.0, 1)
///     .with_time_window(TimeWindow::new(0.0, 120.0).unwrap())
///     .with_survival_deadline(150.0);
/// assert_eq!(c.demand(), 1);
/// assert_eq!(c.survival_deadline(), Some(150.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    x: f64,
    y: f64,
    demand: i32,
    #[serde(default)]
    time_window: Option<TimeWindow>,
    #[serde(default)]
    survival_deadline: Option<f64>,
}

impl Node {
    /// Creates a depot at the given coordinates (demand 0, no deadlines).
    pub fn depot(x: f64, y: f64) -> Self {
        Self::customer(x, y, 0)
    }

    /// Creates a customer with the given demand and no deadlines.
    pub fn customer(x: f64, y: f64, demand: i32) -> Self {
        Self {
            x,
            y,
            demand,
            time_window: None,
            survival_deadline: None,
        }
    }

    /// Zeroed node standing in for a masked-out customer slot.
    pub fn placeholder() -> Self {
        Self::customer(0.0, 0.0, 0)
    }

    /// Sets a time window for this node.
    pub fn with_time_window(mut self, tw: TimeWindow) -> Self {
        self.time_window = Some(tw);
        self
    }

    /// Sets a survival deadline for this node.
    pub fn with_survival_deadline(mut self, deadline: f64) -> Self {
        self.survival_deadline = Some(deadline);
        self
    }

    /// X-coordinate.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Y-coordinate.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Demand at this node (units picked up).
    pub fn demand(&self) -> i32 {
        self.demand
    }

    /// Time window constraint, if any.
    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.time_window.as_ref()
    }

    /// Survival deadline, if any.
    pub fn survival_deadline(&self) -> Option<f64> {
        self.survival_deadline
    }

    /// Returns `true` if arriving at `arrival` misses the window's due
    /// date or the survival deadline.
    pub fn is_late(&self, arrival: f64) -> bool {
        self.time_window.is_some_and(|tw| tw.is_violated(arrival))
            || self.survival_deadline.is_some_and(|s| arrival > s)
    }

    /// Time service starts when arriving at `arrival`, after waiting for
    /// the window to open.
    pub fn service_start(&self, arrival: f64) -> f64 {
        arrival + self.time_window.map_or(0.0, |tw| tw.waiting_time(arrival))
    }

    /// Euclidean distance to another node.
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub(crate) fn rescaled(&self, offset: [f64; 2], loc_scale: f64, time_scale: f64) -> Self {
        Self {
            x: (self.x - offset[0]) / loc_scale,
            y: (self.y - offset[1]) / loc_scale,
            demand: self.demand,
            time_window: self.time_window.map(|tw| tw.scaled(time_scale)),
            survival_deadline: self.survival_deadline.map(|s| s / time_scale),
        }
    }
}
