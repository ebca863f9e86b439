//! Fleet parameters shared by every instance of a batch.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// A homogeneous fleet: vehicle count, per-vehicle capacity and speed.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::Fleet;
///
/// let fleet = Fleet::new(4, 2, 1.0).unwrap();
/// assert_eq!(fleet.vehicle_count(), 4);
/// assert_eq!(fleet.capacity(), 2);
/// assert!(Fleet::new(0, 2, 1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFleet")]
pub struct Fleet {
    vehicle_count: usize,
    capacity: i32,
    speed: f64,
}

#[derive(Deserialize)]
struct RawFleet {
    vehicle_count: usize,
    capacity: i32,
    speed: f64,
}

impl TryFrom<RawFleet> for Fleet {
    type Error = EnvError;

    fn try_from(raw: RawFleet) -> Result<Self, Self::Error> {
        Self::new(raw.vehicle_count, raw.capacity, raw.speed)
    }
}

impl Fleet {
    /// Creates a fleet, rejecting empty fleets, capacity below 1 and
    /// non-positive speed.
    pub fn new(vehicle_count: usize, capacity: i32, speed: f64) -> Result<Self, EnvError> {
        if vehicle_count < 1 {
            return Err(EnvError::invalid("vehicle_count must be at least 1"));
        }
        if capacity < 1 {
            return Err(EnvError::invalid(format!(
                "capacity must be at least 1, got {capacity}"
            )));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(EnvError::invalid(format!(
                "speed must be positive and finite, got {speed}"
            )));
        }
        Ok(Self {
            vehicle_count,
            capacity,
            speed,
        })
    }

    /// Number of vehicles.
    pub fn vehicle_count(&self) -> usize {
        self.vehicle_count
    }

    /// Maximum load of each vehicle.
    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// Distance units travelled per time unit.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Travel time for a distance at fleet speed.
    pub fn travel_time(&self, distance: f64) -> f64 {
        distance / self.speed
    }

    pub(crate) fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}
