//! Instance model for dynamic vehicle routing.
//!
//! Provides nodes with demands, time windows and survival deadlines,
//! homogeneous fleets, instance batches with a shared node layout, and a
//! random generator for the CVRP, VRPTW and ambulance routing families.

mod fleet;
mod generator;
mod instance;
mod node;

pub use fleet::Fleet;
pub use generator::{generate, DeadlineParams, GeneratorConfig};
pub use instance::{Instance, InstanceBatch, Normalization, ProblemVariant};
pub use node::{Node, TimeWindow};
