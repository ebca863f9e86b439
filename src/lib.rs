//! # u-routing-env
//!
//! Dynamic vehicle routing simulation for sequential decision policies:
//! capacitated VRP, VRP with time windows and ambulance routing with
//! patient survival deadlines.
//!
//! ## Modules
//!
//! - [`models`]: Instance model (Node, Fleet, Instance, InstanceBatch, generator)
//! - [`distance`]: Distance matrix
//! - [`env`]: Transition engine (Environment, EpisodeState, feasibility masks, rewards, snapshots)
//! - [`policy`]: Reference policies and rollouts
//! - [`error`]: Error type
//!
//! ## Example
//!
//! ```
//! use rand::SeedableRng;
//! use u_routing_env::env::{EnvConfig, Environment};
//! use u_routing_env::models::{generate, GeneratorConfig};
//! use u_routing_env::policy::{rollout, NearestFeasible};
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let mut batch = generate(&GeneratorConfig::vrptw(16, 20, 4), &mut rng).unwrap();
//! batch.normalize();
//!
//! let mut env = Environment::new(&batch, EnvConfig::default()).unwrap();
//! let result = rollout(&mut env, &mut NearestFeasible).unwrap();
//! assert_eq!(result.returns().len(), 16);
//! assert!(env.is_done());
//! ```

pub mod distance;
pub mod env;
pub mod error;
pub mod models;
pub mod policy;

pub use error::EnvError;
