//! Travel distances between nodes.
//!
//! Provides a dense Euclidean distance matrix, computed once per instance
//! and reused by every transition of an episode.

mod matrix;

pub use matrix::DistanceMatrix;
