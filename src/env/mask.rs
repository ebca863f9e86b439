//! Vehicle × node feasibility mask.

use serde::{Deserialize, Serialize};

/// Row-major `[vehicles × nodes]` boolean mask; `true` means the node may
/// be selected next by that vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityMask {
    data: Vec<bool>,
    nodes: usize,
}

impl FeasibilityMask {
    /// An all-infeasible mask.
    pub fn new(vehicles: usize, nodes: usize) -> Self {
        Self {
            data: vec![false; vehicles * nodes],
            nodes,
        }
    }

    /// Number of vehicle rows.
    pub fn vehicles(&self) -> usize {
        if self.nodes == 0 {
            0
        } else {
            self.data.len() / self.nodes
        }
    }

    /// Number of node columns.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Whether `vehicle` may visit `node` next.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, vehicle: usize, node: usize) -> bool {
        self.data[vehicle * self.nodes + node]
    }

    /// The mask row of one vehicle.
    pub fn row(&self, vehicle: usize) -> &[bool] {
        &self.data[vehicle * self.nodes..(vehicle + 1) * self.nodes]
    }

    pub(crate) fn row_mut(&mut self, vehicle: usize) -> &mut [bool] {
        &mut self.data[vehicle * self.nodes..(vehicle + 1) * self.nodes]
    }

    /// Flat row-major data.
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }
}
