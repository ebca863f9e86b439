//! Dense distance matrix.

use std::cmp::Ordering;

use crate::models::Node;

/// A dense n×n Euclidean distance matrix stored in row-major order.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::Node;
/// use u_routing_env::distance::DistanceMatrix;
///
/// let nodes = vec![
///     Node::depot(0.0, 0.0),
///     Node::customer(3.0, 4.0, 10),
///     Node::customer(6.0, 8.0, 20),
/// ];
/// let dm = DistanceMatrix::from_nodes(&nodes);
/// assert!((dm.get(0, 1) - 5.0).abs() < 1e-10);
/// assert_eq!(dm.get(1, 2), dm.get(2, 1));
/// assert_eq!(dm.nearest_neighbor(0, [2, 1]), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    data: Vec<f64>,
    size: usize,
}

impl DistanceMatrix {
    /// Computes the matrix from node coordinates.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let size = nodes.len();
        let data = nodes
            .iter()
            .flat_map(|a| nodes.iter().map(move |b| a.distance_to(b)))
            .collect();
        Self { data, size }
    }

    /// Returns the distance from location `from` to location `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    /// Returns the nearest of the given candidates to `from`.
    ///
    /// Ties go to the earlier candidate. Returns `None` if `candidates` is
    /// empty.
    pub fn nearest_neighbor(
        &self,
        from: usize,
        candidates: impl IntoIterator<Item = usize>,
    ) -> Option<usize> {
        candidates.into_iter().min_by(|&a, &b| {
            self.get(from, a)
                .partial_cmp(&self.get(from, b))
                .unwrap_or(Ordering::Equal)
        })
    }
}
