//! Problem instances and instance batches.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Fleet, Node};
use crate::distance::DistanceMatrix;
use crate::error::EnvError;

/// Routing problem family of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemVariant {
    /// Capacitated VRP: demands only.
    Cvrp,
    /// VRP with hard time windows.
    Vrptw,
    /// Ambulance routing: unit demands, survival deadlines, latest pickups.
    Ambulance,
}

/// One routing problem: the depot at index 0 followed by customer slots.
///
/// Customer slots past the instance's actual size are placeholders flagged
/// invalid, so every instance of a batch shares one layout.
///
/// # Examples
///
/// ```
/// use u_routing_env::models::{Instance, Node};
///
/// let inst = Instance::new(vec![
///     Node::depot(0.0, 0.0),
///     Node::customer(3.0, 4.0, 1),
/// ]).unwrap();
/// assert_eq!(inst.num_nodes(), 2);
/// assert_eq!(inst.num_customers(), 1);
/// assert!(inst.is_valid(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInstance")]
pub struct Instance {
    nodes: Vec<Node>,
    valid: Vec<bool>,
}

/// Persisted form of an [`Instance`]; a missing `valid` means all valid.
#[derive(Deserialize)]
struct RawInstance {
    nodes: Vec<Node>,
    #[serde(default)]
    valid: Option<Vec<bool>>,
}

impl TryFrom<RawInstance> for Instance {
    type Error = EnvError;

    fn try_from(raw: RawInstance) -> Result<Self, Self::Error> {
        match raw.valid {
            Some(valid) => Self::with_validity(raw.nodes, valid),
            None => Self::new(raw.nodes),
        }
    }
}

impl Instance {
    /// Creates an instance where every node is valid.
    pub fn new(nodes: Vec<Node>) -> Result<Self, EnvError> {
        let valid = vec![true; nodes.len()];
        Self::with_validity(nodes, valid)
    }

    /// Creates an instance with an explicit validity mask.
    ///
    /// Node 0 must be a depot (zero demand) and valid; valid customers
    /// must have a positive demand.
    pub fn with_validity(nodes: Vec<Node>, valid: Vec<bool>) -> Result<Self, EnvError> {
        if nodes.len() != valid.len() {
            return Err(EnvError::DimensionMismatch {
                what: "validity mask",
                expected: nodes.len(),
                actual: valid.len(),
            });
        }
        let Some(depot) = nodes.first() else {
            return Err(EnvError::invalid("an instance needs a depot node"));
        };
        if depot.demand() != 0 || !valid[0] {
            return Err(EnvError::invalid(
                "node 0 must be a valid depot with zero demand",
            ));
        }
        if let Some(i) = (1..nodes.len()).find(|&i| valid[i] && nodes[i].demand() < 1) {
            return Err(EnvError::invalid(format!(
                "customer {i} must have a positive demand"
            )));
        }
        Ok(Self { nodes, valid })
    }

    /// All nodes (index 0 = depot).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// The depot node.
    pub fn depot(&self) -> &Node {
        &self.nodes[0]
    }

    /// Total number of node slots, depot included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of customer slots (valid or not).
    pub fn num_customers(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of valid customers.
    pub fn num_valid_customers(&self) -> usize {
        self.valid.iter().skip(1).filter(|&&v| v).count()
    }

    /// Returns `true` if the slot holds a real node.
    pub fn is_valid(&self, index: usize) -> bool {
        self.valid[index]
    }

    /// Per-node validity flags.
    pub fn validity(&self) -> &[bool] {
        &self.valid
    }

    /// Euclidean distance matrix over all node slots.
    pub fn distances(&self) -> DistanceMatrix {
        DistanceMatrix::from_nodes(&self.nodes)
    }

    /// Keeps the first `keep` customers and blanks the rest.
    fn truncate_customers(&mut self, keep: usize) {
        for i in (keep + 1)..self.nodes.len() {
            self.nodes[i] = Node::placeholder();
            self.valid[i] = false;
        }
    }
}

/// Scale factors applied by [`InstanceBatch::normalize`].
///
/// Coordinates map as `(x - offset) / location_scale`, times as
/// `t / time_scale`, so costs measured on a normalized batch convert back
/// with [`distance_to_original`](Self::distance_to_original) and
/// [`time_to_original`](Self::time_to_original).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    location_offset: [f64; 2],
    location_scale: f64,
    time_scale: f64,
}

impl Normalization {
    /// Coordinate offset subtracted before scaling.
    pub fn location_offset(&self) -> [f64; 2] {
        self.location_offset
    }

    /// Divisor applied to coordinates (and therefore distances).
    pub fn location_scale(&self) -> f64 {
        self.location_scale
    }

    /// Divisor applied to time fields.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Converts a normalized distance back to original units.
    pub fn distance_to_original(&self, distance: f64) -> f64 {
        distance * self.location_scale
    }

    /// Converts a normalized time back to original units.
    pub fn time_to_original(&self, time: f64) -> f64 {
        time * self.time_scale
    }

    /// Converts normalized coordinates back to original units.
    pub fn location_to_original(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.location_scale + self.location_offset[0],
            y * self.location_scale + self.location_offset[1],
        )
    }
}

/// A batch of instances sharing one variant, fleet and node layout.
///
/// Read-only once built (apart from the explicit normalization and
/// validity-mask passes); environments borrow it for a whole episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInstanceBatch")]
pub struct InstanceBatch {
    variant: ProblemVariant,
    fleet: Fleet,
    instances: Vec<Instance>,
    normalization: Option<Normalization>,
}

#[derive(Deserialize)]
struct RawInstanceBatch {
    variant: ProblemVariant,
    fleet: Fleet,
    instances: Vec<Instance>,
    #[serde(default)]
    normalization: Option<Normalization>,
}

impl TryFrom<RawInstanceBatch> for InstanceBatch {
    type Error = EnvError;

    fn try_from(raw: RawInstanceBatch) -> Result<Self, Self::Error> {
        let mut batch = Self::new(raw.variant, raw.fleet, raw.instances)?;
        batch.normalization = raw.normalization;
        Ok(batch)
    }
}

impl InstanceBatch {
    /// Creates a batch from explicit instances.
    ///
    /// Fails with `DimensionMismatch` if instances differ in node count.
    pub fn new(
        variant: ProblemVariant,
        fleet: Fleet,
        instances: Vec<Instance>,
    ) -> Result<Self, EnvError> {
        let Some(first) = instances.first() else {
            return Err(EnvError::invalid("a batch needs at least one instance"));
        };
        let expected = first.num_nodes();
        if let Some(bad) = instances.iter().find(|i| i.num_nodes() != expected) {
            return Err(EnvError::DimensionMismatch {
                what: "nodes per instance",
                expected,
                actual: bad.num_nodes(),
            });
        }
        Ok(Self {
            variant,
            fleet,
            instances,
            normalization: None,
        })
    }

    /// Problem family.
    pub fn variant(&self) -> ProblemVariant {
        self.variant
    }

    /// Fleet parameters (speed reflects normalization, if applied).
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the batch has no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Node slots per instance, depot included.
    pub fn num_nodes(&self) -> usize {
        self.instances.first().map_or(0, Instance::num_nodes)
    }

    /// All instances.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// The instance at `index`.
    pub fn instance(&self, index: usize) -> &Instance {
        &self.instances[index]
    }

    /// Scale factors, if the batch was normalized.
    pub fn normalization(&self) -> Option<&Normalization> {
        self.normalization.as_ref()
    }

    /// Rescales coordinates into `[0, 1]` and time fields by a
    /// representative horizon.
    ///
    /// The time scale is the largest depot due date (VRPTW), the largest
    /// survival deadline (ambulance) or the time to cross the coordinate
    /// range (CVRP). Speed is rescaled so that travel times stay consistent.
    /// Calling it again returns the stored factors unchanged.
    pub fn normalize(&mut self) -> Normalization {
        if let Some(n) = self.normalization {
            return n;
        }

        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for inst in &self.instances {
            for (node, _) in inst.nodes.iter().zip(&inst.valid).filter(|(_, v)| **v) {
                min[0] = min[0].min(node.x());
                min[1] = min[1].min(node.y());
                max[0] = max[0].max(node.x());
                max[1] = max[1].max(node.y());
            }
        }
        let span = (max[0] - min[0]).max(max[1] - min[1]);
        let location_scale = if span.is_finite() && span > 0.0 { span } else { 1.0 };
        let location_offset = if min[0].is_finite() { min } else { [0.0; 2] };

        let crossing_time = location_scale / self.fleet.speed();
        let horizon = match self.variant {
            ProblemVariant::Cvrp => None,
            ProblemVariant::Vrptw => self
                .instances
                .iter()
                .filter_map(|i| i.depot().time_window().map(|tw| tw.due()))
                .reduce(f64::max),
            ProblemVariant::Ambulance => self
                .instances
                .iter()
                .flat_map(|i| i.nodes.iter().filter_map(Node::survival_deadline))
                .reduce(f64::max),
        };
        let time_scale = horizon
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(crossing_time);

        let norm = Normalization {
            location_offset,
            location_scale,
            time_scale,
        };
        for inst in &mut self.instances {
            for (node, &valid) in inst.nodes.iter_mut().zip(&inst.valid) {
                if valid {
                    *node = node.rescaled(location_offset, location_scale, time_scale);
                }
            }
        }
        self.fleet = self
            .fleet
            .with_speed(self.fleet.speed() * time_scale / location_scale);
        self.normalization = Some(norm);

        debug!(
            location_scale,
            time_scale,
            speed = self.fleet.speed(),
            "normalized instance batch"
        );
        norm
    }

    /// Blanks a random suffix of customers in every instance.
    ///
    /// Each instance keeps a uniformly drawn number of customers in
    /// `[min_count, customer_count]`; the rest become invalid placeholders.
    /// The depot is never affected.
    pub fn apply_validity_mask<R: Rng>(
        &mut self,
        min_count: usize,
        rng: &mut R,
    ) -> Result<(), EnvError> {
        let customer_count = self.num_nodes().saturating_sub(1);
        if min_count > customer_count {
            return Err(EnvError::invalid(format!(
                "min_count {min_count} exceeds customer count {customer_count}"
            )));
        }
        for inst in &mut self.instances {
            let keep = rng.random_range(min_count..=customer_count);
            inst.truncate_customers(keep);
        }
        debug!(min_count, customer_count, "applied customer validity mask");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_instance(offset: f64) -> Instance {
        Instance::new(vec![
            Node::depot(offset, offset).with_time_window(TimeWindow::new(0.0, 480.0).expect("tw")),
            Node::customer(offset + 10.0, offset, 5)
                .with_time_window(TimeWindow::new(30.0, 90.0).expect("tw")),
            Node::customer(offset, offset + 50.0, 7)
                .with_time_window(TimeWindow::new(0.0, 240.0).expect("tw")),
        ])
        .expect("valid instance")
    }

    fn sample_batch() -> InstanceBatch {
        let fleet = Fleet::new(2, 20, 1.0).expect("fleet");
        InstanceBatch::new(
            ProblemVariant::Vrptw,
            fleet,
            vec![sample_instance(0.0), sample_instance(50.0)],
        )
        .expect("batch")
    }

    #[test]
    fn test_instance_requires_depot() {
        assert!(Instance::new(vec![]).is_err());
        assert!(Instance::new(vec![Node::customer(0.0, 0.0, 3)]).is_err());
        assert!(Instance::new(vec![Node::depot(0.0, 0.0), Node::customer(1.0, 0.0, 0)]).is_err());
    }

    #[test]
    fn test_instance_validity_mismatch() {
        let err = Instance::with_validity(vec![Node::depot(0.0, 0.0)], vec![true, true]);
        assert!(matches!(err, Err(EnvError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_batch_rejects_ragged_instances() {
        let fleet = Fleet::new(1, 10, 1.0).expect("fleet");
        let small = Instance::new(vec![Node::depot(0.0, 0.0)]).expect("valid");
        let err = InstanceBatch::new(ProblemVariant::Cvrp, fleet, vec![sample_instance(0.0), small]);
        assert!(matches!(
            err,
            Err(EnvError::DimensionMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));
        assert!(InstanceBatch::new(ProblemVariant::Cvrp, fleet, vec![]).is_err());
    }

    #[test]
    fn test_normalize_scales_and_inverts() {
        let mut batch = sample_batch();
        let original = batch.clone();
        let norm = batch.normalize();

        assert_eq!(norm.location_offset(), [0.0, 0.0]);
        assert!((norm.location_scale() - 100.0).abs() < 1e-12);
        assert!((norm.time_scale() - 480.0).abs() < 1e-12);
        assert!((batch.fleet().speed() - 4.8).abs() < 1e-12);

        for (a, b) in original.instances().iter().zip(batch.instances()) {
            for (na, nb) in a.nodes().iter().zip(b.nodes()) {
                assert!(nb.x() >= 0.0 && nb.x() <= 1.0);
                let (x, y) = norm.location_to_original(nb.x(), nb.y());
                assert!((x - na.x()).abs() < 1e-9);
                assert!((y - na.y()).abs() < 1e-9);
            }
            // travel time is preserved up to the time scale
            let t_orig = a.node(0).distance_to(a.node(2)) / original.fleet().speed();
            let t_norm = b.node(0).distance_to(b.node(2)) / batch.fleet().speed();
            assert!((norm.time_to_original(t_norm) - t_orig).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut batch = sample_batch();
        let first = batch.normalize();
        let snapshot = batch.clone();
        let second = batch.normalize();
        assert_eq!(first, second);
        assert_eq!(batch, snapshot);
    }

    #[test]
    fn test_validity_mask_keeps_depot() {
        let mut batch = sample_batch();
        let mut rng = StdRng::seed_from_u64(7);
        batch.apply_validity_mask(0, &mut rng).expect("mask");
        for inst in batch.instances() {
            assert!(inst.is_valid(0));
            let n = inst.num_valid_customers();
            // valid customers form a prefix
            assert!(inst.validity()[1..=n].iter().all(|&v| v));
            assert!(inst.validity()[n + 1..].iter().all(|&v| !v));
            for i in n + 1..inst.num_nodes() {
                assert_eq!(inst.node(i), &Node::placeholder());
            }
        }
    }

    #[test]
    fn test_validity_mask_min_count_too_large() {
        let mut batch = sample_batch();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            batch.apply_validity_mask(3, &mut rng),
            Err(EnvError::InvalidParameter(_))
        ));
        batch.apply_validity_mask(2, &mut rng).expect("full size");
        assert!(batch.instances().iter().all(|i| i.num_valid_customers() == 2));
    }

    #[test]
    fn test_batch_json_roundtrip() {
        let mut batch = sample_batch();
        batch.normalize();
        let json = serde_json::to_string(&batch).expect("serialize");
        let back: InstanceBatch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, batch);
    }

    #[test]
    fn test_instance_without_validity_loads_all_valid() {
        let inst: Instance = serde_json::from_str(
            r#"{"nodes": [{"x": 0.0, "y": 0.0, "demand": 0}, {"x": 1.0, "y": 2.0, "demand": 3}]}"#,
        )
        .expect("valid");
        assert_eq!(inst.validity(), &[true, true]);
    }

    #[test]
    fn test_malformed_instances_rejected_on_load() {
        let depot = r#"{"x": 0.0, "y": 0.0, "demand": 0}"#;
        let customer = |demand: i32| format!(r#"{{"x": 1.0, "y": 1.0, "demand": {demand}}}"#);
        let bad = [
            // zero-demand valid customer
            format!(r#"{{"nodes": [{depot}, {}], "valid": [true, true]}}"#, customer(0)),
            // validity shorter than nodes
            format!(r#"{{"nodes": [{depot}, {}], "valid": [true]}}"#, customer(1)),
            // depot with demand
            format!(r#"{{"nodes": [{}, {}]}}"#, customer(1), customer(1)),
            // invalid depot
            format!(r#"{{"nodes": [{depot}], "valid": [false]}}"#),
            // no depot at all
            r#"{"nodes": []}"#.to_string(),
        ];
        for json in &bad {
            assert!(serde_json::from_str::<Instance>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn test_malformed_batches_rejected_on_load() {
        let mut value = serde_json::to_value(sample_batch()).expect("serialize");
        value["instances"][1]["nodes"]
            .as_array_mut()
            .expect("nodes")
            .pop();
        value["instances"][1]["valid"]
            .as_array_mut()
            .expect("valid")
            .pop();
        assert!(serde_json::from_value::<InstanceBatch>(value).is_err());

        let mut value = serde_json::to_value(sample_batch()).expect("serialize");
        value["instances"] = serde_json::json!([]);
        assert!(serde_json::from_value::<InstanceBatch>(value).is_err());

        let mut value = serde_json::to_value(sample_batch()).expect("serialize");
        value["fleet"]["capacity"] = serde_json::json!(0);
        assert!(serde_json::from_value::<InstanceBatch>(value).is_err());
    }
}
