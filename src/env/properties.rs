//! Randomized checks of the transition engine over generated batches,
//! arbitrary mixed-deadline instances and random feasible action streams.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DoneCriterion, EnvConfig, Environment, Snapshot};
use crate::error::EnvError;
use crate::models::{
    generate, Fleet, GeneratorConfig, Instance, InstanceBatch, Node, ProblemVariant, TimeWindow,
};

const TOL: f64 = 1e-9;

fn batch_for(kind: u8, seed: u64, count: usize, customers: usize, vehicles: usize) -> InstanceBatch {
    let mut config = match kind {
        0 => GeneratorConfig::cvrp(count, customers, vehicles),
        1 => GeneratorConfig::vrptw(count, customers, vehicles),
        _ => GeneratorConfig::ambulance(count, customers, vehicles),
    };
    if kind == 0 {
        config.capacity = 60;
    }
    config.min_customer_count = Some(customers / 2);
    let mut rng = StdRng::seed_from_u64(seed);
    generate(&config, &mut rng).expect("valid generator config")
}

/// Customers with any mix of demand, time window (possibly opening late)
/// and survival deadline.
fn customer_strategy() -> impl Strategy<Value = Node> {
    (
        0.0..100.0f64,
        0.0..100.0f64,
        1i32..4,
        prop::option::of((0.0..150.0f64, 1.0..150.0f64)),
        prop::option::of(5.0..300.0f64),
    )
        .prop_map(|(x, y, demand, window, survival)| {
            let mut node = Node::customer(x, y, demand);
            if let Some((ready, width)) = window {
                let tw = TimeWindow::new(ready, ready + width).expect("window");
                node = node.with_time_window(tw);
            }
            if let Some(survival) = survival {
                node = node.with_survival_deadline(survival);
            }
            node
        })
}

fn instance_strategy(customers: usize) -> impl Strategy<Value = Instance> {
    (
        0.0..100.0f64,
        0.0..100.0f64,
        prop::collection::vec(customer_strategy(), customers),
        prop::collection::vec(any::<bool>(), customers),
    )
        .prop_map(|(x, y, customers, valid)| {
            let nodes = std::iter::once(Node::depot(x, y)).chain(customers).collect();
            let valid = std::iter::once(true).chain(valid).collect();
            Instance::with_validity(nodes, valid).expect("valid instance")
        })
}

fn mixed_batch_strategy() -> impl Strategy<Value = InstanceBatch> {
    (1usize..8, 1usize..4, 1usize..4, 1i32..6, 0.5..2.0f64).prop_flat_map(
        |(customers, count, vehicles, capacity, speed)| {
            prop::collection::vec(instance_strategy(customers), count).prop_map(move |instances| {
                let fleet = Fleet::new(vehicles, capacity, speed).expect("fleet");
                InstanceBatch::new(ProblemVariant::Ambulance, fleet, instances).expect("batch")
            })
        },
    )
}

fn random_actions<R: Rng>(env: &Environment<'_>, rng: &mut R) -> Vec<usize> {
    (0..env.batch_size())
        .map(|b| {
            let feasible: Vec<usize> = env
                .action_mask(b)
                .iter()
                .enumerate()
                .filter(|(_, ok)| **ok)
                .map(|(j, _)| j)
                .collect();
            feasible[rng.random_range(0..feasible.len())]
        })
        .collect()
}

fn step_bound(batch: &InstanceBatch) -> usize {
    2 * (batch.num_nodes() - 1) + batch.fleet().vehicle_count() + 1
}

/// Drives `env` with random feasible actions until done, checking the
/// state invariants after every step. Returns the actions taken.
fn run_checked(env: &mut Environment<'_>, seed: u64) -> Result<Vec<Vec<usize>>, TestCaseError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bound = step_bound(env.batch());
    let mut history = Vec::new();
    check_invariants(env)?;
    while !env.is_done() {
        prop_assert!(history.len() < bound, "no termination within {bound} steps");
        let before: Vec<Vec<bool>> = env.episodes().iter().map(|e| e.served().to_vec()).collect();
        let actions = random_actions(env, &mut rng);
        let outcome = env.step(&actions);
        prop_assert!(
            !matches!(outcome, Err(EnvError::CapacityViolation { .. })),
            "capacity violation on a feasible action"
        );
        prop_assert!(outcome.is_ok(), "feasible action rejected: {:?}", outcome.err());
        for (b, served) in before.iter().enumerate() {
            for (j, &was) in served.iter().enumerate() {
                prop_assert!(!was || env.episode(b).served()[j], "served flag cleared");
            }
        }
        check_invariants(env)?;
        history.push(actions);
    }
    Ok(history)
}

fn check_invariants(env: &Environment<'_>) -> Result<(), TestCaseError> {
    let capacity = env.batch().fleet().capacity();
    for b in 0..env.batch_size() {
        let ctx = env.context(b);
        let episode = env.episode(b);
        prop_assert!(!episode.served()[0]);

        for vehicle in episode.vehicles() {
            prop_assert!(vehicle.remaining_capacity() >= 0);
            prop_assert_eq!(vehicle.remaining_capacity() + vehicle.onboard().load(), capacity);
            prop_assert_eq!(vehicle.onboard().count(), vehicle.onboard().iter().count());
            // whatever is aboard still reaches the depot alive
            if let Some(limit) = vehicle.onboard().earliest_deadline() {
                let back = ctx.fleet.travel_time(ctx.distances.get(vehicle.node(), 0));
                prop_assert!(vehicle.clock() + back <= limit + TOL);
            }
        }

        let Some(v) = episode.active_vehicle() else {
            prop_assert_eq!(env.action_mask(b).iter().filter(|ok| **ok).count(), 1);
            continue;
        };
        let vehicle = &episode.vehicles()[v];
        prop_assert!(!vehicle.is_done());
        prop_assert!(episode
            .vehicles()
            .iter()
            .filter(|o| !o.is_done())
            .all(|o| o.clock() >= vehicle.clock()));

        let row = env.action_mask(b);
        prop_assert!(row[0]);
        for (j, _) in row.iter().enumerate().skip(1).filter(|(_, ok)| **ok) {
            let node = ctx.instance.node(j);
            prop_assert!(ctx.instance.is_valid(j));
            prop_assert!(!episode.served()[j]);
            prop_assert!(node.demand() <= vehicle.remaining_capacity());
            let arrival =
                vehicle.clock() + ctx.fleet.travel_time(ctx.distances.get(vehicle.node(), j));
            prop_assert!(!node.is_late(arrival));
            // after any wait, everyone aboard and the new pickup still make it home
            let limit = match (vehicle.onboard().earliest_deadline(), node.survival_deadline()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            if let Some(limit) = limit {
                let back = ctx.fleet.travel_time(ctx.distances.get(j, 0));
                prop_assert!(node.service_start(arrival) + back <= limit + TOL);
            }
        }
    }
    Ok(())
}

fn replay(env: &mut Environment<'_>, history: &[Vec<usize>]) {
    for actions in history {
        env.step(actions).expect("replayed action feasible");
    }
}

/// Snapshots after `cut` steps, restores from JSON and checks the resumed
/// run ends where the uninterrupted one did.
fn check_resume(
    batch: &InstanceBatch,
    full: &Environment<'_>,
    history: &[Vec<usize>],
    cut: usize,
) -> Result<(), TestCaseError> {
    let cut = cut % (history.len() + 1);
    let mut partial = Environment::new(batch, EnvConfig::default()).expect("env");
    replay(&mut partial, &history[..cut]);
    let json = partial.snapshot().to_json().expect("serialize");

    let mut resumed = Environment::new(batch, EnvConfig::default()).expect("env");
    resumed.restore(Snapshot::from_json(&json).expect("parse")).expect("restore");
    prop_assert_eq!(resumed.snapshot(), partial.snapshot());
    replay(&mut resumed, &history[cut..]);
    prop_assert_eq!(resumed.snapshot(), full.snapshot());
    prop_assert_eq!(resumed.returns(), full.returns());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_random_feasible_episodes(
        kind in 0u8..3,
        seed in any::<u64>(),
        action_seed in any::<u64>(),
        count in 1usize..4,
        customers in 1usize..9,
        vehicles in 1usize..4,
        normalize in any::<bool>(),
        idle in any::<bool>(),
    ) {
        let mut batch = batch_for(kind, seed, count, customers, vehicles);
        if normalize {
            batch.normalize();
        }
        let mut config = EnvConfig::default();
        if idle {
            config = config.with_done_criterion(DoneCriterion::IdleAtDepot);
        }
        let mut env = Environment::new(&batch, config).expect("env");
        if idle {
            // unload-and-park cycles can repeat, so only the invariants apply
            let mut rng = StdRng::seed_from_u64(action_seed);
            for _ in 0..4 * step_bound(&batch) {
                if env.is_done() {
                    break;
                }
                let actions = random_actions(&env, &mut rng);
                prop_assert!(env.step(&actions).is_ok());
                check_invariants(&env)?;
            }
        } else {
            let history = run_checked(&mut env, action_seed)?;
            for episode in env.episodes() {
                prop_assert!(episode.terminal_penalty().is_some());
                prop_assert!(episode.total_reward().is_finite());
            }
            prop_assert!(env.step(&vec![0; env.batch_size()]).expect("no-op").done);
            prop_assert!(!history.is_empty());
        }
    }

    #[test]
    fn prop_replay_is_deterministic(
        kind in 0u8..3,
        seed in any::<u64>(),
        action_seed in any::<u64>(),
        customers in 1usize..9,
        vehicles in 1usize..4,
    ) {
        let batch = batch_for(kind, seed, 2, customers, vehicles);
        let mut first = Environment::new(&batch, EnvConfig::default()).expect("env");
        let history = run_checked(&mut first, action_seed)?;

        let mut second = Environment::new(&batch, EnvConfig::default()).expect("env");
        replay(&mut second, &history);
        prop_assert_eq!(first.snapshot(), second.snapshot());
        prop_assert_eq!(first.returns(), second.returns());

        let regenerated = batch_for(kind, seed, 2, customers, vehicles);
        prop_assert_eq!(&regenerated, &batch);
    }

    #[test]
    fn prop_snapshot_resume_matches(
        kind in 0u8..3,
        seed in any::<u64>(),
        action_seed in any::<u64>(),
        customers in 1usize..9,
        vehicles in 1usize..4,
        cut in 0usize..32,
    ) {
        let batch = batch_for(kind, seed, 2, customers, vehicles);
        let mut full = Environment::new(&batch, EnvConfig::default()).expect("env");
        let history = run_checked(&mut full, action_seed)?;
        check_resume(&batch, &full, &history, cut)?;
    }

    #[test]
    fn prop_mixed_instances_stay_sound(
        batch in mixed_batch_strategy(),
        action_seed in any::<u64>(),
        cut in 0usize..32,
    ) {
        let mut env = Environment::new(&batch, EnvConfig::default()).expect("env");
        let history = run_checked(&mut env, action_seed)?;
        for episode in env.episodes() {
            prop_assert!(episode.total_reward().is_finite());
        }
        check_resume(&batch, &env, &history, cut)?;
    }

    #[test]
    fn prop_mixed_instances_idle_at_depot(
        batch in mixed_batch_strategy(),
        action_seed in any::<u64>(),
    ) {
        let config = EnvConfig::default().with_done_criterion(DoneCriterion::IdleAtDepot);
        let mut env = Environment::new(&batch, config).expect("env");
        let mut rng = StdRng::seed_from_u64(action_seed);
        for _ in 0..4 * step_bound(&batch) {
            if env.is_done() {
                break;
            }
            let actions = random_actions(&env, &mut rng);
            prop_assert!(env.step(&actions).is_ok());
            check_invariants(&env)?;
        }
    }

    #[test]
    fn prop_batch_json_roundtrip(batch in mixed_batch_strategy()) {
        let json = serde_json::to_string(&batch).expect("serialize");
        let loaded: InstanceBatch = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(loaded, batch);
    }

    #[test]
    fn prop_corrupted_batch_rejected(
        batch in mixed_batch_strategy(),
        instance in any::<prop::sample::Index>(),
        customer in any::<prop::sample::Index>(),
    ) {
        let b = instance.index(batch.len());
        let j = 1 + customer.index(batch.num_nodes() - 1);
        let value = serde_json::to_value(&batch).expect("serialize");

        let mut zero_demand = value.clone();
        zero_demand["instances"][b]["nodes"][j]["demand"] = serde_json::json!(0);
        zero_demand["instances"][b]["valid"][j] = serde_json::json!(true);
        prop_assert!(serde_json::from_value::<InstanceBatch>(zero_demand).is_err());

        let mut short_validity = value.clone();
        short_validity["instances"][b]["valid"]
            .as_array_mut()
            .expect("validity")
            .pop();
        prop_assert!(serde_json::from_value::<InstanceBatch>(short_validity).is_err());

        if batch.len() > 1 {
            let mut ragged = value;
            ragged["instances"][b]["nodes"].as_array_mut().expect("nodes").remove(j);
            ragged["instances"][b]["valid"].as_array_mut().expect("validity").remove(j);
            prop_assert!(serde_json::from_value::<InstanceBatch>(ragged).is_err());
        }
    }
}
