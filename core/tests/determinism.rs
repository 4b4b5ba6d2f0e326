//! Same risks, same iterations, same seed: bit-identical outcomes.
//! Any divergence here is a blocker.

use contingency_core::{
    config::EngineConfig,
    distribution::ProbabilityDistribution,
    risk::{ImpactType, Risk},
    simulator::RiskSimulator,
};

fn portfolio() -> Vec<Risk> {
    vec![
        Risk::new(
            "ground-conditions",
            ImpactType::Cost,
            ProbabilityDistribution::Triangular { min: 0.0, mode: 0.3, max: 1.5 },
            250_000.0,
        )
        .with_correlation("permit-delay", 0.4),
        Risk::new(
            "permit-delay",
            ImpactType::Schedule,
            ProbabilityDistribution::LogNormal { mu: 0.0, sigma: 0.5 },
            20.0,
        ),
        Risk::new(
            "steel-price",
            ImpactType::Cost,
            ProbabilityDistribution::Beta { alpha: 2.0, beta: 5.0 },
            400_000.0,
        ),
        Risk::new(
            "labour-availability",
            ImpactType::Schedule,
            ProbabilityDistribution::Uniform { min: -5.0, max: 15.0 },
            1.0,
        )
        .with_correlation("steel-price", -0.3),
    ]
}

#[test]
fn same_seed_produces_identical_outcomes() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    // Two independent simulators: nothing is shared between the runs.
    let sim_a = RiskSimulator::in_memory(EngineConfig::default());
    let sim_b = RiskSimulator::in_memory(EngineConfig::default());

    let a = sim_a.run_simulation(&portfolio(), 5_000, Some(SEED)).expect("run a");
    let b = sim_b.run_simulation(&portfolio(), 5_000, Some(SEED)).expect("run b");

    assert_eq!(a.cost_outcomes, b.cost_outcomes, "cost outcomes diverged");
    assert_eq!(a.schedule_outcomes, b.schedule_outcomes, "schedule outcomes diverged");
    assert_eq!(a.risk_contributions, b.risk_contributions, "contributions diverged");
    assert_eq!(a.cost_summary, b.cost_summary);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_ne!(a.simulation_id, b.simulation_id, "each run gets its own handle");
}

#[test]
fn different_seeds_produce_different_outcomes() {
    let sim = RiskSimulator::in_memory(EngineConfig::default());
    let a = sim.run_simulation(&portfolio(), 2_000, Some(42)).expect("run a");
    let b = sim.run_simulation(&portfolio(), 2_000, Some(99)).expect("run b");

    assert_ne!(
        a.cost_outcomes, b.cost_outcomes,
        "Different seeds produced identical outcomes: seed is not being used"
    );
}

#[test]
fn input_order_does_not_change_outcomes() {
    let sim = RiskSimulator::in_memory(EngineConfig::default());
    let forward = sim.run_simulation(&portfolio(), 3_000, Some(7)).expect("forward");

    let mut reversed = portfolio();
    reversed.reverse();
    let backward = sim.run_simulation(&reversed, 3_000, Some(7)).expect("reversed");

    assert_eq!(forward.fingerprint, backward.fingerprint);
    assert_eq!(forward.cost_outcomes, backward.cost_outcomes);
    assert_eq!(forward.risk_contributions, backward.risk_contributions);
}

#[test]
fn generated_seed_is_recorded_and_replayable() {
    let sim = RiskSimulator::in_memory(EngineConfig::default());
    let first = sim.run_simulation(&portfolio(), 2_000, None).expect("unseeded run");
    assert!(first.metadata.seed_generated);

    let replay = sim
        .run_simulation(&portfolio(), 2_000, Some(first.seed))
        .expect("replay");
    assert!(!replay.metadata.seed_generated);
    assert_eq!(first.cost_outcomes, replay.cost_outcomes);
    assert_eq!(first.schedule_outcomes, replay.schedule_outcomes);
}

/// One NORMAL(0, 1) cost risk, impact 1000, 10 000 iterations, seed 42.
#[test]
fn single_normal_risk_reference_scenario() {
    let risks = vec![Risk::new(
        "r1",
        ImpactType::Cost,
        ProbabilityDistribution::Normal { mean: 0.0, std: 1.0 },
        1_000.0,
    )];

    let first = RiskSimulator::in_memory(EngineConfig::default())
        .run_simulation(&risks, 10_000, Some(42))
        .expect("first invocation");
    let second = RiskSimulator::in_memory(EngineConfig::default())
        .run_simulation(&risks, 10_000, Some(42))
        .expect("second invocation");

    assert_eq!(first.cost_outcomes, second.cost_outcomes);

    let s = &first.cost_summary;
    assert!(s.p50.abs() < 60.0, "P50 should be close to 0, got {}", s.p50);
    assert!(s.min <= s.p50 && s.p50 <= s.max);
    assert!((s.std_dev - 1_000.0).abs() < 50.0, "std dev {}", s.std_dev);
    assert!(first.schedule_outcomes.iter().all(|v| *v == 0.0));
}
