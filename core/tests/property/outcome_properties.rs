use contingency_core::{
    config::EngineConfig,
    distribution::ProbabilityDistribution,
    engine::MonteCarloEngine,
    risk::{ImpactType, Risk},
    stats::percentiles,
};
use proptest::prelude::*;

fn distribution() -> impl Strategy<Value = ProbabilityDistribution> {
    prop_oneof![
        (-5.0..5.0f64, 0.01..3.0f64)
            .prop_map(|(mean, std)| ProbabilityDistribution::Normal { mean, std }),
        (0.0..1.0f64, 0.0..1.0f64, 0.1..5.0f64).prop_map(|(min, t, width)| {
            ProbabilityDistribution::Triangular { min, mode: min + t * width, max: min + width }
        }),
        (-3.0..3.0f64, 0.1..4.0f64)
            .prop_map(|(min, width)| ProbabilityDistribution::Uniform { min, max: min + width }),
        (0.5..8.0f64, 0.5..8.0f64)
            .prop_map(|(alpha, beta)| ProbabilityDistribution::Beta { alpha, beta }),
        (-1.0..2.0f64, 0.05..1.0f64)
            .prop_map(|(mu, sigma)| ProbabilityDistribution::LogNormal { mu, sigma }),
    ]
}

fn risk_set() -> impl Strategy<Value = Vec<Risk>> {
    let spec = (distribution(), 1.0..10_000.0f64, any::<bool>());
    prop::collection::vec(spec, 1..6).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (dist, baseline, is_cost))| {
                let impact = if is_cost { ImpactType::Cost } else { ImpactType::Schedule };
                Risk::new(format!("r{i}"), impact, dist, baseline)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn outcome_arrays_match_iteration_count(risks in risk_set(), seed in any::<u64>()) {
        let engine = MonteCarloEngine::new(EngineConfig::default());
        let results = engine.run(&risks, 1_000, Some(seed)).unwrap();
        prop_assert_eq!(results.cost_outcomes.len(), 1_000);
        prop_assert_eq!(results.schedule_outcomes.len(), 1_000);
        prop_assert_eq!(results.risk_contributions.len(), risks.len());
        for contribution in results.risk_contributions.values() {
            prop_assert_eq!(contribution.len(), 1_000);
        }
    }

    #[test]
    fn percentiles_are_ordered_and_bounded(risks in risk_set(), seed in any::<u64>()) {
        let engine = MonteCarloEngine::new(EngineConfig::default());
        let results = engine.run(&risks, 1_000, Some(seed)).unwrap();
        for s in [&results.cost_summary, &results.schedule_summary] {
            prop_assert!(s.min <= s.p10, "min {} > p10 {}", s.min, s.p10);
            prop_assert!(s.p10 <= s.p50, "p10 {} > p50 {}", s.p10, s.p50);
            prop_assert!(s.p50 <= s.p90, "p50 {} > p90 {}", s.p50, s.p90);
            prop_assert!(s.p90 <= s.max, "p90 {} > max {}", s.p90, s.max);
            prop_assert!(s.contingency() >= 0.0);
        }
        prop_assert!(results.cost_outcomes.iter().all(|v| v.is_finite()));
        prop_assert!(results.schedule_outcomes.iter().all(|v| v.is_finite()));
        prop_assert!(results.risk_contributions.values().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn same_seed_same_outcomes(risks in risk_set(), seed in any::<u64>()) {
        let engine = MonteCarloEngine::new(EngineConfig::default());
        let a = engine.run(&risks, 1_000, Some(seed)).unwrap();
        let b = engine.run(&risks, 1_000, Some(seed)).unwrap();
        prop_assert_eq!(a.cost_outcomes, b.cost_outcomes);
        prop_assert_eq!(a.schedule_outcomes, b.schedule_outcomes);
    }

    #[test]
    fn percentile_function_is_monotone(
        mut values in prop::collection::vec(-1e6..1e6f64, 1..200),
        mut ps in prop::collection::vec(0.0..=100.0f64, 1..10),
    ) {
        ps.sort_by(|a, b| a.total_cmp(b));
        let out = percentiles(&values, &ps);
        prop_assert!(out.windows(2).all(|w| w[0] <= w[1]), "{:?} -> {:?}", ps, out);

        values.sort_by(|a, b| a.total_cmp(b));
        let (lo, hi) = (values[0], values[values.len() - 1]);
        prop_assert!(out.iter().all(|v| (lo..=hi).contains(v)));
    }
}
