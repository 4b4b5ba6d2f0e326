//! risk-runner: headless contingency simulation over a risk register.
//!
//! Usage:
//!   risk-runner --risks data/portfolio.json --iterations 20000 --seed 42
//!   risk-runner --risks data/portfolio.json --cache-db cache.db --previous <simulation-id>
//!   risk-runner --cache-db cache.db --invalidate ground-conditions

use anyhow::{Context, Result};
use contingency_core::{
    cache::{MemoryResultCache, ResultCache},
    config::EngineConfig,
    results::SimulationResults,
    risk::{ImpactType, Risk},
    simulator::RiskSimulator,
    stats::{percentiles, OutcomeSummary, P10, P50, P90},
    store::SqliteResultCache,
};
use std::env;
use std::sync::Arc;

#[derive(serde::Serialize)]
struct RunReport<'a> {
    simulation_id: &'a str,
    fingerprint: &'a str,
    iterations: usize,
    seed: u64,
    execution_ms: u128,
    cost: &'a OutcomeSummary,
    cost_contingency: f64,
    schedule: &'a OutcomeSummary,
    schedule_contingency: f64,
    correlation_corrected: bool,
    performance_warning: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let iterations = parse_arg(&args, "--iterations", 10_000usize);
    let seed = flag_value(&args, "--seed")
        .map(|s| s.parse::<u64>().with_context(|| format!("--seed {s} is not a u64")))
        .transpose()?;
    let risks_path = flag_value(&args, "--risks").unwrap_or("./data/portfolio.json");
    let previous = flag_value(&args, "--previous");
    let invalidate = flag_value(&args, "--invalidate");
    let cache_db = flag_value(&args, "--cache-db");
    let json = args.iter().any(|a| a == "--json");

    let config = match flag_value(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let cache: Arc<dyn ResultCache> = match cache_db {
        Some(path) => Arc::new(SqliteResultCache::open(path)?),
        None => Arc::new(MemoryResultCache::from_config(&config)),
    };
    let simulator = RiskSimulator::new(config, cache);

    if let Some(risk_id) = invalidate {
        let removed = simulator.invalidate_cache_for_risk(risk_id);
        println!("invalidated {removed} cached result(s) for risk {risk_id}");
        return Ok(());
    }

    let risks = load_risks(risks_path)?;
    let validation = simulator.validate_simulation_parameters(&risks, iterations);
    if !validation.is_valid {
        for e in &validation.errors {
            eprintln!("  {}: {}", e.field, e.message);
        }
        anyhow::bail!("{} validation error(s) in {risks_path}", validation.errors.len());
    }

    let results = simulator.run_simulation_with_caching(&risks, iterations, seed, previous)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report(&results))?);
    } else {
        print_summary(&results, &simulator);
    }
    Ok(())
}

fn load_risks(path: &str) -> Result<Vec<Risk>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let risks: Vec<Risk> =
        serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
    log::info!("Loaded {} risks from {path}", risks.len());
    Ok(risks)
}

fn report(results: &SimulationResults) -> RunReport<'_> {
    RunReport {
        simulation_id: &results.simulation_id,
        fingerprint: &results.fingerprint,
        iterations: results.iterations,
        seed: results.seed,
        execution_ms: results.execution_time.as_millis(),
        cost: &results.cost_summary,
        cost_contingency: results.cost_summary.contingency(),
        schedule: &results.schedule_summary,
        schedule_contingency: results.schedule_summary.contingency(),
        correlation_corrected: results.correlation_corrected(),
        performance_warning: results.metadata.performance_warning,
    }
}

fn print_summary(results: &SimulationResults, simulator: &RiskSimulator) {
    println!("Contingency simulation {}", results.simulation_id);
    println!("  iterations:  {}", results.iterations);
    println!(
        "  seed:        {}{}",
        results.seed,
        if results.metadata.seed_generated { " (generated)" } else { "" }
    );
    println!("  elapsed:     {:?}", results.execution_time);
    println!();
    println!("  {:<10} {:>14} {:>14} {:>14} {:>14}", "", "P10", "P50", "P90", "P90-P50");
    for (label, impact) in [("cost", ImpactType::Cost), ("schedule", ImpactType::Schedule)] {
        let summary = results.summary(impact);
        println!(
            "  {:<10} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            label,
            summary.p10,
            summary.p50,
            summary.p90,
            summary.contingency()
        );
    }

    println!();
    println!("  per-risk contribution (P10 / P50 / P90):");
    for (risk_id, contribution) in &results.risk_contributions {
        let p = percentiles(contribution, &[P10, P50, P90]);
        println!("    {risk_id:<28} {:>12.2} {:>12.2} {:>12.2}", p[0], p[1], p[2]);
    }

    if let Some(c) = &results.metadata.correlation_correction {
        println!();
        println!(
            "  WARNING: correlations were inconsistent (min eigenvalue {:.4}); \
             coefficients adjusted by up to {:.4}",
            c.min_eigenvalue, c.max_adjustment
        );
    }
    if results.metadata.performance_warning {
        println!("  WARNING: run exceeded the {:?} soft budget", simulator.config().soft_budget());
    }

    let stats = simulator.cache_stats();
    println!();
    println!(
        "  cache: {} hit(s), {} miss(es), {} entries",
        stats.hits, stats.misses, stats.entries
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
