//! The Monte Carlo engine: the iteration loop.
//!
//! PIPELINE (fixed, never reordered):
//!   1. Validate the request.
//!   2. Order risks by id. Draw component i always belongs to the
//!      i-th risk id, so input order never changes outcomes.
//!   3. Assemble and factor the correlation matrix (PSD repair if needed).
//!   4. Prepare each risk's marginal sampler.
//!   5. Per iteration: independent normals → correlated normals →
//!      marginal sample × baseline impact → cost or schedule total.
//!   6. Summaries, timing, metadata.
//!
//! RULES:
//!   - The engine holds no mutable state between runs.
//!   - All randomness flows through one SimulationRng owned by the run.
//!   - The hard ceiling is checked between iterations, never mid-iteration.
//!   - A non-finite value aborts the run; nothing is silently dropped.

use crate::{
    config::EngineConfig,
    correlation::{CorrelationEngine, CorrelationMatrix},
    distribution::{MarginalSampler, NonFiniteSample},
    error::{SimError, SimResult},
    fingerprint::fingerprint,
    results::{SimulationMetadata, SimulationResults},
    risk::{ImpactType, Risk},
    rng::{SimulationRng, CORRELATED_DRAWS_STREAM},
    stats::OutcomeSummary,
    validation::validate_simulation_parameters,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// One independent simulation request, as dispatched in batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub risks: Vec<Risk>,
    pub iterations: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

pub struct MonteCarloEngine {
    config: EngineConfig,
}

impl MonteCarloEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one simulation. With `seed` supplied, outcomes are a pure
    /// function of (risks, iterations, seed).
    pub fn run(
        &self,
        risks: &[Risk],
        iterations: usize,
        seed: Option<u64>,
    ) -> SimResult<SimulationResults> {
        let validation = validate_simulation_parameters(risks, iterations, &self.config);
        if !validation.is_valid {
            return Err(SimError::Validation(validation.errors));
        }

        let started = Instant::now();
        let (seed, seed_generated) = match seed {
            Some(seed) => (seed, false),
            None => (SimulationRng::fresh_seed(), true),
        };

        let mut ordered: Vec<Risk> = risks.to_vec();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let matrix = CorrelationMatrix::assemble(&ordered);
        let correlation = CorrelationEngine::new(&matrix, self.config.eigenvalue_floor)?;
        let samplers = ordered
            .iter()
            .map(|r| MarginalSampler::new(&r.distribution))
            .collect::<SimResult<Vec<_>>>()?;

        log::debug!(
            "engine: {} risks, {iterations} iterations, seed={seed}{}",
            ordered.len(),
            if seed_generated { " (generated)" } else { "" }
        );

        let accumulated =
            self.iterate(&ordered, &samplers, &correlation, iterations, seed, started)?;

        let execution_time = started.elapsed();
        let performance_warning = execution_time > self.config.soft_budget();
        if performance_warning {
            log::warn!(
                "engine: run took {execution_time:?}, over the {:?} soft budget",
                self.config.soft_budget()
            );
        }

        let results = SimulationResults {
            simulation_id: Uuid::new_v4().to_string(),
            fingerprint: fingerprint(risks, iterations, seed)?,
            iterations,
            seed,
            cost_summary: OutcomeSummary::from_outcomes(&accumulated.cost),
            schedule_summary: OutcomeSummary::from_outcomes(&accumulated.schedule),
            cost_outcomes: accumulated.cost,
            schedule_outcomes: accumulated.schedule,
            risk_contributions: ordered
                .iter()
                .map(|r| r.id.clone())
                .zip(accumulated.contributions)
                .collect(),
            execution_time,
            created_at: Utc::now(),
            metadata: SimulationMetadata {
                correlation_correction: correlation.correction().copied(),
                performance_warning,
                seed_generated,
            },
        };

        log::info!(
            "engine: simulation {} done in {:?} (cost P50={:.2} P90={:.2})",
            results.simulation_id,
            results.execution_time,
            results.cost_summary.p50,
            results.cost_summary.p90
        );
        Ok(results)
    }

    fn iterate(
        &self,
        ordered: &[Risk],
        samplers: &[MarginalSampler],
        correlation: &CorrelationEngine,
        iterations: usize,
        seed: u64,
        started: Instant,
    ) -> SimResult<Accumulated> {
        let n = ordered.len();
        let hard_ceiling = self.config.hard_ceiling();
        let mut rng = SimulationRng::new(seed, CORRELATED_DRAWS_STREAM);
        let mut independent = vec![0.0; n];
        let mut correlated = vec![0.0; n];
        let mut acc = Accumulated::with_capacity(n, iterations);

        for iteration in 0..iterations {
            if iteration > 0 {
                let elapsed = started.elapsed();
                if elapsed > hard_ceiling {
                    log::warn!(
                        "engine: aborted after {iteration}/{iterations} iterations ({elapsed:?})"
                    );
                    return Err(SimError::Timeout {
                        elapsed,
                        completed_iterations: iteration,
                        iterations,
                    });
                }
            }

            rng.fill_standard_normal(&mut independent);
            correlation.correlate(&independent, &mut correlated);

            let mut cost = 0.0;
            let mut schedule = 0.0;
            for (idx, risk) in ordered.iter().enumerate() {
                let unit = samplers[idx].sample(correlated[idx]).map_err(|NonFiniteSample(value)| {
                    SimError::NumericalInstability {
                        origin: risk.id.clone(),
                        iteration,
                        value,
                    }
                })?;
                let contribution = finite(unit * risk.baseline_impact, &risk.id, iteration)?;
                match risk.impact_type {
                    ImpactType::Cost     => cost += contribution,
                    ImpactType::Schedule => schedule += contribution,
                }
                acc.contributions[idx].push(contribution);
            }

            acc.cost.push(finite(cost, "cost total", iteration)?);
            acc.schedule.push(finite(schedule, "schedule total", iteration)?);
        }

        Ok(acc)
    }
}

/// Per-run accumulation buffers, dropped on abort.
struct Accumulated {
    cost: Vec<f64>,
    schedule: Vec<f64>,
    contributions: Vec<Vec<f64>>,
}

impl Accumulated {
    fn with_capacity(risks: usize, iterations: usize) -> Self {
        Self {
            cost: Vec::with_capacity(iterations),
            schedule: Vec::with_capacity(iterations),
            contributions: (0..risks).map(|_| Vec::with_capacity(iterations)).collect(),
        }
    }
}

fn finite(value: f64, origin: &str, iteration: usize) -> SimResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::NumericalInstability {
            origin: origin.to_string(),
            iteration,
            value,
        })
    }
}
