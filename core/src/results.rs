//! Completed simulation results.
//!
//! A result is created once at the end of a run and never mutated.
//! The cache shares it behind an `Arc`.

use crate::{
    correlation::PsdCorrection,
    risk::ImpactType,
    stats::{self, OutcomeSummary},
    types::{Fingerprint, RiskId, SimulationId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub simulation_id: SimulationId,
    pub fingerprint: Fingerprint,
    pub iterations: usize,
    /// Always recorded, including auto-generated seeds.
    pub seed: u64,
    /// Per-iteration cost totals, in iteration order.
    pub cost_outcomes: Vec<f64>,
    /// Per-iteration schedule totals, in iteration order.
    pub schedule_outcomes: Vec<f64>,
    /// Per-iteration signed contribution of each risk.
    pub risk_contributions: BTreeMap<RiskId, Vec<f64>>,
    pub cost_summary: OutcomeSummary,
    pub schedule_summary: OutcomeSummary,
    pub execution_time: Duration,
    pub created_at: DateTime<Utc>,
    pub metadata: SimulationMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetadata {
    /// Set when the correlation matrix had to be projected to PSD.
    pub correlation_correction: Option<PsdCorrection>,
    /// The run finished but took longer than the soft budget.
    pub performance_warning: bool,
    /// The caller did not supply a seed.
    pub seed_generated: bool,
}

impl SimulationResults {
    pub fn outcomes(&self, impact: ImpactType) -> &[f64] {
        match impact {
            ImpactType::Cost     => &self.cost_outcomes,
            ImpactType::Schedule => &self.schedule_outcomes,
        }
    }

    pub fn summary(&self, impact: ImpactType) -> &OutcomeSummary {
        match impact {
            ImpactType::Cost     => &self.cost_summary,
            ImpactType::Schedule => &self.schedule_summary,
        }
    }

    /// Caller-requested percentiles (0–100) using the engine's fixed
    /// interpolation rule.
    pub fn percentiles(&self, impact: ImpactType, ps: &[f64]) -> Vec<f64> {
        stats::percentiles(self.outcomes(impact), ps)
    }

    /// Measured Pearson correlation between two risks' contributions.
    /// None if either id was not part of the run.
    pub fn contribution_correlation(&self, a: &str, b: &str) -> Option<f64> {
        let xs = self.risk_contributions.get(a)?;
        let ys = self.risk_contributions.get(b)?;
        Some(stats::pearson_correlation(xs, ys))
    }

    /// Number of f64 outcome values held: cost, schedule and every
    /// contribution sequence.
    pub fn outcome_value_count(&self) -> usize {
        self.cost_outcomes.len()
            + self.schedule_outcomes.len()
            + self.risk_contributions.values().map(Vec::len).sum::<usize>()
    }

    pub fn risk_ids(&self) -> impl Iterator<Item = &RiskId> {
        self.risk_contributions.keys()
    }

    pub fn correlation_corrected(&self) -> bool {
        self.metadata.correlation_correction.is_some()
    }
}
