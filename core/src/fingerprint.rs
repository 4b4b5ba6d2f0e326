//! Canonical fingerprint of a simulation request.
//!
//! The risk set is serialized with risks sorted by id and each
//! dependency list sorted by target id, so two requests that differ only
//! in ordering share a fingerprint. Any change to a risk's contents,
//! the iteration count, or the seed changes it.

use crate::{
    distribution::ProbabilityDistribution,
    error::SimResult,
    risk::{CorrelationDependency, ImpactType, Mitigation, Risk, RiskCategory},
    types::Fingerprint,
};
use serde::Serialize;

#[derive(Serialize)]
struct CanonicalRequest<'a> {
    version: u32,
    iterations: usize,
    seed: u64,
    risks: Vec<CanonicalRisk<'a>>,
}

#[derive(Serialize)]
struct CanonicalRisk<'a> {
    id: &'a str,
    name: &'a str,
    category: RiskCategory,
    impact_type: ImpactType,
    distribution: &'a ProbabilityDistribution,
    baseline_impact: f64,
    correlations: Vec<&'a CorrelationDependency>,
    mitigation: Option<&'a Mitigation>,
}

/// Bump when the engine's sampling behavior changes, so stale
/// persisted results stop matching.
const FINGERPRINT_VERSION: u32 = 1;

pub fn fingerprint(risks: &[Risk], iterations: usize, seed: u64) -> SimResult<Fingerprint> {
    let mut sorted: Vec<&Risk> = risks.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let risks = sorted
        .into_iter()
        .map(|risk| {
            let mut correlations: Vec<&CorrelationDependency> = risk.correlations.iter().collect();
            correlations.sort_by(|a, b| {
                a.risk_id
                    .cmp(&b.risk_id)
                    .then(a.coefficient.total_cmp(&b.coefficient))
            });
            CanonicalRisk {
                id: &risk.id,
                name: &risk.name,
                category: risk.category,
                impact_type: risk.impact_type,
                distribution: &risk.distribution,
                baseline_impact: risk.baseline_impact,
                correlations,
                mitigation: risk.mitigation.as_ref(),
            }
        })
        .collect();

    let canonical = CanonicalRequest {
        version: FINGERPRINT_VERSION,
        iterations,
        seed,
        risks,
    };
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
