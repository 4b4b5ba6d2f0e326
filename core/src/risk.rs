//! Risk register records as consumed by the engine.
//!
//! RULE: The engine never mutates a Risk. Callers own the register and
//! report edits through `RiskSimulator::invalidate_cache_for_risk`.

use crate::{distribution::ProbabilityDistribution, types::RiskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: RiskId,
    pub name: String,
    pub category: RiskCategory,
    pub impact_type: ImpactType,
    pub distribution: ProbabilityDistribution,
    /// Scale factor applied to the unit sample (currency or days).
    pub baseline_impact: f64,
    #[serde(default)]
    pub correlations: Vec<CorrelationDependency>,
    /// Carried through untouched; the engine does not interpret it.
    #[serde(default)]
    pub mitigation: Option<Mitigation>,
}

impl Risk {
    /// Build a risk with its name defaulted to the id and the category
    /// taken from the impact type.
    pub fn new(
        id: impl Into<RiskId>,
        impact_type: ImpactType,
        distribution: ProbabilityDistribution,
        baseline_impact: f64,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: impact_type.into(),
            impact_type,
            distribution,
            baseline_impact,
            correlations: Vec::new(),
            mitigation: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: RiskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_correlation(mut self, risk_id: impl Into<RiskId>, coefficient: f64) -> Self {
        self.correlations.push(CorrelationDependency {
            risk_id: risk_id.into(),
            coefficient,
        });
        self
    }

    pub fn with_mitigation(mut self, mitigation: Mitigation) -> Self {
        self.mitigation = Some(mitigation);
        self
    }
}

/// Classification only. Routing is decided by `ImpactType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Cost,
    Schedule,
    Mixed,
}

impl From<ImpactType> for RiskCategory {
    fn from(impact: ImpactType) -> Self {
        match impact {
            ImpactType::Cost     => RiskCategory::Cost,
            ImpactType::Schedule => RiskCategory::Schedule,
        }
    }
}

/// Which per-iteration aggregate a risk feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactType {
    Cost,
    Schedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationDependency {
    pub risk_id: RiskId,
    /// Pearson coefficient in [-1, 1], induced in normal space.
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mitigation {
    pub strategy: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
}
