//! Structural checks on a simulation request.
//!
//! RULE: Validation runs before any sampling and never mutates state.
//! It reports every problem it finds, not just the first.

use crate::{config::EngineConfig, risk::Risk};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted path to the offending input, e.g. `risks[2].distribution`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

pub fn validate_simulation_parameters(
    risks: &[Risk],
    iterations: usize,
    config: &EngineConfig,
) -> ValidationResult {
    let mut errors = Vec::new();

    if risks.is_empty() {
        errors.push(ValidationError::new("risks", "at least one risk is required"));
    }

    if iterations < config.min_iterations || iterations > config.max_iterations {
        errors.push(ValidationError::new(
            "iterations",
            format!(
                "must be between {} and {}, got {iterations}",
                config.min_iterations, config.max_iterations
            ),
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (i, risk) in risks.iter().enumerate() {
        if risk.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("risks[{i}].id"), "must not be empty"));
        } else if !seen.insert(risk.id.as_str()) {
            errors.push(ValidationError::new(
                format!("risks[{i}].id"),
                format!("duplicate risk id '{}'", risk.id),
            ));
        }

        if !risk.baseline_impact.is_finite() || risk.baseline_impact <= 0.0 {
            errors.push(ValidationError::new(
                format!("risks[{i}].baseline_impact"),
                format!("must be a positive finite number, got {}", risk.baseline_impact),
            ));
        }

        for reason in risk.distribution.parameter_errors() {
            errors.push(ValidationError::new(
                format!("risks[{i}].distribution"),
                format!("{}: {reason}", risk.distribution.family()),
            ));
        }
    }

    // Second pass: every id is known now.
    let known: HashSet<&str> = risks.iter().map(|r| r.id.as_str()).collect();
    for (i, risk) in risks.iter().enumerate() {
        for (k, dep) in risk.correlations.iter().enumerate() {
            let field = format!("risks[{i}].correlations[{k}]");
            if dep.risk_id == risk.id {
                errors.push(ValidationError::new(&field, "a risk cannot correlate with itself"));
            } else if !known.contains(dep.risk_id.as_str()) {
                errors.push(ValidationError::new(
                    &field,
                    format!("references unknown risk '{}'", dep.risk_id),
                ));
            }
            if !(-1.0..=1.0).contains(&dep.coefficient) {
                errors.push(ValidationError::new(
                    &field,
                    format!("coefficient must be within [-1, 1], got {}", dep.coefficient),
                ));
            }
        }
    }

    ValidationResult::from_errors(errors)
}
