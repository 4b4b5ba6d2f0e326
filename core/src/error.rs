use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid simulation request: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid {family} distribution: {reason}")]
    InvalidDistribution { family: &'static str, reason: String },

    /// `origin` is the risk id, or the aggregate that overflowed.
    #[error("Numerical instability: '{origin}' produced {value} at iteration {iteration}")]
    NumericalInstability {
        origin: String,
        iteration: usize,
        value: f64,
    },

    #[error("Correlation matrix of size {size} could not be factored after repair")]
    CorrelationFactorization { size: usize },

    #[error(
        "Simulation timed out after {elapsed:?} ({completed_iterations}/{iterations} iterations)"
    )]
    Timeout {
        elapsed: Duration,
        completed_iterations: usize,
        iterations: usize,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
