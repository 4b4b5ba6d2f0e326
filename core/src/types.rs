//! Shared primitive types used across the entire engine.

/// Identifier of a risk, unique within one simulation request.
pub type RiskId = String;

/// Visible handle of a completed simulation run.
pub type SimulationId = String;

/// Canonical hash of a simulation request's inputs (hex encoded).
pub type Fingerprint = String;
