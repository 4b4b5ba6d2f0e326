//! Monte Carlo contingency engine for capital-project risk registers.
//!
//! Risks carry a probability distribution, a baseline impact and
//! optional pairwise correlations. A run turns them into per-iteration
//! cost and schedule totals summarised as P10/P50/P90.
//!
//! Entry point for callers is [`simulator::RiskSimulator`].

pub mod cache;
pub mod config;
pub mod correlation;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod results;
pub mod risk;
pub mod rng;
pub mod simulator;
pub mod stats;
pub mod store;
pub mod types;
pub mod validation;

pub use error::{SimError, SimResult};
