//! Distribution sampler: maps standard-normal draws onto each risk's
//! marginal distribution.
//!
//! RULE: Samplers are pure. The same z always yields the same sample.
//! Correlation is induced upstream in normal space; uniform-driven
//! families recover their uniform input as u = Φ(z).
//!
//! Every sample is checked for finiteness before it leaves this module.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Discriminated variant over the supported distribution families.
/// Samples are unit values; the risk's baseline impact scales them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbabilityDistribution {
    Normal { mean: f64, std: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    Uniform { min: f64, max: f64 },
    Beta { alpha: f64, beta: f64 },
    #[serde(rename = "LOGNORMAL")]
    LogNormal { mu: f64, sigma: f64 },
}

impl ProbabilityDistribution {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Normal { .. }     => "NORMAL",
            Self::Triangular { .. } => "TRIANGULAR",
            Self::Uniform { .. }    => "UNIFORM",
            Self::Beta { .. }       => "BETA",
            Self::LogNormal { .. }  => "LOGNORMAL",
        }
    }

    /// Every ordering/positivity constraint the parameters violate.
    /// Empty means the distribution is sampleable.
    pub fn parameter_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match *self {
            Self::Normal { mean, std } => {
                let ok =
                    check_finite(&mut errors, "mean", mean) & check_finite(&mut errors, "std", std);
                if ok && std <= 0.0 {
                    errors.push(format!("std must be > 0, got {std}"));
                }
            }
            Self::Triangular { min, mode, max } => {
                let ok = check_finite(&mut errors, "min", min)
                    & check_finite(&mut errors, "mode", mode)
                    & check_finite(&mut errors, "max", max);
                if ok {
                    if min >= max {
                        errors.push(format!("min must be < max, got min={min} max={max}"));
                    }
                    if mode < min || mode > max {
                        errors.push(format!("mode must lie in [min, max], got {mode}"));
                    }
                }
            }
            Self::Uniform { min, max } => {
                let ok =
                    check_finite(&mut errors, "min", min) & check_finite(&mut errors, "max", max);
                if ok && min >= max {
                    errors.push(format!("min must be < max, got min={min} max={max}"));
                }
            }
            Self::Beta { alpha, beta } => {
                let ok = check_finite(&mut errors, "alpha", alpha)
                    & check_finite(&mut errors, "beta", beta);
                if ok && alpha <= 0.0 {
                    errors.push(format!("alpha must be > 0, got {alpha}"));
                }
                if ok && beta <= 0.0 {
                    errors.push(format!("beta must be > 0, got {beta}"));
                }
            }
            Self::LogNormal { mu, sigma } => {
                let ok =
                    check_finite(&mut errors, "mu", mu) & check_finite(&mut errors, "sigma", sigma);
                if ok && sigma <= 0.0 {
                    errors.push(format!("sigma must be > 0, got {sigma}"));
                }
            }
        }
        errors
    }
}

fn check_finite(errors: &mut Vec<String>, name: &str, value: f64) -> bool {
    if value.is_finite() {
        true
    } else {
        errors.push(format!("{name} must be finite, got {value}"));
        false
    }
}

// ── Pure per-family transforms ──────────────────────────────────

/// Standard normal CDF, Φ(z).
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

pub fn sample_normal(mean: f64, std: f64, z: f64) -> f64 {
    mean + std * z
}

/// Inverse-CDF transform, split at F(mode) = (mode - min) / (max - min).
pub fn sample_triangular(min: f64, mode: f64, max: f64, u: f64) -> f64 {
    let range = max - min;
    let split = (mode - min) / range;
    if u < split {
        min + (u * range * (mode - min)).sqrt()
    } else {
        max - ((1.0 - u) * range * (max - mode)).sqrt()
    }
}

pub fn sample_uniform(min: f64, max: f64, u: f64) -> f64 {
    min + (max - min) * u
}

pub fn sample_lognormal(mu: f64, sigma: f64, z: f64) -> f64 {
    sample_normal(mu, sigma, z).exp()
}

/// Inverse-CDF of a prepared Beta, held to [0, 1] exactly.
pub fn sample_beta(beta: &Beta, u: f64) -> f64 {
    beta.inverse_cdf(u.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

// ── Prepared sampler ─────────────────────────────────────────────

/// A sample came out NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonFiniteSample(pub f64);

/// A distribution with any expensive state (the Beta CDF) built once
/// per run rather than once per draw.
#[derive(Debug, Clone)]
pub struct MarginalSampler {
    distribution: ProbabilityDistribution,
    beta: Option<Beta>,
}

impl MarginalSampler {
    pub fn new(distribution: &ProbabilityDistribution) -> SimResult<Self> {
        let family = distribution.family();
        if let Some(reason) = distribution.parameter_errors().into_iter().next() {
            return Err(SimError::InvalidDistribution { family, reason });
        }

        let beta = match *distribution {
            ProbabilityDistribution::Beta { alpha, beta } => Some(
                Beta::new(alpha, beta).map_err(|e| SimError::InvalidDistribution {
                    family,
                    reason: e.to_string(),
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            distribution: distribution.clone(),
            beta,
        })
    }

    /// Map one standard-normal component onto this marginal.
    pub fn sample(&self, z: f64) -> Result<f64, NonFiniteSample> {
        let value = match self.distribution {
            ProbabilityDistribution::Normal { mean, std } => sample_normal(mean, std, z),
            ProbabilityDistribution::Triangular { min, mode, max } => {
                sample_triangular(min, mode, max, standard_normal_cdf(z))
            }
            ProbabilityDistribution::Uniform { min, max } => {
                sample_uniform(min, max, standard_normal_cdf(z))
            }
            ProbabilityDistribution::Beta { .. } => match &self.beta {
                Some(beta) => sample_beta(beta, standard_normal_cdf(z)),
                None => f64::NAN,
            },
            ProbabilityDistribution::LogNormal { mu, sigma } => sample_lognormal(mu, sigma, z),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(NonFiniteSample(value))
        }
    }
}
