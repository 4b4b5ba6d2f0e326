//! Engine configuration.
//!
//! Loaded from a JSON file by the runner; `EngineConfig::default()` is
//! the reference operating envelope and what tests use.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest accepted iteration count.
    pub min_iterations: usize,
    /// Largest accepted iteration count.
    pub max_iterations: usize,
    /// Runs slower than this complete with a performance warning.
    pub soft_budget_ms: u64,
    /// Runs still going after this are aborted as timeouts.
    pub hard_ceiling_ms: u64,
    /// In-memory result cache size; oldest entries are evicted first.
    pub cache_capacity: usize,
    /// Upper bound on f64 values held by the in-memory cache. A result
    /// holds `iterations × (2 + risks)` values, so 256 entries of 100 000
    /// iterations over 10 risks would otherwise pin ~2.5 GB.
    pub cache_max_values: usize,
    /// Eigenvalue floor used when repairing a non-PSD correlation matrix.
    pub eigenvalue_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_iterations:   1_000,
            max_iterations:   100_000,
            soft_budget_ms:   30_000,
            hard_ceiling_ms:  300_000,
            cache_capacity:   256,
            cache_max_values: 32_000_000,
            eigenvalue_floor: 1e-6,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.check()?;
        Ok(config)
    }

    pub fn soft_budget(&self) -> Duration {
        Duration::from_millis(self.soft_budget_ms)
    }

    pub fn hard_ceiling(&self) -> Duration {
        Duration::from_millis(self.hard_ceiling_ms)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.min_iterations == 0 || self.min_iterations > self.max_iterations {
            anyhow::bail!(
                "iteration range is empty: min={} max={}",
                self.min_iterations,
                self.max_iterations
            );
        }
        if self.soft_budget_ms > self.hard_ceiling_ms {
            anyhow::bail!(
                "soft budget ({} ms) exceeds hard ceiling ({} ms)",
                self.soft_budget_ms,
                self.hard_ceiling_ms
            );
        }
        if !(self.eigenvalue_floor.is_finite() && self.eigenvalue_floor > 0.0) {
            anyhow::bail!("eigenvalue_floor must be positive, got {}", self.eigenvalue_floor);
        }
        Ok(())
    }
}
