//! Caller-facing facade over the engine and the result cache.
//!
//! RULES:
//!   - The cache is injected at construction and shared by reference.
//!   - Cache failures are logged and treated as misses. They never fail
//!     a simulation request.
//!   - Independent requests may run concurrently; each run owns its RNG
//!     and buffers, and only the cache is shared.

use crate::{
    cache::{MemoryResultCache, ResultCache},
    config::EngineConfig,
    engine::{MonteCarloEngine, SimulationRequest},
    error::SimResult,
    fingerprint::fingerprint,
    results::SimulationResults,
    risk::Risk,
    validation::{validate_simulation_parameters, ValidationResult},
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct RiskSimulator {
    engine: MonteCarloEngine,
    cache: Arc<dyn ResultCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RiskSimulator {
    pub fn new(config: EngineConfig, cache: Arc<dyn ResultCache>) -> Self {
        Self {
            engine: MonteCarloEngine::new(config),
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Simulator with an in-memory cache sized from the config.
    pub fn in_memory(config: EngineConfig) -> Self {
        let cache = Arc::new(MemoryResultCache::from_config(&config));
        Self::new(config, cache)
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    pub fn validate_simulation_parameters(
        &self,
        risks: &[Risk],
        iterations: usize,
    ) -> ValidationResult {
        validate_simulation_parameters(risks, iterations, self.config())
    }

    /// Run a fresh simulation and cache the result.
    pub fn run_simulation(
        &self,
        risks: &[Risk],
        iterations: usize,
        seed: Option<u64>,
    ) -> SimResult<Arc<SimulationResults>> {
        let results = Arc::new(self.engine.run(risks, iterations, seed)?);
        if let Err(e) = self.cache.put(Arc::clone(&results)) {
            log::warn!("cache: failed to store {}: {e}", results.simulation_id);
        }
        Ok(results)
    }

    /// Return the previous run's result if `(risks, iterations, seed)`
    /// is unchanged; otherwise run fresh under a new simulation id.
    ///
    /// An unseeded request against a known previous run reuses that
    /// run's recorded seed, so only risks and iterations are compared.
    pub fn run_simulation_with_caching(
        &self,
        risks: &[Risk],
        iterations: usize,
        seed: Option<u64>,
        previous_simulation_id: Option<&str>,
    ) -> SimResult<Arc<SimulationResults>> {
        let previous = previous_simulation_id.and_then(|id| self.lookup(id));
        let seed = seed.or_else(|| previous.as_ref().map(|p| p.seed));

        if let (Some(previous), Some(seed)) = (previous, seed) {
            match fingerprint(risks, iterations, seed) {
                Ok(fp) if fp == previous.fingerprint => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    log::info!("cache: hit for simulation {}", previous.simulation_id);
                    return Ok(previous);
                }
                Ok(_) => log::debug!(
                    "cache: parameters changed since simulation {}",
                    previous.simulation_id
                ),
                Err(e) => log::warn!("cache: fingerprint failed, treating as miss: {e}"),
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.run_simulation(risks, iterations, seed)
    }

    pub fn get_cached_results(&self, simulation_id: &str) -> Option<Arc<SimulationResults>> {
        self.lookup(simulation_id)
    }

    /// Drop every cached result whose risk set contained `risk_id`.
    /// Returns how many were removed.
    pub fn invalidate_cache_for_risk(&self, risk_id: &str) -> usize {
        match self.cache.invalidate_risk(risk_id) {
            Ok(removed) => {
                log::debug!("cache: risk {risk_id} changed, {removed} result(s) invalidated");
                removed
            }
            Err(e) => {
                log::warn!("cache: invalidation for risk {risk_id} failed: {e}");
                0
            }
        }
    }

    pub fn evict(&self, simulation_id: &str) -> bool {
        self.cache.evict(simulation_id).unwrap_or_else(|e| {
            log::warn!("cache: evict {simulation_id} failed: {e}");
            false
        })
    }

    /// Run independent requests across the rayon pool. Results are in
    /// request order.
    pub fn run_many(
        &self,
        requests: &[SimulationRequest],
    ) -> Vec<SimResult<Arc<SimulationResults>>> {
        requests
            .par_iter()
            .map(|r| self.run_simulation(&r.risks, r.iterations, r.seed))
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len().unwrap_or(0),
        }
    }

    fn lookup(&self, simulation_id: &str) -> Option<Arc<SimulationResults>> {
        self.cache.get(simulation_id).unwrap_or_else(|e| {
            log::warn!("cache: read of {simulation_id} failed, treating as miss: {e}");
            None
        })
    }
}
