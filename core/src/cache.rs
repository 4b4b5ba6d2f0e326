//! Result cache.
//!
//! RULE: The cache is the only shared mutable state in the engine. It is
//! constructed once and injected; there is no process-wide instance.
//!
//! Entries are keyed by fingerprint. Two secondary indexes are kept in
//! step with the forward map: simulation id → fingerprint (the visible
//! handle) and risk id → fingerprints (for invalidation on risk edits).
//! All three live under one lock so no reader ever sees them disagree.

use crate::{
    config::EngineConfig,
    error::SimResult,
    results::SimulationResults,
    types::{Fingerprint, RiskId, SimulationId},
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Storage contract for completed results. Implementations must be safe
/// to share across concurrently running simulations.
pub trait ResultCache: Send + Sync {
    /// Look up by visible simulation id.
    fn get(&self, simulation_id: &str) -> SimResult<Option<Arc<SimulationResults>>>;

    fn get_by_fingerprint(&self, fingerprint: &str) -> SimResult<Option<Arc<SimulationResults>>>;

    /// Store a result. If its fingerprint is already stored, the new
    /// simulation id becomes an alias of the stored result.
    fn put(&self, results: Arc<SimulationResults>) -> SimResult<()>;

    /// Remove every entry whose risk set contained `risk_id`.
    /// Returns the number of entries removed.
    fn invalidate_risk(&self, risk_id: &str) -> SimResult<usize>;

    /// Remove one simulation id. Returns whether it existed. A result
    /// stays stored while another id still resolves to it.
    fn evict(&self, simulation_id: &str) -> SimResult<bool>;

    fn len(&self) -> SimResult<usize>;
}

/// One stored result and every simulation id that resolves to it.
struct CacheEntry {
    results: Arc<SimulationResults>,
    /// First id is the one recorded on `results`; later ids are reruns
    /// of the same request.
    ids: Vec<SimulationId>,
}

#[derive(Default)]
struct CacheIndex {
    entries: HashMap<Fingerprint, CacheEntry>,
    by_id: HashMap<SimulationId, Fingerprint>,
    by_risk: HashMap<RiskId, HashSet<Fingerprint>>,
    /// Oldest first; drives capacity eviction.
    insertion_order: VecDeque<Fingerprint>,
    /// Sum of `outcome_value_count()` over stored results.
    stored_values: usize,
}

impl CacheIndex {
    fn insert(&mut self, results: Arc<SimulationResults>) {
        let fingerprint = results.fingerprint.clone();
        let simulation_id = results.simulation_id.clone();

        if let Some(entry) = self.entries.get_mut(&fingerprint) {
            // Same inputs, same outcomes: the new id aliases the stored result.
            if !entry.ids.contains(&simulation_id) {
                entry.ids.push(simulation_id.clone());
            }
            self.by_id.insert(simulation_id, fingerprint);
            return;
        }

        for risk_id in results.risk_ids() {
            self.by_risk
                .entry(risk_id.clone())
                .or_default()
                .insert(fingerprint.clone());
        }
        self.by_id.insert(simulation_id.clone(), fingerprint.clone());
        self.insertion_order.push_back(fingerprint.clone());
        self.stored_values += results.outcome_value_count();
        self.entries.insert(
            fingerprint,
            CacheEntry {
                results,
                ids: vec![simulation_id],
            },
        );
    }

    /// Drop an entry together with every id aliasing it.
    fn remove(&mut self, fingerprint: &str) -> Option<Arc<SimulationResults>> {
        let entry = self.entries.remove(fingerprint)?;
        for id in &entry.ids {
            self.by_id.remove(id);
        }
        for risk_id in entry.results.risk_ids() {
            if let Some(set) = self.by_risk.get_mut(risk_id) {
                set.remove(fingerprint);
                if set.is_empty() {
                    self.by_risk.remove(risk_id);
                }
            }
        }
        self.insertion_order.retain(|f| f != fingerprint);
        self.stored_values -= entry.results.outcome_value_count();
        Some(entry.results)
    }

    /// Evict oldest entries until both bounds hold. The newest entry is
    /// kept even if it alone exceeds `max_values`.
    fn shrink_to(&mut self, capacity: usize, max_values: usize) {
        while self.entries.len() > capacity
            || (self.stored_values > max_values && self.entries.len() > 1)
        {
            let Some(oldest) = self.insertion_order.front().cloned() else {
                break;
            };
            log::debug!(
                "cache: evicting {oldest} ({} entries, {} values)",
                self.entries.len(),
                self.stored_values
            );
            self.remove(&oldest);
        }
    }
}

/// In-process cache guarded by a single `RwLock`.
pub struct MemoryResultCache {
    capacity: usize,
    max_values: usize,
    index: RwLock<CacheIndex>,
}

impl MemoryResultCache {
    /// Cache bounded by entry count only.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_values: usize::MAX,
            index: RwLock::new(CacheIndex::default()),
        }
    }

    /// Cache bounded by both `cache_capacity` and `cache_max_values`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_capacity).with_max_values(config.cache_max_values)
    }

    /// Also bound the total number of stored f64 outcome values.
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Number of risk ids currently present in the reverse index.
    pub fn indexed_risk_count(&self) -> usize {
        self.index.read().by_risk.len()
    }

    /// Total outcome values held, across cost, schedule and contributions.
    pub fn stored_values(&self) -> usize {
        self.index.read().stored_values
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&self, simulation_id: &str) -> SimResult<Option<Arc<SimulationResults>>> {
        let index = self.index.read();
        Ok(index
            .by_id
            .get(simulation_id)
            .and_then(|fp| index.entries.get(fp))
            .map(|entry| Arc::clone(&entry.results)))
    }

    fn get_by_fingerprint(&self, fingerprint: &str) -> SimResult<Option<Arc<SimulationResults>>> {
        Ok(self
            .index
            .read()
            .entries
            .get(fingerprint)
            .map(|entry| Arc::clone(&entry.results)))
    }

    fn put(&self, results: Arc<SimulationResults>) -> SimResult<()> {
        let mut index = self.index.write();
        index.insert(results);
        index.shrink_to(self.capacity, self.max_values);
        Ok(())
    }

    fn invalidate_risk(&self, risk_id: &str) -> SimResult<usize> {
        let mut index = self.index.write();
        let Some(fingerprints) = index.by_risk.remove(risk_id) else {
            return Ok(0);
        };
        let removed = fingerprints
            .iter()
            .filter(|fp| index.remove(fp).is_some())
            .count();
        Ok(removed)
    }

    /// Drops one handle. The stored result goes once no handle is left.
    fn evict(&self, simulation_id: &str) -> SimResult<bool> {
        let mut index = self.index.write();
        let Some(fingerprint) = index.by_id.remove(simulation_id) else {
            return Ok(false);
        };
        let orphaned = match index.entries.get_mut(&fingerprint) {
            Some(entry) => {
                entry.ids.retain(|id| id != simulation_id);
                entry.ids.is_empty()
            }
            None => false,
        };
        if orphaned {
            index.remove(&fingerprint);
        }
        Ok(true)
    }

    fn len(&self) -> SimResult<usize> {
        Ok(self.index.read().entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{results::SimulationMetadata, stats::OutcomeSummary};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn results(id: &str, fingerprint: &str, risks: &[&str]) -> Arc<SimulationResults> {
        let summary = OutcomeSummary::from_outcomes(&[0.0]);
        Arc::new(SimulationResults {
            simulation_id: id.into(),
            fingerprint: fingerprint.into(),
            iterations: 1,
            seed: 0,
            cost_outcomes: vec![0.0],
            schedule_outcomes: vec![0.0],
            risk_contributions: risks
                .iter()
                .map(|r| (r.to_string(), vec![0.0]))
                .collect::<BTreeMap<_, _>>(),
            cost_summary: summary,
            schedule_summary: summary,
            execution_time: Duration::ZERO,
            created_at: Utc::now(),
            metadata: SimulationMetadata::default(),
        })
    }

    #[test]
    fn invalidation_follows_the_reverse_index() {
        let cache = MemoryResultCache::new(10);
        cache.put(results("s1", "f1", &["a", "b"])).unwrap();
        cache.put(results("s2", "f2", &["b", "c"])).unwrap();
        cache.put(results("s3", "f3", &["c"])).unwrap();

        assert_eq!(cache.invalidate_risk("b").unwrap(), 2);
        assert!(cache.get("s1").unwrap().is_none());
        assert!(cache.get("s2").unwrap().is_none());
        assert!(cache.get("s3").unwrap().is_some());
        // "a" only appeared in s1; its reverse entry must be gone too.
        assert_eq!(cache.indexed_risk_count(), 1);
        assert_eq!(cache.invalidate_risk("a").unwrap(), 0);
    }

    #[test]
    fn same_fingerprint_keeps_every_handle() {
        let cache = MemoryResultCache::new(10);
        cache.put(results("first", "f", &["a"])).unwrap();
        cache.put(results("rerun", "f", &["a"])).unwrap();
        assert_eq!(cache.len().unwrap(), 1);

        let first = cache.get("first").unwrap().expect("first handle");
        let rerun = cache.get("rerun").unwrap().expect("rerun handle");
        assert!(Arc::ptr_eq(&first, &rerun));
        assert_eq!(first.simulation_id, "first");
    }

    #[test]
    fn invalidation_drops_every_alias() {
        let cache = MemoryResultCache::new(10);
        cache.put(results("first", "f", &["a"])).unwrap();
        cache.put(results("rerun", "f", &["a"])).unwrap();
        assert_eq!(cache.invalidate_risk("a").unwrap(), 1);
        assert!(cache.get("first").unwrap().is_none());
        assert!(cache.get("rerun").unwrap().is_none());
    }

    #[test]
    fn evicting_one_alias_keeps_the_result() {
        let cache = MemoryResultCache::new(10);
        cache.put(results("first", "f", &["a"])).unwrap();
        cache.put(results("rerun", "f", &["a"])).unwrap();

        assert!(cache.evict("first").unwrap());
        assert!(cache.get("first").unwrap().is_none());
        assert!(cache.get("rerun").unwrap().is_some());
        assert_eq!(cache.len().unwrap(), 1);

        assert!(cache.evict("rerun").unwrap());
        assert_eq!(cache.len().unwrap(), 0);
        assert_eq!(cache.indexed_risk_count(), 0);
        assert_eq!(cache.stored_values(), 0);
    }

    #[test]
    fn value_budget_evicts_oldest_first() {
        // Each fixture holds 2 + n_risks values.
        let cache = MemoryResultCache::new(10).with_max_values(8);
        cache.put(results("s1", "f1", &["a", "b"])).unwrap();
        cache.put(results("s2", "f2", &["c", "d"])).unwrap();
        assert_eq!(cache.stored_values(), 8);

        cache.put(results("s3", "f3", &["e"])).unwrap();
        assert!(cache.get("s1").unwrap().is_none());
        assert!(cache.get("s2").unwrap().is_some());
        assert_eq!(cache.stored_values(), 7);
    }

    #[test]
    fn oversized_newest_entry_is_kept() {
        let cache = MemoryResultCache::new(10).with_max_values(2);
        cache.put(results("s1", "f1", &["a"])).unwrap();
        cache.put(results("s2", "f2", &["b", "c"])).unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert!(cache.get("s2").unwrap().is_some());
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = MemoryResultCache::new(2);
        cache.put(results("s1", "f1", &["a"])).unwrap();
        cache.put(results("s2", "f2", &["b"])).unwrap();
        cache.put(results("s3", "f3", &["c"])).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.get("s1").unwrap().is_none());
        assert_eq!(cache.indexed_risk_count(), 2);
    }

    #[test]
    fn evict_removes_all_index_entries() {
        let cache = MemoryResultCache::new(10);
        cache.put(results("s1", "f1", &["a", "b"])).unwrap();
        assert!(cache.evict("s1").unwrap());
        assert!(!cache.evict("s1").unwrap());
        assert!(cache.get_by_fingerprint("f1").unwrap().is_none());
        assert_eq!(cache.indexed_risk_count(), 0);
    }
}
