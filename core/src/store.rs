//! SQLite-backed result cache.
//!
//! RULE: Only store.rs talks to the database.
//! Results are stored as JSON payloads, one per fingerprint. The
//! `simulation_alias` table maps every simulation id to its payload and
//! `result_risk_index` is the reverse index used for invalidation.
//! Payload, alias and index rows are written and deleted in one
//! transaction.

use crate::{
    cache::ResultCache,
    error::SimResult,
    results::SimulationResults,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

pub struct SqliteResultCache {
    conn: Mutex<Connection>,
}

impl SqliteResultCache {
    /// Open (or create) the cache database at `path` and migrate it.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .lock()
            .execute_batch(include_str!("../../migrations/001_result_cache.sql"))?;
        Ok(())
    }

    fn load_payload(&self, sql: &str, key: &str) -> SimResult<Option<Arc<SimulationResults>>> {
        let payload: Option<String> = self
            .conn
            .lock()
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;
        match payload {
            Some(json) => Ok(Some(Arc::new(serde_json::from_str(&json)?))),
            None => Ok(None),
        }
    }
}

impl ResultCache for SqliteResultCache {
    fn get(&self, simulation_id: &str) -> SimResult<Option<Arc<SimulationResults>>> {
        self.load_payload(
            "SELECT r.payload FROM simulation_alias a
                 JOIN simulation_result r ON r.fingerprint = a.fingerprint
             WHERE a.simulation_id = ?1",
            simulation_id,
        )
    }

    fn get_by_fingerprint(&self, fingerprint: &str) -> SimResult<Option<Arc<SimulationResults>>> {
        self.load_payload(
            "SELECT payload FROM simulation_result WHERE fingerprint = ?1",
            fingerprint,
        )
    }

    fn put(&self, results: Arc<SimulationResults>) -> SimResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let stored: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM simulation_result WHERE fingerprint = ?1)",
            params![results.fingerprint],
            |row| row.get(0),
        )?;

        if !stored {
            let payload = serde_json::to_string(results.as_ref())?;
            tx.execute(
                "INSERT INTO simulation_result
                     (fingerprint, simulation_id, iterations, seed, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    results.fingerprint,
                    results.simulation_id,
                    results.iterations as i64,
                    results.seed as i64,
                    payload,
                    results.created_at.to_rfc3339(),
                ],
            )?;
            for risk_id in results.risk_ids() {
                tx.execute(
                    "INSERT OR IGNORE INTO result_risk_index (risk_id, fingerprint)
                     VALUES (?1, ?2)",
                    params![risk_id, results.fingerprint],
                )?;
            }
        }

        // A rerun of a stored request only adds its id.
        tx.execute(
            "INSERT OR IGNORE INTO simulation_alias (simulation_id, fingerprint) VALUES (?1, ?2)",
            params![results.simulation_id, results.fingerprint],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn invalidate_risk(&self, risk_id: &str) -> SimResult<usize> {
        // Index and alias rows go with their result via ON DELETE CASCADE.
        let removed = self.conn.lock().execute(
            "DELETE FROM simulation_result WHERE fingerprint IN
                 (SELECT fingerprint FROM result_risk_index WHERE risk_id = ?1)",
            params![risk_id],
        )?;
        Ok(removed)
    }

    fn evict(&self, simulation_id: &str) -> SimResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let fingerprint: Option<String> = tx
            .query_row(
                "SELECT fingerprint FROM simulation_alias WHERE simulation_id = ?1",
                params![simulation_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(fingerprint) = fingerprint else {
            return Ok(false);
        };

        tx.execute(
            "DELETE FROM simulation_alias WHERE simulation_id = ?1",
            params![simulation_id],
        )?;
        tx.execute(
            "DELETE FROM simulation_result WHERE fingerprint = ?1
                 AND NOT EXISTS (SELECT 1 FROM simulation_alias WHERE fingerprint = ?1)",
            params![fingerprint],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn len(&self) -> SimResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM simulation_result", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
