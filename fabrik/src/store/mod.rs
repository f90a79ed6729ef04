//! The trace store: versioned run archive, SQLite-backed.
//!
//! `rusqlite` with the `bundled` feature, one `Connection::open` per
//! operation via `spawn_blocking` rather than a shared pooled connection.

mod error;

pub use error::StoreError;

use std::path::{Path, PathBuf};

use fabrik_types::{RunMeta, RunResult, StoredRun};
use rusqlite::params;

/// SQLite-backed run archive. `runs` holds one row per [`StoredRun`];
/// `results` holds one row per [`RunResult`] within it.
pub struct TraceStore {
    db_path: PathBuf,
}

impl TraceStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                meta_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL REFERENCES runs(id),
                scenario TEXT NOT NULL,
                passed INTEGER NOT NULL,
                score REAL NOT NULL,
                data_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_run_id ON results(run_id);
            CREATE INDEX IF NOT EXISTS idx_results_scenario ON results(scenario);
            CREATE INDEX IF NOT EXISTS idx_runs_version ON runs(version);
            "#,
        )?;
        Ok(Self { db_path })
    }

    /// Persists a full run transactionally: a partial write (a crash or
    /// error mid-insert) never leaves a run with some but not all of its
    /// results visible.
    pub async fn save_run(&self, run: StoredRun) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut conn = rusqlite::Connection::open(&db_path)?;
            let tx = conn.transaction()?;
            let meta_json = serde_json::to_string(&run.meta)?;
            tx.execute(
                "INSERT INTO runs (id, version, created_at, meta_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    run.meta.id,
                    run.meta.version,
                    run.meta.created_at.to_rfc3339(),
                    meta_json,
                ],
            )?;
            for result in &run.results {
                let data_json = serde_json::to_string(result)?;
                tx.execute(
                    "INSERT INTO results (run_id, scenario, passed, score, data_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        run.meta.id,
                        result.scenario,
                        result.passed as i64,
                        result.score,
                        data_json,
                        run.meta.created_at.to_rfc3339(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?
    }

    /// Loads the most recently created run for `version`, or `None` if no
    /// run of that version has been saved.
    pub async fn load_by_version(&self, version: &str) -> Result<Option<StoredRun>, StoreError> {
        let db_path = self.db_path.clone();
        let version = version.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<StoredRun>, StoreError> {
            let conn = rusqlite::Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT id, meta_json FROM runs WHERE version = ?1 ORDER BY created_at DESC LIMIT 1",
            )?;
            let row = stmt
                .query_row(params![version], |row| {
                    let id: String = row.get(0)?;
                    let meta_json: String = row.get(1)?;
                    Ok((id, meta_json))
                })
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let Some((run_id, meta_json)) = row else {
                return Ok(None);
            };
            let meta: RunMeta = serde_json::from_str(&meta_json)?;

            let mut stmt = conn.prepare(
                "SELECT data_json FROM results WHERE run_id = ?1 ORDER BY id ASC",
            )?;
            let results: Vec<RunResult> = stmt
                .query_map(params![run_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|json| serde_json::from_str::<RunResult>(&json))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some(StoredRun { meta, results }))
        })
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_types::{AssertionResult, AssertionType};
    use std::time::Duration;

    fn result(scenario: &str, passed: bool) -> RunResult {
        RunResult::new(
            scenario,
            vec![],
            vec![AssertionResult {
                assertion_type: AssertionType::Contains,
                passed,
                expected: None,
                actual: None,
                reasoning: None,
                latency_ms: None,
                error: None,
            }],
            vec![],
            Duration::from_millis(10),
            None,
        )
    }

    #[tokio::test]
    async fn save_and_load_round_trips_a_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TraceStore::new(tmp.path().join("trace.db")).unwrap();

        let run = StoredRun::new("run-1", "v1", vec![result("greeting", true), result("refund", false)]);
        store.save_run(run.clone()).await.unwrap();

        let loaded = store.load_by_version("v1").await.unwrap().unwrap();
        assert_eq!(loaded.meta.id, "run-1");
        assert_eq!(loaded.results.len(), 2);
        assert_eq!(loaded.meta.counts.passed, 1);
    }

    #[tokio::test]
    async fn load_by_version_returns_most_recent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TraceStore::new(tmp.path().join("trace.db")).unwrap();

        let first = StoredRun::new("run-1", "v1", vec![result("a", true)]);
        store.save_run(first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = StoredRun::new("run-2", "v1", vec![result("a", false)]);
        store.save_run(second).await.unwrap();

        let loaded = store.load_by_version("v1").await.unwrap().unwrap();
        assert_eq!(loaded.meta.id, "run-2");
    }

    #[tokio::test]
    async fn load_by_version_returns_none_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TraceStore::new(tmp.path().join("trace.db")).unwrap();
        assert!(store.load_by_version("missing").await.unwrap().is_none());
    }
}
