//! SQLite journal implementation
//!
//! This module provides a SQLite-based implementation of the Journal trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Journal, StorageError, StorageResult};
use crate::storage::{HostRecord, PageOutcome, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite journal backend
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Opens or creates the journal database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteJournal)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Journal for SqliteJournal {
    // ===== Run Management =====

    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Page Outcomes =====

    fn record_page(
        &mut self,
        run_id: i64,
        url: &str,
        host: &str,
        outcome: PageOutcome,
        detail: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pages (run_id, url, host, outcome, detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, url, host, outcome.to_db_string(), detail, now],
        )?;
        Ok(())
    }

    fn count_pages_by_outcome(&self, outcome: PageOutcome) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE outcome = ?1",
            params![outcome.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_outcome_summary(&self) -> StorageResult<HashMap<PageOutcome, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT outcome, COUNT(*) FROM pages GROUP BY outcome")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = HashMap::new();
        for row in rows {
            let (outcome, count) = row?;
            if let Some(outcome) = PageOutcome::from_db_string(&outcome) {
                summary.insert(outcome, count as u64);
            }
        }
        Ok(summary)
    }

    fn count_hosts_with_pages(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT host) FROM pages WHERE outcome = ?1",
            params![PageOutcome::Stored.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Host Records =====

    fn record_robots_host(&mut self, host: &str, sitemaps: &[String]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let sitemaps = serde_json::to_string(sitemaps)?;
        self.conn.execute(
            "INSERT INTO hosts (host, sitemaps, recorded_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(host) DO UPDATE SET sitemaps = excluded.sitemaps, recorded_at = excluded.recorded_at",
            params![host, sitemaps, now],
        )?;
        Ok(())
    }

    fn get_robots_hosts(&self) -> StorageResult<Vec<HostRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT host, sitemaps FROM hosts ORDER BY host")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut hosts = Vec::new();
        for row in rows {
            let (host, sitemaps) = row?;
            hosts.push(HostRecord {
                host,
                sitemaps: serde_json::from_str(&sitemaps)?,
            });
        }
        Ok(hosts)
    }
}
