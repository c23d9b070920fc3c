//! Storage traits and error types
//!
//! This module defines the trait interfaces for the page store and the crawl journal,
//! and their shared error type.

use crate::storage::{HostRecord, PageOutcome, RunRecord, RunStatus};
use std::collections::HashMap;
use std::io::ErrorKind;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid page path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Whether the error comes from the target path rather than the store itself
    ///
    /// Over-long names, names colliding with an existing file or directory and paths the
    /// store refuses are all tied to one URL; anything else means the store is unusable.
    pub fn is_path_error(&self) -> bool {
        match self {
            StorageError::InvalidPath(_) => true,
            StorageError::Io(e) => matches!(
                e.kind(),
                ErrorKind::InvalidFilename
                    | ErrorKind::NotADirectory
                    | ErrorKind::IsADirectory
                    | ErrorKind::AlreadyExists
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Host-scoped document store
///
/// Paths are relative and start with the host directory (see [`super::page_path`]).
pub trait PageStore {
    /// Writes `content` at `path`, replacing any previous content and creating parent
    /// directories as needed
    fn write(&self, path: &str, content: &str) -> StorageResult<()>;
}

/// Append-only record of what a crawl did
///
/// The journal is an audit trail; the scheduler never reads it back.
pub trait Journal {
    // ===== Run Management =====

    /// Creates a new crawl run, returning its ID
    fn start_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Sets the final status and finish time of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Counts all runs
    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Page Outcomes =====

    /// Records the outcome of one fetch attempt
    ///
    /// # Arguments
    ///
    /// * `run_id` - The current run
    /// * `url` - The URL that was attempted
    /// * `host` - Its host key
    /// * `outcome` - How the attempt ended
    /// * `detail` - Page title for stored pages, error text otherwise
    fn record_page(
        &mut self,
        run_id: i64,
        url: &str,
        host: &str,
        outcome: PageOutcome,
        detail: Option<&str>,
    ) -> StorageResult<()>;

    /// Counts attempts with a given outcome, across all runs
    fn count_pages_by_outcome(&self, outcome: PageOutcome) -> StorageResult<u64>;

    /// Gets the number of attempts per outcome
    fn get_outcome_summary(&self) -> StorageResult<HashMap<PageOutcome, u64>>;

    /// Counts distinct hosts that had at least one page stored
    fn count_hosts_with_pages(&self) -> StorageResult<u64>;

    // ===== Host Records =====

    /// Records that `host` serves a robots.txt, with the sitemaps it declares
    fn record_robots_host(&mut self, host: &str, sitemaps: &[String]) -> StorageResult<()>;

    /// Gets every host known to serve robots.txt, sorted by host
    fn get_robots_hosts(&self) -> StorageResult<Vec<HostRecord>>;
}
