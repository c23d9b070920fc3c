//! Storage module for persisting crawl output
//!
//! This module handles everything the crawler writes besides checkpoints:
//! - The host-scoped page store (fetched HTML and robots.txt files)
//! - The SQLite crawl journal (runs, per-URL outcomes, robots/sitemap hosts)

mod pages;
mod schema;
mod sqlite;
mod traits;

pub use pages::{page_path, robots_path, FsPageStore};
pub use sqlite::SqliteJournal;
pub use traits::{Journal, PageStore, StorageError, StorageResult};

use std::path::Path;

/// Opens or creates the crawl journal
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteJournal)` - Successfully opened journal
/// * `Err(StorageError)` - Failed to open the database
pub fn open_journal(path: &Path) -> StorageResult<SqliteJournal> {
    SqliteJournal::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How a single fetch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageOutcome {
    /// Fetched as HTML and written to the page store
    Stored,
    /// Denied by the host's robots.txt
    RobotsDenied,
    /// Transport timeout
    Timeout,
    /// Response was not HTML
    ContentMismatch,
    /// Non-2xx response
    HttpStatus,
    /// DNS, connection or TLS failure
    Transport,
    /// Fetched, but the URL does not map to a writable page path
    Unstorable,
}

impl PageOutcome {
    /// All outcomes, in report order
    pub const ALL: [PageOutcome; 7] = [
        Self::Stored,
        Self::RobotsDenied,
        Self::Timeout,
        Self::ContentMismatch,
        Self::HttpStatus,
        Self::Transport,
        Self::Unstorable,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::RobotsDenied => "robots-denied",
            Self::Timeout => "timeout",
            Self::ContentMismatch => "content-mismatch",
            Self::HttpStatus => "http-status",
            Self::Transport => "transport",
            Self::Unstorable => "unstorable",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|outcome| outcome.to_db_string() == s)
    }
}

/// A host that serves robots.txt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Host key (`scheme://host[:port]`)
    pub host: String,
    /// Sitemap URLs declared in its robots.txt
    pub sitemaps: Vec<String>,
}
