//! Checkpoint and resume
//!
//! A checkpoint captures the complete scheduler state between two crawl iterations: the
//! frontier (in order), the Visited set, every host's politeness state, the fetch history
//! ring, the outcome counters and the last fetched host. It is stored as a versioned JSON
//! document and written atomically (temporary file, then rename).
//!
//! # Example
//!
//! ```no_run
//! use scoped_crawl::checkpoint::Checkpoint;
//! use std::path::Path;
//!
//! let checkpoint = Checkpoint::load(Path::new("crawl.checkpoint.json")).unwrap();
//! println!("{} URLs still queued", checkpoint.frontier.len());
//! ```

use crate::crawler::{
    AdmissionFilter, CrawlCounters, CrawlLimits, FetchHistory, Frontier, QueuedUrl, Scheduler,
};
use crate::state::{HostPolicyStore, HostState};
use crate::CheckpointError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Format version written into every checkpoint
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a [`Scheduler`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version, see [`CHECKPOINT_VERSION`]
    pub version: u32,

    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,

    /// Hash of the configuration file the crawl was running under
    pub config_hash: String,

    /// Limits in force when the snapshot was taken
    pub limits: CrawlLimits,

    /// Queued URLs in dequeue order
    pub frontier: Vec<String>,

    /// Visited URLs, sorted
    pub visited: Vec<String>,

    /// Per-host politeness state
    pub hosts: BTreeMap<String, HostState>,

    /// Fetch history ring, most recent first
    pub history: Vec<String>,

    /// Outcome counters
    pub counters: CrawlCounters,

    /// Host of the most recent fetch attempt
    pub last_host: Option<String>,
}

impl Checkpoint {
    /// Captures the state of `scheduler`
    pub fn capture(scheduler: &Scheduler, config_hash: &str, now: DateTime<Utc>) -> Self {
        let mut visited: Vec<String> = scheduler.frontier().visited().iter().cloned().collect();
        visited.sort();

        Self {
            version: CHECKPOINT_VERSION,
            created_at: now,
            config_hash: config_hash.to_string(),
            limits: *scheduler.limits(),
            frontier: scheduler
                .frontier()
                .iter()
                .map(|entry| entry.url.clone())
                .collect(),
            visited,
            hosts: scheduler
                .policy()
                .states()
                .iter()
                .map(|(host, state)| (host.clone(), state.clone()))
                .collect(),
            history: scheduler.history().iter().cloned().collect(),
            counters: *scheduler.counters(),
            last_host: scheduler.last_host().map(str::to_string),
        }
    }

    /// Serializes the checkpoint to its JSON form
    pub fn to_blob(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a checkpoint, rejecting unknown format versions
    pub fn from_blob(blob: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Checkpoint = serde_json::from_str(blob)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                found: checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        Ok(checkpoint)
    }

    /// Writes the checkpoint to `path` atomically
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let blob = self.to_blob()?;
        let temp = temp_path(path);
        let mut file = File::create(&temp)?;
        file.write_all(blob.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = std::fs::rename(&temp, path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::info!(
            "Checkpoint written to {} ({} queued, {} visited)",
            path.display(),
            self.frontier.len(),
            self.visited.len()
        );
        Ok(())
    }

    /// Reads a checkpoint from `path`
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let blob = std::fs::read_to_string(path)?;
        Self::from_blob(&blob)
    }

    /// Rebuilds a scheduler from this checkpoint
    ///
    /// The scheduler runs under `limits`, which may differ from the recorded ones. The
    /// frontier must be free of duplicates, disjoint from Visited and contain only URLs
    /// with a host; the history ring is cut down to the capacity `limits` imply, keeping
    /// the most recent entries.
    pub fn restore(
        self,
        admission: AdmissionFilter,
        limits: CrawlLimits,
    ) -> Result<Scheduler, CheckpointError> {
        let visited: HashSet<String> = self.visited.into_iter().collect();

        let mut seen = HashSet::with_capacity(self.frontier.len());
        let mut queue = Vec::with_capacity(self.frontier.len());
        for url in self.frontier {
            if !seen.insert(url.clone()) {
                return Err(CheckpointError::Inconsistent(format!(
                    "{} is queued twice",
                    url
                )));
            }
            if visited.contains(&url) {
                return Err(CheckpointError::Inconsistent(format!(
                    "{} is both queued and visited",
                    url
                )));
            }
            let entry = QueuedUrl::new(url.as_str()).ok_or_else(|| {
                CheckpointError::Inconsistent(format!("{} has no host", url))
            })?;
            queue.push(entry);
        }

        if let Some(host) = self.last_host.as_deref() {
            if !self.hosts.contains_key(host) {
                return Err(CheckpointError::Inconsistent(format!(
                    "last host {} has no recorded state",
                    host
                )));
            }
        }

        let policy = HostPolicyStore::from_states(
            limits.politeness,
            limits.host_page_quota,
            self.hosts.into_iter().collect(),
        );
        let history = FetchHistory::from_entries(limits.history_capacity(), self.history);

        // A smaller quota may close hosts that were still open when the checkpoint was taken
        let mut frontier = Frontier::from_parts(queue, visited);
        for host in policy.states().keys() {
            if policy.quota_reached(host) {
                let purged = frontier.remove_host(host);
                if purged > 0 {
                    tracing::info!(
                        "{} is at its page quota, dropped {} queued URLs",
                        host,
                        purged
                    );
                }
            }
        }

        Ok(Scheduler::from_parts(
            frontier,
            policy,
            history,
            admission,
            self.counters,
            self.last_host,
            limits,
        ))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
