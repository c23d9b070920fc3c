//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop. One iteration:
//! 1. Dequeue the next URL whose host is not paused
//! 2. Fetch and record robots.txt the first time a host is seen
//! 3. Drop URLs denied by robots.txt
//! 4. Wait out the pacing delay, then fetch the page
//! 5. Store it and admit its links, or apply the timeout/failure policy
//!
//! The loop is strictly sequential; an interrupt is observed between iterations and during
//! sleeps, and always ends with a checkpoint.

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::crawler::fetcher::{ContentKind, FetchError, FetchedDocument, Fetcher, HttpFetcher};
use crate::crawler::frontier::QueuedUrl;
use crate::crawler::parser::parse_html;
use crate::crawler::scheduler::{CrawlCounters, Scheduler};
use crate::robots::fetch_robots;
use crate::storage::{
    open_journal, page_path, robots_path, FsPageStore, Journal, PageOutcome, PageStore,
    RunStatus, StorageError,
};
use crate::url::resolve;
use crate::{CheckpointError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Where the crawl loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// A URL was taken from the frontier and processed
    Running,
    /// The frontier is not empty but every queued host is paused
    Waiting,
    /// The frontier is empty or the global page limit has been reached
    Done,
    /// The cancellation token fired
    Interrupted,
}

/// Loop parameters that are not part of the scheduler state
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Product token matched against robots.txt groups
    pub robots_agent: String,

    /// Delay before every page fetch
    pub pacing_delay: Duration,

    /// Sleep while every queued host is paused
    pub idle_wait: Duration,

    /// Stored pages between periodic checkpoints, 0 disables them
    pub checkpoint_every: u64,

    /// Where checkpoints are written; None disables checkpoints
    pub checkpoint_path: Option<PathBuf>,

    /// Hash of the configuration file, recorded in checkpoints and the journal
    pub config_hash: String,
}

impl LoopSettings {
    /// Builds loop settings from a loaded configuration
    pub fn from_config(config: &Config, config_hash: &str) -> Self {
        Self {
            robots_agent: config.user_agent.crawler_name.clone(),
            pacing_delay: Duration::from_millis(config.crawler.pacing_delay_ms),
            idle_wait: Duration::from_millis(config.crawler.idle_wait_ms),
            checkpoint_every: config.crawler.checkpoint_every,
            checkpoint_path: Some(PathBuf::from(&config.output.checkpoint_path)),
            config_hash: config_hash.to_string(),
        }
    }
}

/// What a finished (or interrupted) crawl did
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Outcome counters, including those of resumed runs
    pub counters: CrawlCounters,
    /// URLs still queued
    pub queued: usize,
    /// URLs visited so far
    pub visited: usize,
    /// Wall-clock time of this run
    pub elapsed: Duration,
    /// Whether the run ended on an interrupt
    pub interrupted: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator<F, S, J> {
    scheduler: Scheduler,
    fetcher: F,
    pages: S,
    journal: J,
    settings: LoopSettings,
    run_id: i64,
    state: LoopState,
}

impl<F, S, J> Coordinator<F, S, J>
where
    F: Fetcher,
    S: PageStore,
    J: Journal,
{
    /// Creates a new coordinator and opens a run in the journal
    ///
    /// # Arguments
    ///
    /// * `scheduler` - Fresh or restored scheduler state
    /// * `fetcher` - Fetcher for pages and robots.txt
    /// * `pages` - Page store for fetched documents
    /// * `journal` - Crawl journal
    /// * `settings` - Loop parameters
    pub fn new(
        scheduler: Scheduler,
        fetcher: F,
        pages: S,
        mut journal: J,
        settings: LoopSettings,
    ) -> Result<Self> {
        let run_id = journal.start_run(&settings.config_hash)?;
        Ok(Self {
            scheduler,
            fetcher,
            pages,
            journal,
            settings,
            run_id,
            state: LoopState::Running,
        })
    }

    /// Runs the crawl loop until it is done or `cancel` fires
    ///
    /// A checkpoint is written when the loop ends, including after a fatal error.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<CrawlSummary> {
        tracing::info!(
            "Starting crawl run {} with {} queued and {} visited URLs",
            self.run_id,
            self.scheduler.frontier_size(),
            self.scheduler.frontier().visited_len()
        );

        let started = Instant::now();
        let stored_at_start = self.scheduler.counters().stored;
        let mut iterations: u64 = 0;

        let interrupted = loop {
            if cancel.is_cancelled() {
                break true;
            }

            let state = match self.step(&cancel).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!("Stopping crawl: {}", e);
                    if let Err(checkpoint_error) = self.write_checkpoint() {
                        tracing::error!("Failed to write checkpoint: {}", checkpoint_error);
                    }
                    if let Err(journal_error) =
                        self.journal.finish_run(self.run_id, RunStatus::Failed)
                    {
                        tracing::error!("Failed to close run: {}", journal_error);
                    }
                    return Err(e);
                }
            };

            match state {
                LoopState::Done => break false,
                LoopState::Interrupted => break true,
                LoopState::Waiting => {
                    tracing::debug!(
                        "All {} queued URLs belong to paused hosts, waiting {:?}",
                        self.scheduler.frontier_size(),
                        self.settings.idle_wait
                    );
                    let cancelled = tokio::select! {
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.settings.idle_wait) => false,
                    };
                    if cancelled {
                        break true;
                    }
                }
                LoopState::Running => {
                    iterations += 1;
                    // Progress reporting every 10 iterations
                    if iterations % 10 == 0 {
                        let stored = self.scheduler.counters().stored - stored_at_start;
                        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                        let rate = stored as f64 / elapsed;
                        tracing::info!(
                            "Progress: {} pages stored, {} in frontier, {:.2} pages/sec",
                            self.scheduler.counters().stored,
                            self.scheduler.frontier_size(),
                            rate
                        );
                    }
                }
            }
        };

        self.write_checkpoint()?;
        let status = if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.journal.finish_run(self.run_id, status)?;

        let summary = CrawlSummary {
            counters: *self.scheduler.counters(),
            queued: self.scheduler.frontier_size(),
            visited: self.scheduler.frontier().visited_len(),
            elapsed: started.elapsed(),
            interrupted,
        };

        if interrupted {
            tracing::info!(
                "Crawl interrupted after {:?}: {} pages stored, {} URLs still queued",
                summary.elapsed,
                summary.counters.stored,
                summary.queued
            );
        } else {
            tracing::info!(
                "Crawl completed: {} pages stored in {:?}",
                summary.counters.stored,
                summary.elapsed
            );
        }

        Ok(summary)
    }

    /// Runs one iteration of the crawl loop
    ///
    /// Per-URL failures are absorbed here; only page store and journal errors are returned.
    /// When an error is returned, the URL being processed is back at the head of the
    /// frontier and nothing recorded for it is left in the scheduler.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<LoopState> {
        if self.scheduler.is_done() {
            self.state = LoopState::Done;
            return Ok(self.state);
        }

        let Some(entry) = self.scheduler.dequeue(Utc::now()) else {
            self.state = LoopState::Waiting;
            return Ok(self.state);
        };

        let snapshot = self.scheduler.snapshot_attempt(&entry);
        self.state = match self.process(&entry, cancel).await {
            Ok(state) => state,
            Err(e) => {
                self.scheduler.rollback_attempt(&entry, snapshot);
                return Err(e);
            }
        };
        Ok(self.state)
    }

    async fn process(
        &mut self,
        entry: &QueuedUrl,
        cancel: &CancellationToken,
    ) -> Result<LoopState> {
        tracing::debug!("Processing URL: {}", entry.url);

        if self.scheduler.needs_robots(&entry.host) {
            self.discover_robots(&entry.host).await?;
        }

        if !self.scheduler.check_robots(entry, &self.settings.robots_agent) {
            self.journal.record_page(
                self.run_id,
                &entry.url,
                &entry.host,
                PageOutcome::RobotsDenied,
                None,
            )?;
            tracing::info!("URL {} disallowed by robots.txt", entry.url);
            return Ok(LoopState::Running);
        }

        if !self.settings.pacing_delay.is_zero() {
            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.settings.pacing_delay) => false,
            };
            if cancelled {
                self.scheduler.undo_dequeue(entry);
                return Ok(LoopState::Interrupted);
            }
        }

        self.scheduler.begin_fetch(entry, Utc::now());

        match self.fetcher.fetch(&entry.url, ContentKind::Html).await {
            Ok(document) => self.store_page(entry, document)?,
            Err(FetchError::Timeout) => {
                self.journal.record_page(
                    self.run_id,
                    &entry.url,
                    &entry.host,
                    PageOutcome::Timeout,
                    None,
                )?;
                let outcome = self.scheduler.record_timeout(entry, Utc::now());
                if outcome.paused {
                    tracing::warn!(
                        "Timeout fetching {}; host paused, {} URLs requeued",
                        entry.url,
                        outcome.requeued
                    );
                } else {
                    tracing::warn!("Timeout fetching {}", entry.url);
                }
            }
            Err(e) => {
                let detail = e.to_string();
                self.journal.record_page(
                    self.run_id,
                    &entry.url,
                    &entry.host,
                    outcome_of(&e),
                    Some(&detail),
                )?;
                self.scheduler.record_failure(entry);
                tracing::warn!("Dropping {}: {}", entry.url, detail);
            }
        }

        Ok(LoopState::Running)
    }

    /// Fetches robots.txt for a new host and records the decision
    ///
    /// A found robots.txt is also written to the page store and the host (with its
    /// sitemaps) is recorded in the journal.
    async fn discover_robots(&mut self, host: &str) -> Result<()> {
        let robots = fetch_robots(&self.fetcher, host).await;

        if let Some(robots) = &robots {
            if let Some(path) = robots_path(host) {
                match self.pages.write(&path, robots.content()) {
                    Err(e) if e.is_path_error() => {
                        tracing::warn!("Cannot store robots.txt of {}: {}", host, e)
                    }
                    other => other?,
                }
            }
            let sitemaps = robots.sitemaps();
            if !sitemaps.is_empty() {
                tracing::info!("Found sitemap at {:?}", sitemaps);
            }
            self.journal.record_robots_host(host, &sitemaps)?;
        }

        self.scheduler.record_robots(host, robots);
        Ok(())
    }

    fn store_page(&mut self, entry: &QueuedUrl, document: FetchedDocument) -> Result<()> {
        let written = match page_path(&entry.url) {
            Some(path) => self.pages.write(&path, &document.body),
            None => Err(StorageError::InvalidPath(entry.url.clone())),
        };
        if let Err(e) = written {
            if !e.is_path_error() {
                return Err(e.into());
            }
            let detail = e.to_string();
            self.journal.record_page(
                self.run_id,
                &entry.url,
                &entry.host,
                PageOutcome::Unstorable,
                Some(&detail),
            )?;
            self.scheduler.record_failure(entry);
            tracing::warn!("Cannot store {}: {}", entry.url, detail);
            return Ok(());
        }

        let parsed = parse_html(&document.body);
        self.journal.record_page(
            self.run_id,
            &entry.url,
            &entry.host,
            PageOutcome::Stored,
            parsed.title.as_deref(),
        )?;

        let links: Vec<String> = parsed
            .links
            .iter()
            .filter_map(|href| resolve(&entry.url, href))
            .collect();
        let outcome = self
            .scheduler
            .record_success(entry, links.iter().map(String::as_str));

        let stored = self.scheduler.counters().stored;
        tracing::info!(
            "(#{}) Found html at {} ({} new links)",
            stored,
            entry.url,
            outcome.admitted
        );
        tracing::debug!("Current frontier size: {}", self.scheduler.frontier_size());

        let every = self.settings.checkpoint_every;
        if every > 0 && stored % every == 0 {
            if let Err(e) = self.write_checkpoint() {
                tracing::warn!("Periodic checkpoint failed: {}", e);
            }
        }
        Ok(())
    }

    /// Writes a checkpoint of the current scheduler state, if a path is configured
    pub fn write_checkpoint(&self) -> std::result::Result<(), CheckpointError> {
        let Some(path) = &self.settings.checkpoint_path else {
            return Ok(());
        };
        Checkpoint::capture(&self.scheduler, &self.settings.config_hash, Utc::now()).save(path)
    }

    /// The scheduler state
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The page store
    pub fn pages(&self) -> &S {
        &self.pages
    }

    /// The crawl journal
    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Journal ID of this run
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// State after the most recent step
    pub fn state(&self) -> LoopState {
        self.state
    }
}

/// Maps a non-timeout fetch failure to its journal outcome
fn outcome_of(error: &FetchError) -> PageOutcome {
    match error {
        FetchError::Timeout => PageOutcome::Timeout,
        FetchError::ContentMismatch { .. } => PageOutcome::ContentMismatch,
        FetchError::Status(_) => PageOutcome::HttpStatus,
        FetchError::Transport(_) => PageOutcome::Transport,
    }
}

/// Runs a crawl over HTTP with the filesystem page store and SQLite journal
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `scheduler` - Fresh or restored scheduler state
/// * `config_hash` - Hash of the configuration file
/// * `cancel` - Fires on interrupt; the crawl checkpoints and returns
///
/// # Example
///
/// ```no_run
/// use scoped_crawl::config::load_config_with_hash;
/// use scoped_crawl::crawler::{run_crawl, AdmissionFilter, CrawlLimits, Scheduler};
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("crawl.toml"))?;
/// let mut scheduler = Scheduler::new(
///     CrawlLimits::from_config(&config),
///     AdmissionFilter::from_config(&config.scope),
/// );
/// scheduler.seed(config.scope.seeds.iter().map(String::as_str));
/// run_crawl(&config, scheduler, &hash, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    scheduler: Scheduler,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    let fetcher = HttpFetcher::new(
        &config.user_agent,
        Duration::from_secs(config.crawler.fetch_timeout_secs),
    )?;
    let pages = FsPageStore::new(&config.output.pages_dir);
    let journal = open_journal(Path::new(&config.output.database_path))?;
    let settings = LoopSettings::from_config(config, config_hash);

    let mut coordinator = Coordinator::new(scheduler, fetcher, pages, journal, settings)?;
    coordinator.run(cancel).await
}
