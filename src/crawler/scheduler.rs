//! Scheduler aggregate
//!
//! This module owns every piece of mutable crawl state:
//! - The frontier and the Visited set
//! - Per-host politeness state (robots, throttling, backoff, quotas)
//! - The fetch history ring used for requeue-on-timeout
//! - Outcome counters and the last fetched host
//!
//! All state transitions go through the methods below so the dedup, scope and quota
//! invariants hold at every observation point, including checkpoints.

use super::admission::AdmissionFilter;
use super::frontier::{Frontier, QueuedUrl};
use super::history::FetchHistory;
use crate::config::{Config, PolitenessConfig};
use crate::robots::ParsedRobots;
use crate::state::{HostPolicyStore, HostState};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Limits a crawl runs under; recorded in every checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlLimits {
    /// Global limit on stored pages
    pub max_pages: u64,

    /// Stored pages per host before the host is purged
    pub host_page_quota: u32,

    /// Throttling and backoff policy
    pub politeness: PolitenessConfig,
}

impl CrawlLimits {
    /// Reads the limits from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.crawler.max_pages,
            host_page_quota: config.crawler.host_page_quota,
            politeness: config.politeness,
        }
    }

    /// Applies command-line overrides, holding them to the same bounds as the config file
    pub fn with_overrides(
        mut self,
        max_pages: Option<u64>,
        host_page_quota: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if let Some(max_pages) = max_pages {
            if max_pages < 1 {
                return Err(ConfigError::Validation(format!(
                    "--max-pages must be >= 1, got {}",
                    max_pages
                )));
            }
            self.max_pages = max_pages;
        }
        if let Some(quota) = host_page_quota {
            if quota < 1 {
                return Err(ConfigError::Validation(format!(
                    "--host-quota must be >= 1, got {}",
                    quota
                )));
            }
            self.host_page_quota = quota;
        }
        Ok(self)
    }

    /// Capacity of the fetch history ring
    pub fn history_capacity(&self) -> usize {
        self.politeness.timeout_pause_trigger as usize
    }
}

/// Per-outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCounters {
    /// Pages fetched and stored
    pub stored: u64,
    /// Fetches that timed out
    pub timeouts: u64,
    /// Fetches dropped for content mismatch, HTTP status or transport errors
    pub failures: u64,
    /// URLs denied by robots.txt
    pub denied: u64,
    /// URLs put back at the head of the frontier after a timeout pause
    pub requeued: u64,
}

/// Result of recording a stored page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessOutcome {
    /// Newly admitted links
    pub admitted: usize,
    /// Frontier entries purged because the host reached its quota
    pub purged: Option<usize>,
}

/// Result of recording a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutOutcome {
    /// Whether the host was paused by this timeout
    pub paused: bool,
    /// URLs moved back to the head of the frontier
    pub requeued: usize,
}

/// Scheduler state that processing one URL may change
///
/// Taken right after the URL is dequeued and handed back to
/// [`Scheduler::rollback_attempt`] if processing fails before an outcome is recorded.
#[derive(Debug, Clone)]
pub struct AttemptSnapshot {
    history: FetchHistory,
    hosts: Vec<(String, Option<HostState>)>,
    counters: CrawlCounters,
    last_host: Option<String>,
}

/// Scheduler manages the frontier and every per-host politeness decision
#[derive(Debug, Clone)]
pub struct Scheduler {
    frontier: Frontier,
    policy: HostPolicyStore,
    history: FetchHistory,
    admission: AdmissionFilter,
    counters: CrawlCounters,
    last_host: Option<String>,
    limits: CrawlLimits,
}

impl Scheduler {
    /// Creates a scheduler with an empty frontier
    pub fn new(limits: CrawlLimits, admission: AdmissionFilter) -> Self {
        Self {
            frontier: Frontier::new(),
            policy: HostPolicyStore::new(limits.politeness, limits.host_page_quota),
            history: FetchHistory::new(limits.history_capacity()),
            admission,
            counters: CrawlCounters::default(),
            last_host: None,
            limits,
        }
    }

    /// Reassembles a scheduler from restored parts
    pub(crate) fn from_parts(
        frontier: Frontier,
        policy: HostPolicyStore,
        history: FetchHistory,
        admission: AdmissionFilter,
        counters: CrawlCounters,
        last_host: Option<String>,
        limits: CrawlLimits,
    ) -> Self {
        Self {
            frontier,
            policy,
            history,
            admission,
            counters,
            last_host,
            limits,
        }
    }

    /// Admits the seed URLs, returning how many entered the frontier
    pub fn seed<'a, I>(&mut self, seeds: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.admission
            .admit_all(seeds, "seeds", &mut self.frontier, &self.policy)
    }

    /// Whether the crawl is finished: empty frontier or global page limit reached
    pub fn is_done(&self) -> bool {
        self.frontier.is_empty() || self.limit_reached()
    }

    /// Whether the global page limit has been reached
    pub fn limit_reached(&self) -> bool {
        self.counters.stored >= self.limits.max_pages
    }

    /// Takes the next URL whose host is not paused; it becomes Visited
    pub fn dequeue(&mut self, now: DateTime<Utc>) -> Option<QueuedUrl> {
        self.frontier.dequeue(&self.policy, now)
    }

    /// Puts a dequeued URL back at the head of the frontier and out of Visited
    ///
    /// Used when the loop stops between dequeuing a URL and recording its outcome.
    pub fn undo_dequeue(&mut self, entry: &QueuedUrl) {
        self.frontier.prepend_batch(std::slice::from_ref(&entry.url));
    }

    /// Captures the state processing `entry` can touch: its host, the previously fetched
    /// host, the history ring, the counters and the last fetched host
    pub fn snapshot_attempt(&self, entry: &QueuedUrl) -> AttemptSnapshot {
        let mut hosts = vec![(entry.host.clone(), self.policy.get(&entry.host).cloned())];
        if let Some(previous) = self.last_host.as_ref().filter(|h| **h != entry.host) {
            hosts.push((previous.clone(), self.policy.get(previous).cloned()));
        }
        AttemptSnapshot {
            history: self.history.clone(),
            hosts,
            counters: self.counters,
            last_host: self.last_host.clone(),
        }
    }

    /// Rewinds everything recorded for `entry` since `snapshot` and puts it back at the
    /// head of the frontier
    pub fn rollback_attempt(&mut self, entry: &QueuedUrl, snapshot: AttemptSnapshot) {
        for (host, state) in snapshot.hosts {
            self.policy.restore_state(&host, state);
        }
        self.history = snapshot.history;
        self.counters = snapshot.counters;
        self.last_host = snapshot.last_host;
        self.undo_dequeue(entry);
    }

    /// Whether robots.txt still has to be fetched for `host`
    pub fn needs_robots(&self, host: &str) -> bool {
        !self.policy.is_roboted(host)
    }

    /// Records the robots.txt decision for `host` (None allows everything)
    pub fn record_robots(&mut self, host: &str, robots: Option<ParsedRobots>) -> bool {
        self.policy.record_robots_decision(host, robots)
    }

    /// Checks robots.txt for a dequeued URL; denied URLs are dropped for good
    ///
    /// Denials leave the history, the throttle counters and the last fetched host untouched.
    pub fn check_robots(&mut self, entry: &QueuedUrl, user_agent: &str) -> bool {
        if self.policy.may_fetch(&entry.host, &entry.url, user_agent) {
            return true;
        }
        self.counters.denied += 1;
        tracing::debug!("Robots.txt denies {}", entry.url);
        false
    }

    /// Records a fetch attempt: history ring plus consecutive-fetch throttle
    ///
    /// Returns true if the host was paused by this attempt.
    pub fn begin_fetch(&mut self, entry: &QueuedUrl, now: DateTime<Utc>) -> bool {
        self.history.record(&entry.url);
        self.policy
            .on_dequeue(&entry.host, self.last_host.as_deref(), now)
    }

    /// Records a stored page and admits its already canonicalized links
    pub fn record_success<'a, I>(&mut self, entry: &QueuedUrl, links: I) -> SuccessOutcome
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.counters.stored += 1;
        let quota_reached = self
            .policy
            .on_success(&entry.host, self.last_host.as_deref());

        let purged = quota_reached.then(|| {
            let purged = self.frontier.remove_host(&entry.host);
            tracing::info!(
                "Host {} reached its quota of {} pages, purged {} queued URLs",
                entry.host,
                self.limits.host_page_quota,
                purged
            );
            purged
        });

        let admitted = self
            .admission
            .admit_all(links, &entry.host, &mut self.frontier, &self.policy);
        self.last_host = Some(entry.host.clone());

        SuccessOutcome { admitted, purged }
    }

    /// Records a timed-out fetch
    ///
    /// When the host hits the timeout trigger it is paused and every URL in the history
    /// ring goes back to the head of the frontier (oldest attempt first). The ring is
    /// emptied by the requeue.
    pub fn record_timeout(&mut self, entry: &QueuedUrl, now: DateTime<Utc>) -> TimeoutOutcome {
        self.counters.timeouts += 1;
        let paused = self
            .policy
            .on_timeout(&entry.host, self.last_host.as_deref(), now);

        let mut requeued = 0;
        if paused {
            let policy = &self.policy;
            let batch: Vec<String> = self
                .history
                .drain_oldest_first()
                .into_iter()
                .filter(|url| {
                    QueuedUrl::new(url.as_str())
                        .map_or(false, |queued| !policy.quota_reached(&queued.host))
                })
                .collect();
            requeued = self.frontier.prepend_batch(&batch);
            self.counters.requeued += requeued as u64;
            tracing::warn!(
                "Requeued {} recent URLs after repeated timeouts on {}",
                requeued,
                entry.host
            );
        }
        self.last_host = Some(entry.host.clone());

        TimeoutOutcome { paused, requeued }
    }

    /// Records a permanently dropped fetch (content mismatch, HTTP status, transport)
    pub fn record_failure(&mut self, entry: &QueuedUrl) {
        self.counters.failures += 1;
        self.last_host = Some(entry.host.clone());
    }

    /// Read-only view of the frontier
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Read-only view of the per-host policy store
    pub fn policy(&self) -> &HostPolicyStore {
        &self.policy
    }

    /// Read-only view of the fetch history ring
    pub fn history(&self) -> &FetchHistory {
        &self.history
    }

    pub fn counters(&self) -> &CrawlCounters {
        &self.counters
    }

    pub fn limits(&self) -> &CrawlLimits {
        &self.limits
    }

    /// Host of the most recent fetch attempt
    pub fn last_host(&self) -> Option<&str> {
        self.last_host.as_deref()
    }

    /// Returns the number of URLs in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCLUDED_EXTENSIONS;
    use chrono::{Duration, TimeZone};

    const A: &str = "https://a.ku.ac.th";
    const B: &str = "https://b.ku.ac.th";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn limits(max_pages: u64, quota: u32) -> CrawlLimits {
        CrawlLimits {
            max_pages,
            host_page_quota: quota,
            politeness: PolitenessConfig {
                fetch_pause_trigger: 5,
                fetch_pause_secs: 60,
                timeout_pause_trigger: 3,
                initial_timeout_pause_secs: 10,
            },
        }
    }

    fn create_scheduler(max_pages: u64, quota: u32) -> Scheduler {
        Scheduler::new(
            limits(max_pages, quota),
            AdmissionFilter::new("*.ku.ac.th", DEFAULT_EXCLUDED_EXTENSIONS),
        )
    }

    fn queued(scheduler: &Scheduler) -> Vec<String> {
        scheduler.frontier().iter().map(|e| e.url.clone()).collect()
    }

    #[test]
    fn test_limit_overrides() {
        let base = limits(100, 10);
        assert_eq!(base.with_overrides(None, None).unwrap(), base);

        let overridden = base.with_overrides(Some(5), Some(2)).unwrap();
        assert_eq!(overridden.max_pages, 5);
        assert_eq!(overridden.host_page_quota, 2);
        assert_eq!(overridden.politeness, base.politeness);

        assert!(matches!(
            base.with_overrides(Some(0), None),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            base.with_overrides(None, Some(0)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_new_scheduler() {
        let scheduler = create_scheduler(10, 10);
        assert_eq!(scheduler.frontier_size(), 0);
        assert!(scheduler.is_done());
        assert_eq!(scheduler.history().capacity(), 3);
        assert!(scheduler.last_host().is_none());
    }

    #[test]
    fn test_seed_filters_scope() {
        let mut scheduler = create_scheduler(10, 10);
        let admitted = scheduler.seed([
            "https://www.ku.ac.th/th/",
            "https://www.eng.ku.ac.th/",
            "https://www.example.com/",
        ]);
        assert_eq!(admitted, 2);
        assert!(!scheduler.is_done());
    }

    #[test]
    fn test_single_page_scenario() {
        let mut scheduler = create_scheduler(1, 10);
        scheduler.seed(["https://a.ku.ac.th/x"]);

        let entry = scheduler.dequeue(at(0)).unwrap();
        assert!(scheduler.needs_robots(&entry.host));
        scheduler.record_robots(&entry.host, None);
        assert!(scheduler.check_robots(&entry, "SantaBot"));
        scheduler.begin_fetch(&entry, at(0));

        let outcome = scheduler.record_success(
            &entry,
            [
                "https://a.ku.ac.th/y",
                "https://b.ku.ac.th/z",
                "https://a.ku.ac.th/file.pdf",
            ],
        );

        assert_eq!(outcome.admitted, 2);
        assert_eq!(outcome.purged, None);
        assert_eq!(scheduler.counters().stored, 1);
        assert_eq!(
            queued(&scheduler),
            vec!["https://a.ku.ac.th/y", "https://b.ku.ac.th/z"]
        );
        assert!(scheduler.limit_reached());
        assert!(scheduler.is_done());
    }

    #[test]
    fn test_throttle_scenario() {
        let mut scheduler = create_scheduler(100, 100);
        for i in 0..6 {
            scheduler.seed([format!("https://a.ku.ac.th/{}", i).as_str()]);
        }
        scheduler.seed(["https://b.ku.ac.th/other"]);

        for i in 0..5 {
            let entry = scheduler.dequeue(at(i)).unwrap();
            assert_eq!(entry.host, A);
            scheduler.begin_fetch(&entry, at(i));
            scheduler.record_success(&entry, std::iter::empty());
        }

        // The sixth a.ku.ac.th URL is at the head but its host is paused
        assert_eq!(queued(&scheduler)[0], "https://a.ku.ac.th/5");
        let entry = scheduler.dequeue(at(5)).unwrap();
        assert_eq!(entry.url, "https://b.ku.ac.th/other");
        assert_eq!(
            scheduler.policy().get(A).unwrap().paused_until,
            Some(at(4) + Duration::seconds(60))
        );

        assert!(scheduler.dequeue(at(30)).is_none());
        assert_eq!(
            scheduler.dequeue(at(64)).unwrap().url,
            "https://a.ku.ac.th/5"
        );
    }

    #[test]
    fn test_robots_denial_is_terminal() {
        let mut scheduler = create_scheduler(10, 10);
        scheduler.seed(["https://a.ku.ac.th/private/x", "https://a.ku.ac.th/ok"]);
        scheduler.record_robots(
            A,
            Some(ParsedRobots::from_content("User-agent: *\nDisallow: /private")),
        );

        let entry = scheduler.dequeue(at(0)).unwrap();
        assert!(!scheduler.check_robots(&entry, "SantaBot"));
        assert_eq!(scheduler.counters().denied, 1);
        assert!(scheduler.history().is_empty());
        assert!(scheduler.last_host().is_none());
        assert!(scheduler.frontier().is_visited("https://a.ku.ac.th/private/x"));
        assert!(!scheduler.needs_robots(A));
    }

    #[test]
    fn test_requeue_on_timeout() {
        let mut scheduler = create_scheduler(100, 100);
        scheduler.seed([
            "https://a.ku.ac.th/1",
            "https://a.ku.ac.th/2",
            "https://a.ku.ac.th/3",
            "https://b.ku.ac.th/4",
        ]);

        let mut outcome = None;
        for i in 0..3 {
            let entry = scheduler.dequeue(at(i)).unwrap();
            scheduler.begin_fetch(&entry, at(i));
            outcome = Some(scheduler.record_timeout(&entry, at(i)));
        }

        let outcome = outcome.unwrap();
        assert!(outcome.paused);
        assert_eq!(outcome.requeued, 3);
        assert_eq!(
            queued(&scheduler),
            vec![
                "https://a.ku.ac.th/1",
                "https://a.ku.ac.th/2",
                "https://a.ku.ac.th/3",
                "https://b.ku.ac.th/4"
            ]
        );
        for url in ["https://a.ku.ac.th/1", "https://a.ku.ac.th/2", "https://a.ku.ac.th/3"] {
            assert!(!scheduler.frontier().is_visited(url));
        }
        assert!(scheduler.history().is_empty());
        assert_eq!(scheduler.counters().timeouts, 3);
        assert_eq!(scheduler.counters().requeued, 3);

        // a.ku.ac.th is backing off; b.ku.ac.th is served
        assert_eq!(scheduler.dequeue(at(3)).unwrap().url, "https://b.ku.ac.th/4");
        assert!(scheduler.dequeue(at(5)).is_none());
        assert_eq!(
            scheduler.dequeue(at(12)).unwrap().url,
            "https://a.ku.ac.th/1"
        );
    }

    #[test]
    fn test_failure_does_not_touch_backoff() {
        let mut scheduler = create_scheduler(100, 100);
        scheduler.seed(["https://a.ku.ac.th/1", "https://a.ku.ac.th/2"]);

        let entry = scheduler.dequeue(at(0)).unwrap();
        scheduler.begin_fetch(&entry, at(0));
        scheduler.record_failure(&entry);

        assert_eq!(scheduler.counters().failures, 1);
        assert_eq!(scheduler.last_host(), Some(A));
        assert_eq!(scheduler.policy().get(A).unwrap().consecutive_timeout_count, 0);
        assert!(!scheduler.policy().is_paused(A, at(1)));
        assert!(scheduler.frontier().is_visited("https://a.ku.ac.th/1"));
    }

    #[test]
    fn test_quota_purges_host() {
        let mut scheduler = create_scheduler(100, 2);
        scheduler.seed([
            "https://a.ku.ac.th/1",
            "https://a.ku.ac.th/2",
            "https://a.ku.ac.th/3",
            "https://b.ku.ac.th/1",
        ]);

        let first = scheduler.dequeue(at(0)).unwrap();
        scheduler.begin_fetch(&first, at(0));
        assert_eq!(scheduler.record_success(&first, std::iter::empty()).purged, None);

        let second = scheduler.dequeue(at(1)).unwrap();
        scheduler.begin_fetch(&second, at(1));
        let outcome = scheduler.record_success(&second, ["https://a.ku.ac.th/4"]);

        assert_eq!(outcome.purged, Some(1));
        assert_eq!(outcome.admitted, 0);
        assert_eq!(queued(&scheduler), vec!["https://b.ku.ac.th/1"]);
        assert_eq!(scheduler.policy().get(A).unwrap().page_count, 2);
    }

    #[test]
    fn test_interleaved_hosts_never_throttled() {
        let mut scheduler = create_scheduler(100, 100);
        for i in 0..6 {
            scheduler.seed([
                format!("{}/{}", A, i).as_str(),
                format!("{}/{}", B, i).as_str(),
            ]);
        }
        for i in 0..12 {
            let entry = scheduler.dequeue(at(i)).unwrap();
            assert!(!scheduler.begin_fetch(&entry, at(i)));
            scheduler.record_success(&entry, std::iter::empty());
        }
        assert!(scheduler.frontier().is_empty());
    }

    #[test]
    fn test_undo_dequeue() {
        let mut scheduler = create_scheduler(100, 100);
        scheduler.seed(["https://a.ku.ac.th/1", "https://a.ku.ac.th/2"]);

        let entry = scheduler.dequeue(at(0)).unwrap();
        scheduler.undo_dequeue(&entry);

        assert!(!scheduler.frontier().is_visited(&entry.url));
        assert_eq!(
            queued(&scheduler),
            vec!["https://a.ku.ac.th/1", "https://a.ku.ac.th/2"]
        );
    }

    #[test]
    fn test_rollback_attempt_restores_touched_state() {
        let mut scheduler = create_scheduler(100, 100);
        scheduler.seed(["https://a.ku.ac.th/1", "https://b.ku.ac.th/1"]);

        let entry = scheduler.dequeue(at(0)).unwrap();
        scheduler.record_robots(A, None);
        scheduler.begin_fetch(&entry, at(0));
        scheduler.record_success(&entry, std::iter::empty());
        let before = scheduler.clone();

        let entry = scheduler.dequeue(at(1)).unwrap();
        let snapshot = scheduler.snapshot_attempt(&entry);
        scheduler.record_robots(B, None);
        scheduler.begin_fetch(&entry, at(1));
        scheduler.rollback_attempt(&entry, snapshot);

        assert_eq!(queued(&scheduler), vec!["https://b.ku.ac.th/1"]);
        assert!(!scheduler.frontier().is_visited(&entry.url));
        assert_eq!(scheduler.policy().states(), before.policy().states());
        assert_eq!(scheduler.counters(), before.counters());
        assert_eq!(scheduler.last_host(), Some(A));
        assert_eq!(
            scheduler.history().iter().collect::<Vec<_>>(),
            before.history().iter().collect::<Vec<_>>()
        );
        assert!(scheduler.needs_robots(B));
    }
}
