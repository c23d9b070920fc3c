use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tracks the politeness state of one host during crawling
///
/// This structure maintains the per-host counters that gate dequeues: the robots.txt
/// decision, the pause window, consecutive fetch/timeout counters, the timeout backoff
/// escalation and the number of pages stored so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostState {
    /// Whether robots.txt has been fetched (or its absence decided) for this host
    pub roboted: bool,

    /// Parsed robots.txt; `None` means allow all
    pub robots: Option<ParsedRobots>,

    /// The host may not be dequeued before this instant
    pub paused_until: Option<DateTime<Utc>>,

    /// Immediately-consecutive dequeues of this host
    pub consecutive_fetch_count: u32,

    /// Immediately-consecutive timeout outcomes for this host
    pub consecutive_timeout_count: u32,

    /// Number of times this host has been paused for timeouts
    pub timeout_pause_escalation: u32,

    /// Pages successfully stored for this host
    pub page_count: u32,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the host is inside its pause window at `now`
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.map_or(false, |until| now < until)
    }

    /// Pauses the host for `pause` starting at `now`
    ///
    /// An existing pause that ends later is kept; pauses never shorten each other.
    pub fn pause(&mut self, now: DateTime<Utc>, pause: Duration) -> DateTime<Utc> {
        let until = now
            .checked_add_signed(pause)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let until = match self.paused_until {
            Some(existing) if existing > until => existing,
            _ => until,
        };
        self.paused_until = Some(until);
        until
    }

    /// Records the robots.txt decision; only the first call per host has an effect
    ///
    /// Returns true if the decision was recorded by this call.
    pub fn record_robots(&mut self, decision: Option<ParsedRobots>) -> bool {
        if self.roboted {
            return false;
        }
        self.roboted = true;
        self.robots = decision;
        true
    }

    /// Checks the cached robots.txt decision; hosts without one are fully allowed
    pub fn may_fetch(&self, url: &str, user_agent: &str) -> bool {
        self.robots
            .as_ref()
            .map_or(true, |robots| robots.is_allowed(url, user_agent))
    }

    /// Checks if this host has stored its full page quota
    pub fn quota_reached(&self, quota: u32) -> bool {
        self.page_count >= quota
    }
}
