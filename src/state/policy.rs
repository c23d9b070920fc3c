//! Host policy store
//!
//! Centralizes every per-host gating decision: robots.txt, consecutive-fetch throttling,
//! exponential timeout backoff and page quotas. Host entries are created lazily on first
//! reference and are only removed when an aborted attempt is rolled back.

use crate::config::PolitenessConfig;
use crate::robots::ParsedRobots;
use crate::state::HostState;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Longest pause `chrono::Duration::seconds` can represent
const MAX_PAUSE_SECS: u64 = (i64::MAX / 1_000) as u64;

/// Per-host politeness counters and robots decisions
#[derive(Debug, Clone)]
pub struct HostPolicyStore {
    hosts: HashMap<String, HostState>,
    politeness: PolitenessConfig,
    host_page_quota: u32,
}

impl HostPolicyStore {
    /// Creates an empty store
    pub fn new(politeness: PolitenessConfig, host_page_quota: u32) -> Self {
        Self::from_states(politeness, host_page_quota, HashMap::new())
    }

    /// Creates a store from previously captured host states (for resume)
    pub fn from_states(
        politeness: PolitenessConfig,
        host_page_quota: u32,
        hosts: HashMap<String, HostState>,
    ) -> Self {
        Self {
            hosts,
            politeness,
            host_page_quota,
        }
    }

    /// Read-only view of one host's state
    pub fn get(&self, host: &str) -> Option<&HostState> {
        self.hosts.get(host)
    }

    /// Read-only view of every known host (for checkpoints and reports)
    pub fn states(&self) -> &HashMap<String, HostState> {
        &self.hosts
    }

    /// Puts back a host state captured earlier; `None` forgets the host
    pub(crate) fn restore_state(&mut self, host: &str, state: Option<HostState>) {
        match state {
            Some(state) => {
                self.hosts.insert(host.to_string(), state);
            }
            None => {
                self.hosts.remove(host);
            }
        }
    }

    fn entry(&mut self, host: &str) -> &mut HostState {
        self.hosts.entry(host.to_string()).or_default()
    }

    /// Whether robots.txt has been decided for `host`
    pub fn is_roboted(&self, host: &str) -> bool {
        self.hosts.get(host).map_or(false, |state| state.roboted)
    }

    /// Records the robots.txt decision for `host`; idempotent after the first call
    ///
    /// `None` records "no robots.txt" which allows everything.
    pub fn record_robots_decision(&mut self, host: &str, decision: Option<ParsedRobots>) -> bool {
        self.entry(host).record_robots(decision)
    }

    /// Checks whether `url` may be fetched under the host's cached robots decision
    pub fn may_fetch(&self, host: &str, url: &str, user_agent: &str) -> bool {
        self.hosts
            .get(host)
            .map_or(true, |state| state.may_fetch(url, user_agent))
    }

    /// Checks whether `host` is inside a pause window at `now`
    pub fn is_paused(&self, host: &str, now: DateTime<Utc>) -> bool {
        self.hosts
            .get(host)
            .map_or(false, |state| state.is_paused(now))
    }

    /// Checks whether `host` has stored its full page quota
    pub fn quota_reached(&self, host: &str) -> bool {
        self.hosts
            .get(host)
            .map_or(false, |state| state.quota_reached(self.host_page_quota))
    }

    /// Updates the consecutive-fetch counters after `host` was dequeued
    ///
    /// The counter grows while the same host is dequeued back to back; switching hosts
    /// restarts it at 1 and clears the previous host's counter. Reaching the fetch-pause
    /// trigger pauses the host for `fetch_pause_secs` and restarts its counter.
    ///
    /// Returns true if the host was paused by this call.
    pub fn on_dequeue(
        &mut self,
        host: &str,
        previous_host: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let trigger = self.politeness.fetch_pause_trigger;
        let pause = Duration::seconds(clamp_secs(self.politeness.fetch_pause_secs));

        match previous_host {
            Some(previous) if previous == host => {
                self.entry(host).consecutive_fetch_count += 1;
            }
            other => {
                if let Some(previous) = other {
                    if let Some(state) = self.hosts.get_mut(previous) {
                        state.consecutive_fetch_count = 0;
                    }
                }
                self.entry(host).consecutive_fetch_count = 1;
            }
        }

        let state = self.entry(host);
        if state.consecutive_fetch_count >= trigger {
            state.consecutive_fetch_count = 0;
            let until = state.pause(now, pause);
            tracing::info!(
                "Host {} fetched {} times in a row, paused until {}",
                host,
                trigger,
                until
            );
            return true;
        }
        false
    }

    /// Updates the consecutive-timeout counters after a fetch from `host` timed out
    ///
    /// Reaching the timeout-pause trigger restarts the counter, raises the host's
    /// escalation level and pauses it for `initial_timeout_pause_secs * 2^(level - 1)`.
    /// The escalation level is never lowered within a run.
    ///
    /// Returns true if the host was paused by this call.
    pub fn on_timeout(
        &mut self,
        host: &str,
        previous_host: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let trigger = self.politeness.timeout_pause_trigger;

        match previous_host {
            Some(previous) if previous == host => {
                self.entry(host).consecutive_timeout_count += 1;
            }
            other => {
                if let Some(previous) = other {
                    if let Some(state) = self.hosts.get_mut(previous) {
                        state.consecutive_timeout_count = 0;
                    }
                }
                self.entry(host).consecutive_timeout_count = 1;
            }
        }

        if self.entry(host).consecutive_timeout_count < trigger {
            return false;
        }

        let escalation = {
            let state = self.entry(host);
            state.consecutive_timeout_count = 0;
            state.timeout_pause_escalation = state.timeout_pause_escalation.saturating_add(1);
            state.timeout_pause_escalation
        };
        let pause = self.timeout_pause_duration(escalation);
        let until = self.entry(host).pause(now, pause);
        tracing::warn!(
            "Host {} timed out {} times in a row (escalation {}), paused until {}",
            host,
            trigger,
            escalation,
            until
        );
        true
    }

    /// Records a stored page for `host`
    ///
    /// Clears the timeout counters of `host` and of the previously fetched host, then
    /// counts the page. Returns true once the host has reached its quota, meaning its
    /// remaining frontier entries should be purged.
    pub fn on_success(&mut self, host: &str, previous_host: Option<&str>) -> bool {
        if let Some(previous) = previous_host {
            if let Some(state) = self.hosts.get_mut(previous) {
                state.consecutive_timeout_count = 0;
            }
        }

        let quota = self.host_page_quota;
        let state = self.entry(host);
        state.consecutive_timeout_count = 0;
        state.page_count = state.page_count.saturating_add(1);
        state.quota_reached(quota)
    }

    /// The pause applied at a given timeout escalation level (1-based)
    pub fn timeout_pause_duration(&self, escalation: u32) -> Duration {
        let factor = 1u64
            .checked_shl(escalation.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let secs = self
            .politeness
            .initial_timeout_pause_secs
            .saturating_mul(factor);
        Duration::seconds(clamp_secs(secs))
    }
}

fn clamp_secs(secs: u64) -> i64 {
    secs.min(MAX_PAUSE_SECS) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const A: &str = "https://a.ku.ac.th";
    const B: &str = "https://b.ku.ac.th";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store() -> HostPolicyStore {
        HostPolicyStore::new(
            PolitenessConfig {
                fetch_pause_trigger: 5,
                fetch_pause_secs: 60,
                timeout_pause_trigger: 3,
                initial_timeout_pause_secs: 10,
            },
            2,
        )
    }

    #[test]
    fn test_unknown_host_defaults() {
        let store = store();
        assert!(!store.is_roboted(A));
        assert!(store.may_fetch(A, "https://a.ku.ac.th/x", "SantaBot"));
        assert!(!store.is_paused(A, at(0)));
        assert!(!store.quota_reached(A));
        assert!(store.get(A).is_none());
    }

    #[test]
    fn test_robots_decision_is_idempotent() {
        let mut store = store();
        let deny = ParsedRobots::from_content("User-agent: *\nDisallow: /private");

        assert!(store.record_robots_decision(A, Some(deny)));
        assert!(!store.record_robots_decision(A, None));
        assert!(store.is_roboted(A));
        assert!(!store.may_fetch(A, "https://a.ku.ac.th/private/x", "SantaBot"));
        assert!(store.may_fetch(A, "https://a.ku.ac.th/public", "SantaBot"));
    }

    #[test]
    fn test_missing_robots_allows_all() {
        let mut store = store();
        store.record_robots_decision(A, None);
        assert!(store.is_roboted(A));
        assert!(store.may_fetch(A, "https://a.ku.ac.th/anything", "SantaBot"));
    }

    #[test]
    fn test_fetch_trigger_pauses_exactly_once() {
        let mut store = store();
        let mut previous: Option<&str> = None;
        let mut pauses = 0;

        for i in 0..5 {
            assert!(!store.is_paused(A, at(i)));
            if store.on_dequeue(A, previous, at(i)) {
                pauses += 1;
            }
            previous = Some(A);
        }

        assert_eq!(pauses, 1);
        assert_eq!(store.get(A).unwrap().paused_until, Some(at(4 + 60)));
        assert!(store.is_paused(A, at(5)));
        assert!(!store.is_paused(A, at(64)));
        assert_eq!(store.get(A).unwrap().consecutive_fetch_count, 0);
    }

    #[test]
    fn test_switching_hosts_resets_fetch_counters() {
        let mut store = store();
        store.on_dequeue(A, None, at(0));
        store.on_dequeue(A, Some(A), at(1));
        store.on_dequeue(A, Some(A), at(2));
        assert_eq!(store.get(A).unwrap().consecutive_fetch_count, 3);

        store.on_dequeue(B, Some(A), at(3));
        assert_eq!(store.get(A).unwrap().consecutive_fetch_count, 0);
        assert_eq!(store.get(B).unwrap().consecutive_fetch_count, 1);

        // Interleaving never reaches the trigger
        for i in 0..10 {
            let (host, previous) = if i % 2 == 0 { (A, B) } else { (B, A) };
            assert!(!store.on_dequeue(host, Some(previous), at(4 + i)));
        }
    }

    #[test]
    fn test_timeout_trigger_and_escalation() {
        let mut store = store();

        assert!(!store.on_timeout(A, None, at(0)));
        assert!(!store.on_timeout(A, Some(A), at(1)));
        assert!(store.on_timeout(A, Some(A), at(2)));

        let state = store.get(A).unwrap();
        assert_eq!(state.consecutive_timeout_count, 0);
        assert_eq!(state.timeout_pause_escalation, 1);
        assert_eq!(state.paused_until, Some(at(2 + 10)));
    }

    #[test]
    fn test_backoff_doubles_per_trigger() {
        let mut store = store();
        let mut now = 0;

        for n in 1..=6u32 {
            for _ in 0..3 {
                store.on_timeout(A, Some(A), at(now));
            }
            let expected = 10 * 2i64.pow(n - 1);
            assert_eq!(store.get(A).unwrap().paused_until, Some(at(now + expected)));
            assert_eq!(store.get(A).unwrap().timeout_pause_escalation, n);
            // Wait out the pause before the next round
            now += expected;
        }
    }

    #[test]
    fn test_timeout_pause_duration() {
        let store = store();
        assert_eq!(store.timeout_pause_duration(1), Duration::seconds(10));
        assert_eq!(store.timeout_pause_duration(2), Duration::seconds(20));
        assert_eq!(store.timeout_pause_duration(5), Duration::seconds(160));
        // Saturates instead of overflowing
        assert_eq!(
            store.timeout_pause_duration(200),
            Duration::seconds(MAX_PAUSE_SECS as i64)
        );
    }

    #[test]
    fn test_timeout_on_other_host_resets_previous() {
        let mut store = store();
        store.on_timeout(A, None, at(0));
        store.on_timeout(A, Some(A), at(1));
        store.on_timeout(B, Some(A), at(2));

        assert_eq!(store.get(A).unwrap().consecutive_timeout_count, 0);
        assert_eq!(store.get(B).unwrap().consecutive_timeout_count, 1);
        assert!(!store.is_paused(A, at(3)));
    }

    #[test]
    fn test_success_clears_timeouts_but_not_escalation() {
        let mut store = store();
        for i in 0..3 {
            store.on_timeout(A, Some(A), at(i));
        }
        store.on_timeout(A, Some(A), at(100));
        assert_eq!(store.get(A).unwrap().consecutive_timeout_count, 1);

        store.on_success(A, Some(A));
        let state = store.get(A).unwrap();
        assert_eq!(state.consecutive_timeout_count, 0);
        assert_eq!(state.timeout_pause_escalation, 1);

        // The next trigger keeps escalating
        for i in 0..3 {
            store.on_timeout(A, Some(A), at(200 + i));
        }
        assert_eq!(store.get(A).unwrap().timeout_pause_escalation, 2);
        assert_eq!(store.get(A).unwrap().paused_until, Some(at(202 + 20)));
    }

    #[test]
    fn test_success_clears_previous_host_timeouts() {
        let mut store = store();
        store.on_timeout(A, None, at(0));
        store.on_success(B, Some(A));
        assert_eq!(store.get(A).unwrap().consecutive_timeout_count, 0);
    }

    #[test]
    fn test_success_counts_pages_until_quota() {
        let mut store = store();
        assert!(!store.on_success(A, None));
        assert!(!store.quota_reached(A));
        assert!(store.on_success(A, Some(A)));
        assert!(store.quota_reached(A));
        assert_eq!(store.get(A).unwrap().page_count, 2);
    }
}
