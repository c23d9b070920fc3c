//! Breadth-first work queue of pending URLs
//!
//! The frontier owns both the pending sequence and the Visited set so that the two can never
//! overlap: a URL is moved to Visited when it is dequeued and only leaves it again through
//! [`Frontier::prepend_batch`].

use crate::state::HostPolicyStore;
use crate::url::host_key;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

/// A URL waiting in the frontier together with its host key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The canonical URL
    pub url: String,

    /// The politeness key of the URL (`scheme://host[:port]`)
    pub host: String,
}

impl QueuedUrl {
    /// Builds a queue entry, deriving the host key from the URL
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let host = host_key(&url).ok()?;
        Some(Self { url, host })
    }
}

/// Ordered, deduplicated queue of not-yet-fetched URLs plus the Visited set
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a frontier from checkpointed parts
    ///
    /// Callers are expected to have validated uniqueness and disjointness.
    pub(crate) fn from_parts(queue: Vec<QueuedUrl>, visited: HashSet<String>) -> Self {
        let queued = queue.iter().map(|entry| entry.url.clone()).collect();
        Self {
            queue: queue.into(),
            queued,
            visited,
        }
    }

    /// Appends `url` to the tail unless it is already queued or visited
    ///
    /// Returns true if the URL was added. URLs without a host are never queued.
    pub fn enqueue(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        let Some(entry) = QueuedUrl::new(url) else {
            return false;
        };
        self.queued.insert(entry.url.clone());
        self.queue.push_back(entry);
        true
    }

    /// Removes and returns the first URL whose host is not paused at `now`
    ///
    /// The returned URL is added to the Visited set. Entries of paused hosts keep their
    /// position, so a later URL of an unpaused host may be served first.
    pub fn dequeue(&mut self, policy: &HostPolicyStore, now: DateTime<Utc>) -> Option<QueuedUrl> {
        let position = {
            // One pause lookup per host per scan
            let mut paused: HashMap<&str, bool> = HashMap::new();
            self.queue.iter().position(|entry| {
                !*paused
                    .entry(entry.host.as_str())
                    .or_insert_with(|| policy.is_paused(&entry.host, now))
            })
        }?;

        let entry = self.queue.remove(position)?;
        self.queued.remove(&entry.url);
        self.visited.insert(entry.url.clone());
        tracing::trace!("Dequeued {} (position {})", entry.url, position);
        Some(entry)
    }

    /// Purges every queued URL of `host`, returning how many were removed
    pub fn remove_host(&mut self, host: &str) -> usize {
        let before = self.queue.len();
        let queued = &mut self.queued;
        self.queue.retain(|entry| {
            if entry.host == host {
                queued.remove(&entry.url);
                false
            } else {
                true
            }
        });
        before - self.queue.len()
    }

    /// Reinserts `urls` at the head in their given order and removes them from Visited
    ///
    /// URLs that are already queued are left where they are. Returns the number of URLs
    /// put back at the head.
    pub fn prepend_batch(&mut self, urls: &[String]) -> usize {
        let mut count = 0;
        for url in urls.iter().rev() {
            self.visited.remove(url);
            if self.queued.contains(url) {
                continue;
            }
            if let Some(entry) = QueuedUrl::new(url.as_str()) {
                self.queued.insert(entry.url.clone());
                self.queue.push_front(entry);
                count += 1;
            }
        }
        count
    }

    /// Checks whether `url` is queued or visited
    pub fn contains(&self, url: &str) -> bool {
        self.queued.contains(url) || self.visited.contains(url)
    }

    /// Checks whether `url` is waiting in the queue
    pub fn is_queued(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    /// Checks whether `url` has been dequeued
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Number of queued URLs
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of visited URLs
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// Queued entries in dequeue order
    pub fn iter(&self) -> impl Iterator<Item = &QueuedUrl> {
        self.queue.iter()
    }

    /// The Visited set
    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }
}
