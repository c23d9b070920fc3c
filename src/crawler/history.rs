use std::collections::VecDeque;

/// Bounded, most-recent-first record of attempted URLs
///
/// Its capacity equals the timeout-pause trigger: when a host is paused for repeated
/// timeouts, the ring holds exactly the attempts presumed lost to that host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl FetchHistory {
    /// Creates an empty ring; a zero capacity is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a ring from most-recent-first entries, keeping the newest `capacity`
    pub fn from_entries(capacity: usize, entries: Vec<String>) -> Self {
        let mut history = Self::new(capacity);
        history
            .entries
            .extend(entries.into_iter().take(history.capacity));
        history
    }

    /// Records an attempt, evicting the oldest entry when full
    pub fn record(&mut self, url: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(url.to_string());
    }

    /// Empties the ring, returning its contents oldest first
    pub fn drain_oldest_first(&mut self) -> Vec<String> {
        self.entries.drain(..).rev().collect()
    }

    /// Entries, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(history: &FetchHistory) -> Vec<&str> {
        history.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_most_recent_first() {
        let mut history = FetchHistory::new(3);
        history.record("a");
        history.record("b");
        assert_eq!(entries(&history), vec!["b", "a"]);
    }

    #[test]
    fn test_capacity_bound() {
        let mut history = FetchHistory::new(3);
        for url in ["a", "b", "c", "d", "e"] {
            history.record(url);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(entries(&history), vec!["e", "d", "c"]);
    }

    #[test]
    fn test_drain_oldest_first() {
        let mut history = FetchHistory::new(3);
        for url in ["a", "b", "c", "d"] {
            history.record(url);
        }
        assert_eq!(history.drain_oldest_first(), vec!["b", "c", "d"]);
        assert!(history.is_empty());
    }

    #[test]
    fn test_from_entries_truncates() {
        let history = FetchHistory::from_entries(
            2,
            vec!["d".to_string(), "c".to_string(), "b".to_string()],
        );
        assert_eq!(entries(&history), vec!["d", "c"]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut history = FetchHistory::new(0);
        history.record("a");
        history.record("b");
        assert_eq!(history.capacity(), 1);
        assert_eq!(entries(&history), vec!["b"]);
    }
}
