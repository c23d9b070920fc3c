//! Robots.txt parser implementation
//!
//! This module provides functionality for parsing robots.txt content using the robotstxt crate.

use robotstxt::DefaultMatcher;
use serde::{Deserialize, Serialize};

/// Parsed robots.txt data
///
/// The raw content is kept so the decision survives a checkpoint round-trip; rules are
/// evaluated on demand by the robotstxt matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The crawler's product token (e.g. "SantaBot")
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Lists the `Sitemap:` URLs declared in the file
    pub fn sitemaps(&self) -> Vec<String> {
        self.content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.trim().split_once(':')?;
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    let value = value.trim();
                    (!value.is_empty()).then(|| value.to_string())
                } else {
                    None
                }
            })
            .collect()
    }
}
