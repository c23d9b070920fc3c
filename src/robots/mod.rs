//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt files. A host whose robots.txt cannot be
//! obtained for any reason is crawled as if it allowed everything.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::{ContentKind, Fetcher};

/// Fetches robots.txt for a host
///
/// # Arguments
///
/// * `fetcher` - The fetcher to issue the request with
/// * `host` - The host key (`scheme://host[:port]`)
///
/// # Returns
///
/// * `Some(ParsedRobots)` - robots.txt was served as plain text
/// * `None` - Missing, unreachable, timed out or not plain text (allow all)
pub async fn fetch_robots<F>(fetcher: &F, host: &str) -> Option<ParsedRobots>
where
    F: Fetcher + ?Sized,
{
    let robots_url = robots_url(host);
    match fetcher.fetch(&robots_url, ContentKind::PlainText).await {
        Ok(document) => {
            tracing::info!("Found robots.txt at {}", robots_url);
            Some(ParsedRobots::from_content(&document.body))
        }
        Err(e) => {
            tracing::debug!("No usable robots.txt at {}: {}", robots_url, e);
            None
        }
    }
}

/// The robots.txt location of a host key
pub fn robots_url(host: &str) -> String {
    format!("{}/robots.txt", host.trim_end_matches('/'))
}
