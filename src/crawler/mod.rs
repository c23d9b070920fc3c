//! Crawler module for scheduling, fetching and processing pages
//!
//! This module contains the core crawling logic, including:
//! - The frontier, fetch history ring and admission filter
//! - The `Scheduler` aggregate that owns all crawl state
//! - HTTP fetching and HTML link extraction
//! - The crawl loop (`Coordinator`)

mod admission;
mod coordinator;
mod fetcher;
mod frontier;
mod history;
mod parser;
mod scheduler;

pub use admission::{AdmissionFilter, Rejection};
pub use coordinator::{run_crawl, Coordinator, CrawlSummary, LoopSettings, LoopState};
pub use fetcher::{
    build_http_client, ContentKind, FetchError, FetchedDocument, Fetcher, HttpFetcher,
};
pub use frontier::{Frontier, QueuedUrl};
pub use history::FetchHistory;
pub use parser::{extract_links, parse_html, ParsedPage};
pub use scheduler::{
    AttemptSnapshot, CrawlCounters, CrawlLimits, Scheduler, SuccessOutcome, TimeoutOutcome,
};
