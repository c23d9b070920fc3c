//! Output module for crawl reports
//!
//! This module handles:
//! - Loading totals from the crawl journal (`--stats`)
//! - Printing the end-of-run report

pub mod stats;

pub use stats::{load_statistics, print_run_report, print_statistics, CrawlStatistics};
