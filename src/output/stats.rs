//! Statistics generation from the crawl journal
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::crawler::CrawlSummary;
use crate::storage::{HostRecord, Journal, PageOutcome, RunRecord, StorageResult};

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of recorded runs
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Attempts per outcome, in report order; zero counts are omitted
    pub outcomes: Vec<(PageOutcome, u64)>,

    /// Distinct hosts with at least one recorded attempt
    pub hosts_with_pages: u64,

    /// Hosts that serve robots.txt
    pub robots_hosts: Vec<HostRecord>,
}

impl CrawlStatistics {
    /// Total recorded attempts
    pub fn total_attempts(&self) -> u64 {
        self.outcomes.iter().map(|(_, count)| count).sum()
    }

    /// Attempts with the given outcome
    pub fn count(&self, outcome: PageOutcome) -> u64 {
        self.outcomes
            .iter()
            .find(|(o, _)| *o == outcome)
            .map_or(0, |(_, count)| *count)
    }

    /// Sitemap URLs declared across all robots.txt files
    pub fn sitemaps(&self) -> impl Iterator<Item = &str> {
        self.robots_hosts
            .iter()
            .flat_map(|record| record.sitemaps.iter().map(String::as_str))
    }
}

/// Loads statistics from the journal
///
/// # Arguments
///
/// * `journal` - The journal to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics<J: Journal + ?Sized>(journal: &J) -> StorageResult<CrawlStatistics> {
    let total_runs = journal.count_runs()?;
    let latest_run = journal.get_latest_run()?;

    let summary = journal.get_outcome_summary()?;
    let outcomes = PageOutcome::ALL
        .into_iter()
        .filter_map(|outcome| {
            summary
                .get(&outcome)
                .copied()
                .filter(|count| *count > 0)
                .map(|count| (outcome, count))
        })
        .collect();

    let hosts_with_pages = journal.count_hosts_with_pages()?;
    let robots_hosts = journal.get_robots_hosts()?;

    Ok(CrawlStatistics {
        total_runs,
        latest_run,
        outcomes,
        hosts_with_pages,
        robots_hosts,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.total_runs);
    if let Some(run) = &stats.latest_run {
        println!(
            "  Latest run: #{} started {} ({})",
            run.id,
            run.started_at,
            run.status.to_db_string()
        );
    }
    println!("  Fetch attempts: {}", stats.total_attempts());
    println!("  Hosts attempted: {}", stats.hosts_with_pages);
    println!();

    let total = stats.total_attempts();
    if total > 0 {
        println!("Attempts by Outcome:");
        for (outcome, count) in &stats.outcomes {
            let percentage = (*count as f64 / total as f64) * 100.0;
            println!(
                "  {}: {} ({:.1}%)",
                outcome.to_db_string(),
                count,
                percentage
            );
        }
        println!();
    }

    if !stats.robots_hosts.is_empty() {
        println!("Hosts with robots.txt ({}):", stats.robots_hosts.len());
        for record in &stats.robots_hosts {
            println!("  - {}", record.host);
        }
        println!();
    }

    let sitemaps: Vec<&str> = stats.sitemaps().collect();
    if !sitemaps.is_empty() {
        println!("Sitemaps ({}):", sitemaps.len());
        for sitemap in sitemaps {
            println!("  - {}", sitemap);
        }
        println!();
    }

    let stored = stats.count(PageOutcome::Stored);
    let success_rate = if total > 0 {
        (stored as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} attempts stored)",
        success_rate, stored, total
    );
}

/// Prints the end-of-run report for a finished or interrupted crawl
pub fn print_run_report(summary: &CrawlSummary) {
    let heading = if summary.interrupted {
        "Crawl interrupted"
    } else {
        "Crawl complete"
    };
    let counters = &summary.counters;

    println!("\n=== {} ===", heading);
    println!("  Pages stored:     {}", counters.stored);
    println!("  Timeouts:         {}", counters.timeouts);
    println!("  Requeued:         {}", counters.requeued);
    println!("  Failures:         {}", counters.failures);
    println!("  Robots denied:    {}", counters.denied);
    println!("  URLs visited:     {}", summary.visited);
    println!("  URLs still queued: {}", summary.queued);
    println!("  Elapsed:          {:.1}s", summary.elapsed.as_secs_f64());
}
