//! Scoped-Crawl main entry point
//!
//! This is the command-line interface for the Scoped-Crawl crawler.

use anyhow::Context;
use clap::Parser;
use scoped_crawl::checkpoint::Checkpoint;
use scoped_crawl::config::{load_config_with_hash, Config};
use scoped_crawl::crawler::{run_crawl, AdmissionFilter, CrawlLimits, Scheduler};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Scoped-Crawl: a polite, resumable crawler bound to a domain suffix
///
/// Scoped-Crawl follows links within a wildcard domain scope while respecting
/// robots.txt, per-host throttling and timeout backoff. Interrupted crawls
/// resume from a checkpoint.
#[derive(Parser, Debug)]
#[command(name = "scoped-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable domain-scoped crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the global page limit
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,

    /// Override the per-host page quota
    #[arg(long, value_name = "N")]
    host_quota: Option<u32>,

    /// Resume from this checkpoint instead of the configured one
    #[arg(long, value_name = "PATH", conflicts_with = "fresh")]
    resume: Option<PathBuf>,

    /// Start a fresh crawl, ignoring any existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the crawl journal and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let limits = match CrawlLimits::from_config(&config)
        .with_overrides(cli.max_pages, cli.host_quota)
    {
        Ok(limits) => limits,
        Err(e) => {
            tracing::error!("Invalid command-line override: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &limits, &cli)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &config_hash, limits, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scoped_crawl=info,warn"),
            1 => EnvFilter::new("scoped_crawl=debug,info"),
            2 => EnvFilter::new("scoped_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Checkpoint to resume from, if any
///
/// `--resume` names one explicitly; otherwise the configured checkpoint is used when it
/// exists, unless `--fresh` was given.
fn resume_path(config: &Config, cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = &cli.resume {
        return Some(path.clone());
    }
    if cli.fresh {
        return None;
    }
    let path = PathBuf::from(&config.output.checkpoint_path);
    path.exists().then_some(path)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(
    config: &Config,
    limits: &CrawlLimits,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Scoped-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", limits.max_pages);
    println!("  Host page quota: {}", limits.host_page_quota);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  Pacing delay: {}ms", config.crawler.pacing_delay_ms);
    println!("  Checkpoint every: {} pages", config.crawler.checkpoint_every);

    let politeness = &limits.politeness;
    println!("\nPoliteness:");
    println!(
        "  Pause {}s after {} consecutive fetches from one host",
        politeness.fetch_pause_secs, politeness.fetch_pause_trigger
    );
    println!(
        "  Back off from {}s after {} consecutive timeouts",
        politeness.initial_timeout_pause_secs, politeness.timeout_pause_trigger
    );

    println!("\nUser Agent:");
    println!("  Header: {}", config.user_agent.header_value());
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Journal: {}", config.output.database_path);
    println!("  Pages: {}", config.output.pages_dir);
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!("\nScope: {}", config.scope.domain);
    println!(
        "Excluded extensions: {}",
        config.scope.excluded_extensions.len()
    );

    println!("\nSeeds ({}):", config.scope.seeds.len());
    for seed in &config.scope.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    match resume_path(config, cli) {
        Some(path) => println!("✓ Would resume from checkpoint {}", path.display()),
        None => println!(
            "✓ Would start crawling with {} seed URLs",
            config.scope.seeds.len()
        ),
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the crawl journal
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use scoped_crawl::output::{load_statistics, print_statistics};
    use scoped_crawl::storage::open_journal;

    println!("Journal: {}\n", config.output.database_path);

    let journal = open_journal(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&journal)?;
    print_statistics(&stats);

    Ok(())
}

/// Builds the scheduler, either restored from a checkpoint or seeded from the config
fn prepare_scheduler(
    config: &Config,
    config_hash: &str,
    limits: CrawlLimits,
    cli: &Cli,
) -> anyhow::Result<Scheduler> {
    let admission = AdmissionFilter::from_config(&config.scope);

    let Some(path) = resume_path(config, cli) else {
        tracing::info!("Starting fresh crawl from {} seeds", config.scope.seeds.len());
        let mut scheduler = Scheduler::new(limits, admission);
        let seeded = scheduler.seed(config.scope.seeds.iter().map(String::as_str));
        tracing::info!("Queued {} seed URLs", seeded);
        return Ok(scheduler);
    };

    let checkpoint = Checkpoint::load(&path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;

    if checkpoint.config_hash != config_hash {
        tracing::warn!(
            "Checkpoint {} was written under a different configuration (hash {}), resuming anyway",
            path.display(),
            checkpoint.config_hash
        );
    }
    if checkpoint.limits != limits {
        tracing::info!("Resuming with limits from the current configuration");
    }

    tracing::info!(
        "Resuming crawl from {} ({} queued, {} visited, written {})",
        path.display(),
        checkpoint.frontier.len(),
        checkpoint.visited.len(),
        checkpoint.created_at
    );

    checkpoint
        .restore(admission, limits)
        .with_context(|| format!("Checkpoint {} is inconsistent", path.display()))
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    limits: CrawlLimits,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = prepare_scheduler(config, config_hash, limits, cli)?;

    tracing::info!(
        "Scope: {}, max pages: {}, host quota: {}",
        config.scope.domain,
        limits.max_pages,
        limits.host_page_quota
    );

    // Ctrl-C stops the loop at the next iteration boundary
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, checkpointing and stopping");
            signal_token.cancel();
        }
    });

    match run_crawl(config, scheduler, config_hash, cancel).await {
        Ok(summary) => {
            if !cli.quiet {
                scoped_crawl::output::print_run_report(&summary);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
