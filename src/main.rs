//! Bazaar-Sweep main entry point
//!
//! This is the command-line interface for the Bazaar-Sweep marketplace crawler.

use anyhow::Context;
use bazaar_sweep::config::{load_config_with_hash, Config};
use bazaar_sweep::crawler::{
    discover_categories, run_link_scan, run_update_scan, scrape_product_details,
    scrape_seller_profiles, update_product_counts, ScanEnd, SiteClient,
};
use bazaar_sweep::output::{load_statistics, print_statistics};
use bazaar_sweep::storage::{open_storage, SqliteStorage};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Bazaar-Sweep: a classifieds marketplace crawler
///
/// Discovers the marketplace's category tree, enumerates every listing with
/// concurrent in-order page scans, and scrapes listing and seller pages into
/// a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "bazaar-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A classifieds marketplace crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the category tree
    Categories,

    /// Record the listing count of every category
    Counts,

    /// Scan every top-level category for listing links
    Links,

    /// Scrape detail pages of listings not yet scraped
    Details {
        /// Maximum listings to visit
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Scrape profile pages of known sellers
    Sellers,

    /// Scan listings updated recently
    Updates {
        /// Only listings updated within this many days
        #[arg(long)]
        days: Option<u32>,

        /// Only listings in this category
        #[arg(long)]
        category: Option<i64>,
    },

    /// Show statistics from the database
    Stats,

    /// Validate the configuration and print it
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

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

    match cli.command {
        Command::Check => handle_check(&config, &config_hash),
        Command::Stats => handle_stats(&config),
        Command::Categories => {
            let mut storage = open(&config)?;
            let client = SiteClient::new(&config.site, true)?;
            let summary = discover_categories(&client, &mut storage).await?;
            println!(
                "✓ {} categories discovered ({} new)",
                summary.discovered, summary.inserted
            );
            Ok(())
        }
        Command::Counts => {
            let mut storage = open(&config)?;
            let client = SiteClient::new(&config.site, true)?;
            let updated = update_product_counts(&client, &mut storage).await?;
            println!("✓ Counts updated for {} categories", updated);
            Ok(())
        }
        Command::Links => handle_links(&config, &config_hash).await,
        Command::Details { limit } => {
            let mut storage = open(&config)?;
            let client = SiteClient::new(&config.site, false)?;
            let summary = scrape_product_details(&client, &mut storage, limit).await?;
            println!(
                "✓ {} scraped, {} missing, {} failed",
                summary.scraped, summary.missing, summary.failed
            );
            Ok(())
        }
        Command::Sellers => {
            let mut storage = open(&config)?;
            let client = SiteClient::new(&config.site, true)?;
            let summary = scrape_seller_profiles(&client, &mut storage).await?;
            println!("✓ {} sellers updated, {} skipped", summary.updated, summary.skipped);
            Ok(())
        }
        Command::Updates { days, category } => {
            let mut storage = open(&config)?;
            match run_update_scan(&config, &config_hash, &mut storage, category, days).await? {
                Some(report) => println!(
                    "✓ {} pages, {} listings",
                    report.pages_delivered, report.products_delivered
                ),
                None => println!("Nothing to update: pass --days or --category"),
            }
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bazaar_sweep=info,warn"),
            1 => EnvFilter::new("bazaar_sweep=debug,info"),
            2 => EnvFilter::new("bazaar_sweep=trace,debug"),
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

fn open(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("opening database {}", path.display()))
}

/// Runs the link scan and reports per-category totals
async fn handle_links(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let mut storage = open(config)?;
    let scans = run_link_scan(config, config_hash, &mut storage).await?;

    let mut failed = 0;
    for scan in &scans {
        if let ScanEnd::Failed(reason) = &scan.report.end {
            failed += 1;
            tracing::warn!("{} ({}) ended early: {}", scan.name, scan.category_id, reason);
        }
    }

    let listings: u64 = scans.iter().map(|s| s.report.products_delivered).sum();
    println!(
        "✓ {} categories scanned, {} listings stored, {} ended on a failed page",
        scans.len(),
        listings,
        failed
    );
    Ok(())
}

/// Shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Prints the validated configuration
fn handle_check(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("=== Bazaar-Sweep Configuration ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  User agent: {}", config.site.user_agent);
    println!("  Request timeout: {}s", config.site.request_timeout_secs);
    println!(
        "  Retries: {} (backoff {}ms)",
        config.site.max_retries, config.site.retry_backoff_ms
    );

    println!("\nScan:");
    println!("  Link workers: {}", config.scan.link_workers);
    println!("  Update workers: {}", config.scan.update_workers);
    println!("  Page size: {}", config.scan.page_size);
    println!(
        "  Failure policy: {:?} ({} retries)",
        config.scan.failure_policy, config.scan.failure_retries
    );
    println!("  Probe first page: {}", config.scan.probe_first_page);
    match config.scan.update_days {
        Some(days) => println!("  Update window: {} days", days),
        None => println!("  Update window: none"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
    Ok(())
}
