//! bidsweep CLI
//!
//! Local execution entry point for crawling procurement portals.

use std::path::PathBuf;

use bidsweep::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    storage::{LocalStorage, RecordStorage},
    utils::get_domain,
};
use clap::{Parser, Subcommand};

/// bidsweep - Procurement Bid Scraper
#[derive(Parser, Debug)]
#[command(
    name = "bidsweep",
    version,
    about = "Scrapes procurement portals for open bid listings"
)]
struct Cli {
    /// Path to data directory containing config and stored records
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search a portal and harvest bid records
    Crawl {
        /// Search phrase to submit, e.g. "road construction"
        query: String,

        /// Named source pattern (default: first configured source)
        #[arg(short, long)]
        source: Option<String>,

        /// Stop after this many records, overriding the config
        #[arg(short, long)]
        target: Option<usize>,
    },

    /// Export stored records to CSV
    Export {
        /// Output file path
        #[arg(short, long, default_value = "bids.csv")]
        output: PathBuf,

        /// Export the cumulative archive instead of the latest crawl
        #[arg(long)]
        archive: bool,
    },

    /// Validate configuration and source patterns
    Validate,

    /// Show last crawl report and archive size
    Info,
}

/// Logging defaults to info; `--verbose` opens up debug.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("bidsweep starting...");

    let config_path = cli.data_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);

    match cli.command {
        Command::Crawl {
            query,
            source,
            target,
        } => {
            if let Some(target) = target {
                config.crawl.target_count = target;
            }

            let outcome =
                match pipeline::run_crawl(&config, source.as_deref(), &query, &cli.data_dir).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_browsing_failure() => {
                        log::error!("Could not reach the portal: {}", e);
                        log::error!(
                            "Check that Chrome is available, or set [browser] driver = \"http\""
                        );
                        return Err(e);
                    }
                    Err(e) => return Err(e),
                };

            for record in outcome.records.iter().take(5) {
                log::info!("  {} (due: {})", record.title, record.due_date);
            }
            if outcome.records.len() > 5 {
                log::info!("  ... and {} more", outcome.records.len() - 5);
            }

            if let Some(failure) = outcome.failure {
                return Err(AppError::browser("crawl", failure));
            }
        }

        Command::Export { output, archive } => {
            pipeline::run_export(&cli.data_dir, &output, archive).await?;
        }

        Command::Validate => {
            log::info!("Checking configuration...");

            if let Err(e) = config.validate() {
                log::error!("Configuration rejected: {}", e);
                return Err(e);
            }
            for source in &config.sources {
                let domain = get_domain(&source.start_url).unwrap_or_else(|| "?".to_string());
                log::info!("✓ Source '{}' OK ({})", source.name, domain);
            }

            log::info!("Configuration looks good!");
        }

        Command::Info => {
            log::info!("Data directory: {}", cli.data_dir.display());

            let storage = LocalStorage::new(&cli.data_dir);
            match storage.load_report().await? {
                Some(report) => {
                    log::info!(
                        "Last crawl: \"{}\" on '{}' ended with {}",
                        report.query,
                        report.source,
                        report.reason
                    );
                    if let Some(failure) = &report.failure {
                        log::warn!("Abort cause: {}", failure);
                    }
                    log::info!(
                        "  {} admitted, {} rejected, {} duplicate(s) over {} page(s)",
                        report.stats.admitted,
                        report.stats.rejected_total(),
                        report.stats.duplicates_skipped,
                        report.stats.pages_visited
                    );
                    log::info!("  finished at {}", report.finished_at);
                }
                None => log::info!("No crawl report found yet."),
            }

            let archive = storage.load_archive().await?;
            log::info!("Archive: {} record(s) total", archive.len());
        }
    }

    log::info!("Done!");

    Ok(())
}
