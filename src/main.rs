//! Scholarship Finder
//!
//! Keeps the scholarship catalog fresh:
//! - loads the optional seed catalog
//! - scrapes the built-in listing sites once (`--once`) or on a schedule until Ctrl-C

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use scholarship_finder::config::load_config;
use scholarship_finder::engine::default_engine;
use scholarship_finder::ingest::{ingest_seed, IngestionJob, RunOutcome};
use scholarship_finder::storage::{load_seed_records, SqliteStore};
use scholarship_finder::logging;
use std::sync::Arc;
use tracing::{error, info};

/// Scholarship catalog ingestion
#[derive(Parser, Debug)]
#[command(name = "scholarship_finder")]
#[command(about = "Scrape, normalize and store scholarship listings", long_about = None)]
struct Cli {
    /// Run a single ingestion and exit instead of starting the schedule
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init()?;

    let root = std::env::var("ROOT").unwrap_or_else(|_| ".".to_string());

    let config = load_config(&root).context("Failed to load configuration")?;
    let store = Arc::new(SqliteStore::open(&root, &config.database_path.0)?);

    if let Some(seed_file) = &config.ingestion.seed_file {
        let records = load_seed_records(&root, seed_file)?;
        ingest_seed(store.as_ref(), &records, Utc::now())?;
    }

    let engine = default_engine(&config.scrape)?;
    info!(sources = ?engine.adapter_names(), "Registered scrape sources");

    let job = Arc::new(IngestionJob::new(engine, store.clone(), config.ingestion.interval_hours));

    if cli.once {
        match job.run_once().await {
            RunOutcome::Completed(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            RunOutcome::Failed(message) => error!(error = %message, "Ingestion run failed"),
            RunOutcome::Skipped => info!("Ingestion run skipped"),
        }
        println!("{}", serde_json::to_string_pretty(&job.status())?);
        return Ok(());
    }

    let scheduler = job.clone().start(config.ingestion.run_on_start);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested, waiting for any in-flight run");

    scheduler.shutdown().await?;

    for log in store.scrape_logs(5)? {
        info!(status = log.status_label(), timestamp = %log.timestamp().to_rfc3339(), "Recent scrape");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_once_flag() {
        assert!(Cli::try_parse_from(["scholarship_finder", "--once"]).unwrap().once);
        assert!(!Cli::try_parse_from(["scholarship_finder"]).unwrap().once);
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["scholarship_finder", "--onec"]).is_err());
        assert!(Cli::try_parse_from(["scholarship_finder", "--help"]).is_err());
    }
}
