//! Match Ranking Binary
//!
//! Scores the stored catalog against a profile read from JSON:
//! - default: match listing (score >= 40, top 20)
//! - `--catalog`: whole catalog by catalog relevance
//!
//! Usage: rank_matches <profile.json> [--catalog]

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use scholarship_finder::config::load_config;
use scholarship_finder::matching::{rank_by_relevance, rank_matches, RankedScholarship};
use scholarship_finder::storage::SqliteStore;
use scholarship_finder::types::Profile;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rank_matches")]
#[command(about = "Rank the stored scholarship catalog against a profile", long_about = None)]
struct Cli {
    /// Profile JSON file
    profile: PathBuf,

    /// Rank the whole catalog by relevance instead of listing matches
    #[arg(long)]
    catalog: bool,
}

fn print_ranked(ranked: &[RankedScholarship]) {
    for (i, r) in ranked.iter().enumerate() {
        let breakdown = r
            .match_breakdown
            .iter()
            .map(|(component, value)| format!("{}={:.1}", component, value))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>2}. [{:>3}] {} ({}, {}) {}",
            i + 1,
            r.match_score,
            r.scholarship.title,
            r.scholarship.university,
            r.scholarship.country,
            breakdown
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = std::env::var("ROOT").unwrap_or_else(|_| ".".to_string());

    let content = fs::read_to_string(&cli.profile)
        .with_context(|| format!("Failed to read profile from {}", cli.profile.display()))?;
    let profile: Profile = serde_json::from_str(&content)
        .with_context(|| "Failed to parse profile JSON")?;

    let config = load_config(&root)?;
    let store = SqliteStore::open(&root, &config.database_path.0)?;
    let catalog = store.all_scholarships()?;

    println!("=== Scholarship Matches ({} in catalog) ===", catalog.len());

    let ranked = if cli.catalog {
        rank_by_relevance(&profile, &catalog)
    } else {
        rank_matches(&profile, &catalog, Utc::now())
    };

    if ranked.is_empty() {
        println!("No matching scholarships.");
    } else {
        print_ranked(&ranked);
    }

    Ok(())
}
