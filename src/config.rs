//! Configuration Module
//!
//! Loads `tracking/config.yml` under the project root, applies environment
//! overrides and repairs inconsistent values. A missing file means defaults.

use crate::engine::{DelayRange, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const CONFIG_FILE: &str = "tracking/config.yml";

/// Browser-like identities rotated across fetch attempts
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: DatabasePath,
    pub scrape: ScrapeConfig,
    pub ingestion: IngestionConfig,
}

/// Database location relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabasePath(pub String);

impl Default for DatabasePath {
    fn default() -> Self {
        DatabasePath("tracking/scholarships.db".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub user_agents: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 2000,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScrapeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn politeness_delay(&self) -> DelayRange {
        DelayRange::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub interval_hours: u64,
    pub run_on_start: bool,
    /// JSON array of manually curated records, relative to the root
    pub seed_file: Option<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_on_start: true,
            seed_file: Some("tracking/seed_scholarships.json".to_string()),
        }
    }
}

impl AppConfig {
    /// Repair values that would break the pipeline instead of rejecting the file
    pub fn validate(&mut self) {
        let scrape = &mut self.scrape;

        scrape.user_agents.retain(|ua| !ua.trim().is_empty());
        if scrape.user_agents.is_empty() {
            warn!("Empty user agent pool, using defaults");
            scrape.user_agents = DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect();
        }

        if scrape.min_delay_ms > scrape.max_delay_ms {
            warn!(
                min_delay_ms = scrape.min_delay_ms,
                max_delay_ms = scrape.max_delay_ms,
                "Politeness delay bounds reversed, swapping"
            );
            std::mem::swap(&mut scrape.min_delay_ms, &mut scrape.max_delay_ms);
        }

        if scrape.max_retries == 0 {
            scrape.max_retries = 1;
        }

        if self.ingestion.interval_hours == 0 {
            self.ingestion.interval_hours = IngestionConfig::default().interval_hours;
        }
    }

    /// Environment variables take precedence over the file
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database_path = DatabasePath(path);
        }
        if let Some(hours) = env_parse::<u64>("SCRAPE_INTERVAL_HOURS") {
            self.ingestion.interval_hours = hours;
        }
        if let Some(retries) = env_parse::<u32>("SCRAPE_MAX_RETRIES") {
            self.scrape.max_retries = retries;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn load_config(root: &str) -> Result<AppConfig> {
    let path = PathBuf::from(root).join(CONFIG_FILE);

    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        parse_config(&content)?
    } else {
        AppConfig::default()
    };

    config.apply_env_overrides();
    config.validate();
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = serde_yaml::from_str(content)
        .with_context(|| "Failed to parse config YAML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scrape.max_retries, 3);
        assert_eq!(config.scrape.base_delay_ms, 2000);
        assert_eq!(config.scrape.user_agents.len(), 5);
        assert_eq!(config.ingestion.interval_hours, 24);
        assert_eq!(config.database_path.0, "tracking/scholarships.db");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = parse_config("scrape:\n  max_retries: 5\ningestion:\n  interval_hours: 6\n").unwrap();
        assert_eq!(config.scrape.max_retries, 5);
        assert_eq!(config.scrape.min_delay_ms, 2000);
        assert_eq!(config.ingestion.interval_hours, 6);
        assert!(config.ingestion.run_on_start);
    }

    #[test]
    fn test_validate_repairs_values() {
        let mut config = parse_config(
            "scrape:\n  max_retries: 0\n  min_delay_ms: 9000\n  max_delay_ms: 1000\n  user_agents: ['  ']\n",
        )
        .unwrap();
        config.validate();
        assert_eq!(config.scrape.max_retries, 1);
        assert_eq!((config.scrape.min_delay_ms, config.scrape.max_delay_ms), (1000, 9000));
        assert_eq!(config.scrape.user_agents.len(), DEFAULT_USER_AGENTS.len());
    }
}
