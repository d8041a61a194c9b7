//! Scrape Engine Module
//!
//! Runs registered site adapters one after another:
//! - Bounded retries with exponential backoff per adapter
//! - Fresh user agent for every attempt
//! - Randomized politeness pause between adapters
//! - Failure isolation: an exhausted adapter yields an empty result with its error

use crate::config::ScrapeConfig;
use crate::scrapers::{FetchContext, SiteAdapter};
use crate::types::{RawRecord, SourceOutcome};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Fallback identity when the configured pool is empty
const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (compatible; ScholarshipFinder/1.0)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per adapter, including the first
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt `attempt` (1-based): base * 2^(attempt-1)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Inclusive range a randomized pause is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self { min: delay, max: delay }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min >= max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Outcome of one adapter within a batch
#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub source: String,
    pub scholarships: Vec<RawRecord>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl AdapterResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn outcome(&self) -> SourceOutcome {
        SourceOutcome {
            source: self.source.clone(),
            count: self.count,
            error: self.error.clone(),
        }
    }
}

pub struct ScrapeEngine {
    adapters: Vec<Box<dyn SiteAdapter>>,
    retry: RetryPolicy,
    politeness: DelayRange,
    user_agents: Vec<String>,
}

impl ScrapeEngine {
    pub fn new(retry: RetryPolicy, politeness: DelayRange, user_agents: Vec<String>) -> Self {
        Self {
            adapters: Vec::new(),
            retry,
            politeness,
            user_agents,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.retry_policy(),
            config.politeness_delay(),
            config.user_agents.clone(),
        )
    }

    /// Adapters run in registration order
    pub fn register(&mut self, adapter: Box<dyn SiteAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn with_adapters(mut self, adapters: Vec<Box<dyn SiteAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Run every adapter sequentially; one entry per adapter, in registration order
    pub async fn scrape_all(&self) -> Vec<AdapterResult> {
        let mut results = Vec::with_capacity(self.adapters.len());
        info!(adapters = self.adapters.len(), "Starting scrape batch");

        for (index, adapter) in self.adapters.iter().enumerate() {
            let result = self.run_with_retry(adapter.as_ref()).await;

            match &result.error {
                None => info!(source = %result.source, count = result.count, attempts = result.attempts, "Source scraped"),
                Some(e) => warn!(
                    source = %result.source,
                    url = adapter.base_url(),
                    attempts = result.attempts,
                    error = %e,
                    "Source exhausted retries"
                ),
            }
            results.push(result);

            if index + 1 < self.adapters.len() {
                let delay = adapter.delay_policy().unwrap_or(self.politeness).sample();
                tokio::time::sleep(delay).await;
            }
        }

        let total: usize = results.iter().map(|r| r.count).sum();
        info!(total, "Scrape batch finished");
        results
    }

    /// Attempt one adapter up to `max_retries` times
    pub async fn run_with_retry(&self, adapter: &dyn SiteAdapter) -> AdapterResult {
        let max_attempts = self.retry.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let ctx = FetchContext {
                user_agent: self.pick_user_agent(),
                attempt,
            };

            match adapter.fetch_candidates(&ctx).await {
                Ok(scholarships) => {
                    return AdapterResult {
                        source: adapter.name().to_string(),
                        count: scholarships.len(),
                        scholarships,
                        timestamp: Utc::now(),
                        error: None,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    warn!(
                        source = adapter.name(),
                        attempt,
                        max_attempts,
                        error = %last_error,
                        "Scrape attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        AdapterResult {
            source: adapter.name().to_string(),
            scholarships: Vec::new(),
            count: 0,
            timestamp: Utc::now(),
            error: Some(last_error),
            attempts: max_attempts,
        }
    }

    fn pick_user_agent(&self) -> String {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }
}

/// Concatenate every adapter's candidates, ignoring per-source errors
pub fn collect_candidates(results: &[AdapterResult]) -> Vec<RawRecord> {
    results
        .iter()
        .flat_map(|r| r.scholarships.iter().cloned())
        .collect()
}

/// Convenience for callers that only need the default adapter set
pub fn default_engine(config: &ScrapeConfig) -> Result<ScrapeEngine> {
    let adapters = crate::scrapers::default_adapters(config)?;
    Ok(ScrapeEngine::from_config(config).with_adapters(adapters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    struct FlakyAdapter {
        name: String,
        fail_times: u32,
        calls: Arc<Mutex<Vec<(Instant, FetchContext)>>>,
    }

    impl FlakyAdapter {
        fn new(name: &str, fail_times: u32) -> (Self, Arc<Mutex<Vec<(Instant, FetchContext)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name: name.to_string(),
                    fail_times,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl SiteAdapter for FlakyAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn base_url(&self) -> &str {
            "https://example.org"
        }

        async fn fetch_candidates(&self, ctx: &FetchContext) -> Result<Vec<RawRecord>> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((Instant::now(), ctx.clone()));
                calls.len() as u32
            };
            if attempt <= self.fail_times {
                anyhow::bail!("HTTP 503 from {}", self.name);
            }
            Ok(vec![json!({"title": format!("{} award", self.name), "university": "X"})])
        }
    }

    fn engine() -> ScrapeEngine {
        ScrapeEngine::new(
            RetryPolicy::default(),
            DelayRange::fixed(Duration::from_millis(3000)),
            vec!["agent-a".to_string(), "agent-b".to_string()],
        )
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let range = DelayRange::new(Duration::from_millis(5000), Duration::from_millis(2000));
        assert_eq!(range.min, Duration::from_millis(2000));
        for _ in 0..50 {
            let d = range.sample();
            assert!(d >= range.min && d <= range.max);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_adapter_attempts_exactly_max_retries() {
        let (adapter, calls) = FlakyAdapter::new("broken", u32::MAX);
        let mut engine = engine();
        engine.register(Box::new(adapter));

        let results = engine.scrape_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 0);
        assert!(results[0].scholarships.is_empty());
        assert!(results[0].error.as_deref().unwrap().contains("HTTP 503"));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0 - calls[0].0, Duration::from_millis(2000));
        assert_eq!(calls[2].0 - calls[1].0, Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_later_attempt() {
        let (adapter, calls) = FlakyAdapter::new("flaky", 1);
        let engine = engine();

        let result = engine.run_with_retry(&adapter).await;
        assert!(result.is_success());
        assert_eq!(result.count, 1);
        assert_eq!(result.attempts, 2);

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].1.attempt, 1);
        assert_eq!(calls[1].1.attempt, 2);
        for (_, ctx) in calls.iter() {
            assert!(["agent-a", "agent-b"].contains(&ctx.user_agent.as_str()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_isolated_and_order_preserved() {
        let (broken, _) = FlakyAdapter::new("broken", u32::MAX);
        let (healthy, healthy_calls) = FlakyAdapter::new("healthy", 0);
        let mut engine = engine();
        engine.register(Box::new(broken));
        engine.register(Box::new(healthy));

        assert_eq!(engine.adapter_names(), vec!["broken", "healthy"]);

        let start = Instant::now();
        let results = engine.scrape_all().await;
        assert_eq!(results[0].source, "broken");
        assert!(!results[0].is_success());
        assert_eq!(results[1].source, "healthy");
        assert_eq!(results[1].count, 1);
        assert_eq!(collect_candidates(&results).len(), 1);

        // 2s + 4s backoff, then one 3s politeness pause before the second adapter
        let healthy_start = healthy_calls.lock().unwrap()[0].0;
        assert_eq!(healthy_start - start, Duration::from_millis(9000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_user_agent_pool_uses_fallback() {
        let (adapter, calls) = FlakyAdapter::new("solo", 0);
        let engine = ScrapeEngine::new(RetryPolicy::default(), DelayRange::fixed(Duration::ZERO), Vec::new());
        engine.run_with_retry(&adapter).await;
        assert_eq!(calls.lock().unwrap()[0].1.user_agent, FALLBACK_USER_AGENT);
    }
}
