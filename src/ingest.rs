//! Ingestion Job Module
//!
//! Periodic driver of the scrape pipeline:
//! - scrape all adapters, normalize, deduplicate
//! - insert only records whose id and dedup key are not stored yet
//! - append one scrape log per run, a failed entry when anything breaks
//! - single-flight: a run requested while another is in flight is skipped

use crate::engine::{collect_candidates, ScrapeEngine};
use crate::normalize::{deduplicate_with_stats, normalize_all};
use crate::storage::{CatalogIndex, ScholarshipStore};
use crate::types::{RawRecord, Scholarship, ScrapeLog, SourceOutcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_found: usize,
    pub duplicates_removed: usize,
    pub new_added: usize,
    pub sources: Vec<SourceOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another run was in flight
    Skipped,
    Completed(RunSummary),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatus {
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub interval_hours: u64,
}

pub struct IngestionJob {
    engine: ScrapeEngine,
    store: Arc<dyn ScholarshipStore>,
    interval_hours: u64,
    running: AtomicBool,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

/// Clears the running flag however the run ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IngestionJob {
    pub fn new(engine: ScrapeEngine, store: Arc<dyn ScholarshipStore>, interval_hours: u64) -> Self {
        Self {
            engine,
            store,
            interval_hours,
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.max(1) * 3600)
    }

    pub fn status(&self) -> IngestionStatus {
        IngestionStatus {
            is_running: self.running.load(Ordering::Acquire),
            last_run: self.last_run.lock().ok().and_then(|guard| *guard),
            interval_hours: self.interval_hours,
        }
    }

    /// One ingestion run. Never returns an error: failures become a failed scrape log.
    pub async fn run_once(&self) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Scrape already in progress, skipping");
            return RunOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        info!(started_at = %Utc::now().to_rfc3339(), "Starting scheduled scrape");

        match self.run_pipeline().await {
            Ok(summary) => {
                if let Ok(mut last_run) = self.last_run.lock() {
                    *last_run = Some(Utc::now());
                }
                info!(
                    total_found = summary.total_found,
                    new_added = summary.new_added,
                    "Scheduled scrape completed"
                );
                RunOutcome::Completed(summary)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, "Scheduled scrape failed");

                let log = ScrapeLog::Failed {
                    timestamp: Utc::now(),
                    error: message.clone(),
                };
                if let Err(log_err) = self.store.append_scrape_log(&log) {
                    error!(error = %format!("{:#}", log_err), "Failed to record failed scrape log");
                }
                RunOutcome::Failed(message)
            }
        }
    }

    async fn run_pipeline(&self) -> Result<RunSummary> {
        let results = self.engine.scrape_all().await;
        let candidates = collect_candidates(&results);
        let sources: Vec<SourceOutcome> = results.iter().map(|r| r.outcome()).collect();
        info!(total = candidates.len(), "Scraped scholarships from all sources");

        let now = Utc::now();
        let (unique, stats) = deduplicate_with_stats(normalize_all(&candidates, now));
        if stats.duplicates_removed > 0 {
            debug!(removed = stats.duplicates_removed, "Collapsed duplicate listings");
        }

        let index = self
            .store
            .catalog_index()
            .context("Failed to read existing scholarship ids")?;
        let fresh = select_new(&index, unique);

        let new_added = if fresh.is_empty() {
            info!("No new scholarships found");
            0
        } else {
            let inserted = self
                .store
                .insert_scholarships(&fresh)
                .context("Failed to insert new scholarships")?;
            info!(inserted, "Added new scholarships to database");
            inserted
        };

        let summary = RunSummary {
            total_found: candidates.len(),
            duplicates_removed: stats.duplicates_removed,
            new_added,
            sources,
        };

        self.store
            .append_scrape_log(&ScrapeLog::Completed {
                timestamp: Utc::now(),
                total_found: summary.total_found,
                new_added: summary.new_added,
                sources: summary.sources.clone(),
            })
            .context("Failed to append scrape log")?;

        Ok(summary)
    }

    /// Run now (optionally), then every interval until the handle is stopped
    pub fn start(self: Arc<Self>, run_on_start: bool) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.interval();
        info!(interval_hours = self.interval_hours, "Starting scheduled scraper");

        let task = tokio::spawn(async move {
            let first = if run_on_start {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // a stop request during the run takes effect once it returns
                        self.run_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Scheduled scraper stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Suppress future runs; an in-flight run finishes normally
    pub fn stop(&self) {
        if self.shutdown.send(true).is_err() {
            warn!("Scheduler already stopped");
        }
    }

    /// Stop and wait for the scheduler task to exit
    pub async fn shutdown(self) -> Result<()> {
        self.stop();
        self.task.await.context("Scheduler task panicked")?;
        Ok(())
    }
}

/// Drop records already persisted under the same id or dedup key
fn select_new(index: &CatalogIndex, unique: Vec<Scholarship>) -> Vec<Scholarship> {
    let mut seen = index.clone();
    unique
        .into_iter()
        .filter(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.insert(s);
                true
            }
        })
        .collect()
}

/// Normalize manually curated records and insert the ones not stored yet
pub fn ingest_seed(store: &dyn ScholarshipStore, records: &[RawRecord], now: DateTime<Utc>) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let (unique, _) = deduplicate_with_stats(normalize_all(records, now));
    let index = store.catalog_index().context("Failed to read existing scholarship ids")?;
    let fresh = select_new(&index, unique);
    let inserted = store
        .insert_scholarships(&fresh)
        .context("Failed to insert seed scholarships")?;

    info!(inserted, total = records.len(), "Seed catalog ingested");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DelayRange, RetryPolicy};
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn empty_engine() -> ScrapeEngine {
        ScrapeEngine::new(RetryPolicy::default(), DelayRange::fixed(Duration::ZERO), vec!["ua".into()])
    }

    #[tokio::test]
    async fn test_run_without_adapters_logs_completed() {
        let store = Arc::new(MemoryStore::new());
        let job = IngestionJob::new(empty_engine(), store.clone(), 24);

        let outcome = job.run_once().await;
        assert!(matches!(outcome, RunOutcome::Completed(ref s) if s.new_added == 0 && s.total_found == 0));

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status_label(), "completed");

        let status = job.status();
        assert!(!status.is_running);
        assert!(status.last_run.is_some());
        assert_eq!(status.interval_hours, 24);
    }

    #[test]
    fn test_ingest_seed_skips_existing_keys() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let records = vec![
            json!({"id": "seed-1", "title": "Fulbright", "university": "Various"}),
            json!({"id": "seed-2", "title": "fulbright ", "university": "various"}),
        ];

        assert_eq!(ingest_seed(&store, &records, now).unwrap(), 1);
        // same listing under a new id
        let again = vec![json!({"id": "seed-3", "title": "Fulbright", "university": "Various"})];
        assert_eq!(ingest_seed(&store, &again, now).unwrap(), 0);
        assert_eq!(store.scholarships().len(), 1);
    }
}
