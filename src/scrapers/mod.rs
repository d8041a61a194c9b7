mod listing;
mod sites;

pub use listing::{parse_listing, ListingAdapter, ListingItem, ListingSite};
pub use sites::{opportunity_desk, scholars4dev};

use crate::config::ScrapeConfig;
use crate::engine::DelayRange;
use crate::types::RawRecord;
use anyhow::Result;
use async_trait::async_trait;

/// Per-attempt request identity chosen by the engine
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub user_agent: String,
    pub attempt: u32,
}

/// One external scholarship-listing site.
///
/// `fetch_candidates` returns `Err` only for page-level failures (network, HTTP status,
/// unreadable body) so the engine can retry; items that cannot be extracted are skipped.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Stable source name recorded in provenance and scrape logs
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    async fn fetch_candidates(&self, ctx: &FetchContext) -> Result<Vec<RawRecord>>;

    /// Override for the pause taken after this adapter; `None` uses the engine default
    fn delay_policy(&self) -> Option<DelayRange> {
        None
    }
}

/// Built-in listing sites, in registration order
pub fn default_adapters(config: &ScrapeConfig) -> Result<Vec<Box<dyn SiteAdapter>>> {
    let adapters: Vec<Box<dyn SiteAdapter>> = vec![
        Box::new(ListingAdapter::new(scholars4dev(), config)?),
        Box::new(ListingAdapter::new(opportunity_desk(), config)?),
    ];
    Ok(adapters)
}
