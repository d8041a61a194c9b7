use super::{FetchContext, SiteAdapter};
use crate::config::ScrapeConfig;
use crate::heuristics;
use crate::normalize::{generate_scholarship_id, truncate_chars};
use crate::types::RawRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use tracing::{debug, info};

const TITLE_MAX_CHARS: usize = 200;
const EXCERPT_MAX_CHARS: usize = 500;

/// Site-specific settings for a WordPress-style listing page
#[derive(Debug, Clone)]
pub struct ListingSite {
    pub name: String,
    /// Prefix of synthesized ids, e.g. "s4d"
    pub tag: String,
    pub base_url: String,
    pub listing_path: String,
    /// Item containers, most specific first
    pub item_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub excerpt_selectors: Vec<String>,
    pub date_selectors: Vec<String>,
    pub default_university: String,
}

impl ListingSite {
    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.listing_path)
    }

    /// Resolve a possibly relative item link against the site base
    pub fn absolute_link(&self, link: &str) -> String {
        if link.starts_with("http") {
            return link.to_string();
        }
        Url::parse(&self.base_url)
            .and_then(|base| base.join(link))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, link))
    }
}

/// Raw fields of one listing entry before heuristics run
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub title: String,
    pub link: String,
    pub excerpt: String,
    pub date_text: String,
}

/// Generic adapter: one GET of the listing page, CSS selection, heuristic extraction
pub struct ListingAdapter {
    site: ListingSite,
    client: Client,
}

impl ListingAdapter {
    pub fn new(site: ListingSite, config: &ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { site, client })
    }

    /// Parse a listing page into candidate records
    pub fn candidates_from_html(&self, html: &str, now: DateTime<Utc>) -> Vec<RawRecord> {
        parse_listing(&self.site, html)
            .iter()
            .map(|item| self.build_candidate(item, now))
            .collect()
    }

    pub fn build_candidate(&self, item: &ListingItem, now: DateTime<Utc>) -> RawRecord {
        let fields = heuristics::extract_fields(&item.title, &item.excerpt, &item.date_text, now);
        let link = self.site.absolute_link(&item.link);

        json!({
            "id": generate_scholarship_id(&self.site.tag),
            "title": truncate_chars(&item.title, TITLE_MAX_CHARS),
            "university": fields.university.unwrap_or_else(|| self.site.default_university.clone()),
            "country": fields.country,
            "fieldOfStudy": fields.field_of_study,
            "fundingType": fields.funding_type.as_str(),
            "amount": fields.amount,
            "deadline": fields.deadline.to_rfc3339(),
            "applicationFee": 0,
            "ieltsRequired": fields.ielts_required,
            "minGPA": 3.0,
            "description": truncate_chars(&item.excerpt, EXCERPT_MAX_CHARS),
            "benefits": fields.benefits,
            "requirements": fields.requirements,
            "applicationLink": link,
            "source": self.site.name,
            "sourceUrl": link,
            "lastScraped": now.to_rfc3339(),
            "isActive": true,
        })
    }
}

#[async_trait]
impl SiteAdapter for ListingAdapter {
    fn name(&self) -> &str {
        &self.site.name
    }

    fn base_url(&self) -> &str {
        &self.site.base_url
    }

    async fn fetch_candidates(&self, ctx: &FetchContext) -> Result<Vec<RawRecord>> {
        let url = self.site.listing_url();
        info!(source = %self.site.name, attempt = ctx.attempt, url = %url, "Fetching listing page");

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &ctx.user_agent)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(CACHE_CONTROL, "max-age=0")
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status.as_u16(), url);
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        let candidates = self.candidates_from_html(&html, Utc::now());
        info!(source = %self.site.name, count = candidates.len(), "Listing page parsed");

        Ok(candidates)
    }
}

/// Select listing items, trying each container selector until one yields usable items
pub fn parse_listing(site: &ListingSite, html: &str) -> Vec<ListingItem> {
    let document = Html::parse_document(html);

    for selector_str in &site.item_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        let items: Vec<ListingItem> = document
            .select(&selector)
            .filter_map(|element| extract_item(site, &element))
            .collect();

        if !items.is_empty() {
            debug!(source = %site.name, selector = %selector_str, count = items.len(), "Matched listing items");
            return items;
        }
    }

    Vec::new()
}

/// Title, link, excerpt and date text of one item; `None` when title or link is missing
fn extract_item(site: &ListingSite, element: &ElementRef) -> Option<ListingItem> {
    let (title, link) = site
        .title_selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            element.select(&sel).find_map(|anchor| {
                let title = element_text(&anchor);
                let href = anchor.value().attr("href")?.trim().to_string();
                if title.is_empty() || href.is_empty() {
                    None
                } else {
                    Some((title, href))
                }
            })
        })?;

    Some(ListingItem {
        title,
        link,
        excerpt: first_text(element, &site.excerpt_selectors),
        date_text: first_text(element, &site.date_selectors),
    })
}

fn first_text(element: &ElementRef, selectors: &[String]) -> String {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            element
                .select(&sel)
                .map(|el| element_text(&el))
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
