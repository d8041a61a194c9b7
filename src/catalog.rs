//! Catalog Query Module
//!
//! Filtering, sorting and pagination over the canonical scholarship records:
//! - country / field membership, IELTS and application-fee exclusion
//! - deadline windows, GPA floor, funding type, free-text search
//! - sort by deadline, recency or award value
//! - facet values for filter menus

use crate::types::{FundingType, Scholarship};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeadlineWindow {
    #[default]
    #[serde(rename = "all")]
    All,
    /// Next 30 days
    #[serde(rename = "upcoming")]
    Upcoming,
    #[serde(rename = "60days")]
    Days60,
    #[serde(rename = "90days")]
    Days90,
}

impl DeadlineWindow {
    pub fn days(&self) -> Option<i64> {
        match self {
            DeadlineWindow::All => None,
            DeadlineWindow::Upcoming => Some(30),
            DeadlineWindow::Days60 => Some(60),
            DeadlineWindow::Days90 => Some(90),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Soonest deadline first
    #[default]
    Deadline,
    /// Most recently scraped first
    Recent,
    /// Largest award first
    Funding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogQuery {
    pub countries: Vec<String>,
    pub fields: Vec<String>,
    #[serde(rename = "excludeIELTS")]
    pub exclude_ielts: bool,
    pub exclude_app_fee: bool,
    pub deadline: DeadlineWindow,
    pub gpa_minimum: Option<f64>,
    pub funding_type: Option<FundingType>,
    pub search: Option<String>,
    pub sort_by: SortBy,
    /// 1-based
    pub page: usize,
    pub limit: usize,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            countries: Vec::new(),
            fields: Vec::new(),
            exclude_ielts: false,
            exclude_app_fee: false,
            deadline: DeadlineWindow::All,
            gpa_minimum: None,
            funding_type: None,
            search: None,
            sort_by: SortBy::Deadline,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CatalogQuery {
    /// Parse a comma-separated filter value ("USA, UK") into trimmed entries
    pub fn split_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn matches(&self, s: &Scholarship, now: DateTime<Utc>) -> bool {
        if !self.countries.is_empty()
            && !self.countries.iter().any(|c| c.eq_ignore_ascii_case(&s.country))
        {
            return false;
        }

        if !self.fields.is_empty()
            && !s
                .field_of_study
                .iter()
                .any(|f| self.fields.iter().any(|want| want.eq_ignore_ascii_case(f)))
        {
            return false;
        }

        if self.exclude_ielts && s.ielts_required {
            return false;
        }

        if self.exclude_app_fee && s.application_fee > 0.0 {
            return false;
        }

        if let Some(floor) = self.gpa_minimum {
            if s.min_gpa < floor {
                return false;
            }
        }

        if let Some(funding) = self.funding_type {
            if s.funding_type != funding {
                return false;
            }
        }

        if let Some(days) = self.deadline.days() {
            if s.deadline < now || s.deadline > now + Duration::days(days) {
                return false;
            }
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = [&s.title, &s.university, &s.description]
                .iter()
                .any(|text| text.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub scholarships: Vec<Scholarship>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Filter, sort and slice out one page
pub fn query_catalog(catalog: &[Scholarship], query: &CatalogQuery, now: DateTime<Utc>) -> CatalogPage {
    let mut matched: Vec<&Scholarship> = catalog.iter().filter(|s| query.matches(s, now)).collect();

    match query.sort_by {
        SortBy::Deadline => matched.sort_by_key(|s| s.deadline),
        SortBy::Recent => matched.sort_by(|a, b| b.last_scraped.cmp(&a.last_scraped)),
        SortBy::Funding => matched.sort_by(|a, b| {
            amount_value(&b.amount)
                .partial_cmp(&amount_value(&a.amount))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.deadline.cmp(&b.deadline))
        }),
    }

    let page = query.page.max(1);
    let limit = if query.limit == 0 { DEFAULT_PAGE_SIZE } else { query.limit };
    let total = matched.len();

    let scholarships = matched
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();

    CatalogPage {
        scholarships,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }
}

/// Sorted unique destination countries
pub fn distinct_countries(catalog: &[Scholarship]) -> Vec<String> {
    catalog
        .iter()
        .map(|s| s.country.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted unique fields of study
pub fn distinct_fields(catalog: &[Scholarship]) -> Vec<String> {
    catalog
        .iter()
        .flat_map(|s| s.field_of_study.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ===== Award value =====

static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)(k\b)?").ok());

/// Rough comparable value of a free-form amount in USD; ranges average, phrases count as 0
pub fn amount_value(amount: &str) -> f64 {
    let cleaned = amount.replace([' ', ','], "").to_lowercase();

    if let Some((left, right)) = cleaned.split_once('-') {
        let left_val = extract_number(left);
        let right_val = extract_number(right);
        if left_val > 0.0 && right_val > 0.0 {
            return (left_val + right_val) / 2.0;
        }
    }

    extract_number(&cleaned)
}

fn extract_number(text: &str) -> f64 {
    let Some(caps) = NUMBER.as_ref().and_then(|re| re.captures(text)) else {
        return 0.0;
    };
    let Some(mut value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
        return 0.0;
    };
    if caps.get(2).is_some() {
        value *= 1000.0;
    }

    if text.contains('£') || text.contains("gbp") {
        value * 1.27
    } else if text.contains('€') || text.contains("eur") {
        value * 1.08
    } else {
        value
    }
}
