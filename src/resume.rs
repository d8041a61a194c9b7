//! Resume Extraction Module
//!
//! Turns plain resume text into profile hints:
//! - `ResumeExtractor` trait for pluggable (e.g. remote model) extractors
//! - `KeywordResumeExtractor`, the local regex/keyword fallback
//! - `extract_resume`, which prefers the pluggable extractor and falls back on error

use crate::heuristics::contains_word;
use crate::types::{EducationLevel, Profile};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Characters of cleaned resume text handed to an extractor
pub const MAX_RESUME_CHARS: usize = 3000;

const DEFAULT_FIELD: &str = "General";
const DEFAULT_COUNTRY: &str = "International";
const MAX_FIELDS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeExtraction {
    pub education_level: EducationLevel,
    pub field_of_study: Vec<String>,
    /// Two-letter country code, or "International"
    pub country: String,
    /// 0..=100
    pub confidence: u8,
}

impl ResumeExtraction {
    /// Set the education level and add fields the profile does not list yet
    pub fn apply_to(&self, profile: &mut Profile) {
        profile.education_level = Some(self.education_level);

        for field in &self.field_of_study {
            if field == DEFAULT_FIELD {
                continue;
            }
            let known = profile
                .field_of_study
                .iter()
                .any(|f| f.eq_ignore_ascii_case(field));
            if !known {
                profile.field_of_study.push(field.clone());
            }
        }
    }
}

#[async_trait]
pub trait ResumeExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, text: &str) -> Result<ResumeExtraction>;
}

/// Collapse whitespace and cap the length
pub fn clean_resume_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    crate::normalize::truncate_chars(&collapsed, MAX_RESUME_CHARS)
}

/// Run the pluggable extractor if there is one, falling back to keywords when it fails
pub async fn extract_resume(text: &str, external: Option<&dyn ResumeExtractor>) -> ResumeExtraction {
    let cleaned = clean_resume_text(text);

    if let Some(extractor) = external {
        match extractor.extract(&cleaned).await {
            Ok(extraction) => {
                info!(extractor = extractor.name(), confidence = extraction.confidence, "Resume extracted");
                return ResumeExtraction {
                    confidence: extraction.confidence.min(100),
                    ..extraction
                };
            }
            Err(e) => {
                warn!(extractor = extractor.name(), error = %format!("{:#}", e), "Resume extractor failed, using keywords");
            }
        }
    }

    extract_with_keywords(&cleaned)
}

// ===== Keyword fallback =====

static EDUCATION_PATTERNS: LazyLock<Vec<(EducationLevel, Regex)>> = LazyLock::new(|| {
    [
        (EducationLevel::PhD, r"\bph\.?\s?d\b|\bdoctorate\b|\bdoctor of\b"),
        (EducationLevel::Masters, r"\bmaster|\bm\.?sc\b|\bm\.a\.|\bm\.?b\.?a\b"),
        (EducationLevel::Bachelors, r"\bbachelor|\bb\.?sc\b|\bb\.a\.|\bb\.?eng\b"),
        (EducationLevel::HighSchool, r"\bhigh school\b|\bsecondary school\b"),
    ]
    .into_iter()
    .filter_map(|(level, p)| Regex::new(p).ok().map(|re| (level, re)))
    .collect()
});

const RESUME_FIELDS: &[(&str, &[&str])] = &[
    ("Computer Science", &["computer science", "software", "programming", "development"]),
    ("Engineering", &["engineering", "electrical", "mechanical", "civil"]),
    ("Business", &["business", "management", "finance", "marketing", "mba"]),
    ("Medicine", &["medicine", "medical", "health", "nursing"]),
    ("Science", &["physics", "chemistry", "biology", "science"]),
    ("Arts", &["arts", "history", "literature", "english"]),
    ("Law", &["law", "legal"]),
];

const RESUME_COUNTRIES: &[(&str, &[&str])] = &[
    ("US", &["united states", "usa", "u.s.a", "new york", "california", "texas"]),
    ("UK", &["united kingdom", "uk", "london", "england"]),
    ("CA", &["canada", "toronto", "vancouver"]),
    ("AU", &["australia", "sydney", "melbourne"]),
    ("IN", &["india", "delhi", "mumbai", "bangalore"]),
    ("NG", &["nigeria", "lagos", "abuja"]),
    ("PK", &["pakistan", "lahore", "karachi", "islamabad"]),
    ("CN", &["china", "beijing", "shanghai"]),
    ("DE", &["germany", "berlin", "munich"]),
];

pub struct KeywordResumeExtractor;

#[async_trait]
impl ResumeExtractor for KeywordResumeExtractor {
    fn name(&self) -> &str {
        "keywords"
    }

    async fn extract(&self, text: &str) -> Result<ResumeExtraction> {
        Ok(extract_with_keywords(text))
    }
}

/// Highest education level, up to two fields and a country code, with a heuristic confidence
pub fn extract_with_keywords(text: &str) -> ResumeExtraction {
    let lower = text.to_lowercase();

    let education_level = EDUCATION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(level, _)| *level)
        .unwrap_or(EducationLevel::Bachelors);

    let fields: Vec<String> = RESUME_FIELDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_word(&lower, k)))
        .map(|(field, _)| field.to_string())
        .take(MAX_FIELDS)
        .collect();

    let country = RESUME_COUNTRIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_word(&lower, k)))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

    let mut confidence = 50;
    if education_level != EducationLevel::Bachelors {
        confidence += 10;
    }
    if !fields.is_empty() {
        confidence += 20;
    }
    if country != DEFAULT_COUNTRY {
        confidence += 10;
    }

    ResumeExtraction {
        education_level,
        field_of_study: if fields.is_empty() {
            vec![DEFAULT_FIELD.to_string()]
        } else {
            fields
        },
        country,
        confidence,
    }
}
