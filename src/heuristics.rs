//! Text Heuristics Module
//!
//! Best-effort extraction of scholarship attributes from listing snippets:
//! - destination country, fields of study, deadline, award amount
//! - funding type, host university, IELTS requirement
//! - benefit and requirement summaries
//!
//! Every function is total: a missing signal yields a documented default.

use crate::types::FundingType;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Days added to "now" when no deadline can be found
pub const DEFAULT_DEADLINE_DAYS: i64 = 180;

pub const DEFAULT_COUNTRY: &str = "International";
pub const DEFAULT_FIELD: &str = "All Fields";
pub const DEFAULT_AMOUNT: &str = "Full Funding";
pub const DEFAULT_BENEFIT: &str = "Full funding package";
pub const DEFAULT_REQUIREMENT: &str = "See official website for requirements";

/// Country aliases in match order: multi-word names first, short codes last
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("united arab emirates", "UAE"),
    ("kingdom of saudi arabia", "Saudi Arabia"),
    ("saudi arabia", "Saudi Arabia"),
    ("united states", "USA"),
    ("united kingdom", "UK"),
    ("new zealand", "New Zealand"),
    ("south korea", "South Korea"),
    ("hong kong", "Hong Kong"),
    ("canada", "Canada"),
    ("australia", "Australia"),
    ("germany", "Germany"),
    ("france", "France"),
    ("netherlands", "Netherlands"),
    ("sweden", "Sweden"),
    ("switzerland", "Switzerland"),
    ("japan", "Japan"),
    ("singapore", "Singapore"),
    ("denmark", "Denmark"),
    ("norway", "Norway"),
    ("finland", "Finland"),
    ("ireland", "Ireland"),
    ("austria", "Austria"),
    ("belgium", "Belgium"),
    ("italy", "Italy"),
    ("spain", "Spain"),
    ("china", "China"),
    ("qatar", "Qatar"),
    ("saudi", "Saudi Arabia"),
    ("britain", "UK"),
    ("america", "USA"),
    ("american", "USA"),
    ("korea", "South Korea"),
    ("usa", "USA"),
    ("uae", "UAE"),
    ("ksa", "Saudi Arabia"),
    ("uk", "UK"),
];

/// Regions whose names contain a country alias; blanked before matching
const REGION_PHRASES: &[&str] = &["latin america", "south america", "central america"];

/// Field label -> lowercase keywords and case-sensitive acronyms, in output order
const FIELD_KEYWORDS: &[(&str, &[&str], &[&str])] = &[
    ("Computer Science", &["computer science", "cs", "software", "programming", "computing"], &[]),
    ("Engineering", &["engineering", "engineer"], &[]),
    ("Data Science", &["data science", "data analytics", "big data"], &[]),
    ("Artificial Intelligence", &["artificial intelligence", "ai", "machine learning", "ml"], &[]),
    ("Cybersecurity", &["cybersecurity", "cyber security", "information security"], &[]),
    ("Cloud Computing", &["cloud computing", "cloud"], &[]),
    ("Software Engineering", &["software engineering"], &[]),
    ("Information Technology", &["information technology"], &["IT"]),
    ("Business", &["business", "mba", "management"], &[]),
    ("Medicine", &["medicine", "medical", "healthcare"], &[]),
    ("Law", &["law", "legal"], &[]),
    ("Economics", &["economics", "economy"], &[]),
    ("Finance", &["finance", "financial"], &[]),
    ("Mathematics", &["mathematics", "math"], &[]),
    ("Physics", &["physics"], &[]),
    ("Chemistry", &["chemistry"], &[]),
    ("Biology", &["biology", "biological"], &[]),
    ("Environmental Science", &["environmental", "climate"], &[]),
];

const DATE_BODY: &str = r"(?:[A-Za-z]{3,9}\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}|\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]{3,9},?\s+\d{4}|\d{4}-\d{2}-\d{2})";

/// Labelled patterns first, then bare month-day-year, day-month-year and ISO dates
static DEADLINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)deadline(?:\s+is)?[:\s]+({DATE_BODY})"),
        format!(r"(?i)closes?(?:\s+on)?[:\s]+({DATE_BODY})"),
        format!(r"(?i)due(?:\s+by|\s+on)?[:\s]+({DATE_BODY})"),
        r"([A-Za-z]{3,9}\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4})".to_string(),
        r"(\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]{3,9},?\s+\d{4})".to_string(),
        r"\b(\d{4}-\d{2}-\d{2})\b".to_string(),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$\s?\d[\d,]*",
        r"€\s?\d[\d,]*",
        r"£\s?\d[\d,]*",
        r"(?i)full tuition",
        r"(?i)full funding",
        r"(?i)fully funded",
        r"(?i)stipend",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static UNIVERSITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let name = r"(?:[A-Z][\w'&.\-]*\s+)*(?:University|College|Institute|School)(?:\s+of(?:\s+[A-Z][\w'&.\-]*)+)?";
    [
        format!(r"\b(?:at|At|AT)\s+(?:the\s+)?({name})"),
        format!(r"({name})"),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static ORDINAL_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d)(st|nd|rd|th)\b").ok());

/// All heuristics for one listing item, computed together
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub country: String,
    pub field_of_study: Vec<String>,
    pub deadline: DateTime<Utc>,
    pub amount: String,
    pub funding_type: FundingType,
    pub university: Option<String>,
    pub ielts_required: bool,
    pub benefits: Vec<String>,
    pub requirements: Vec<String>,
}

/// Run every heuristic over a listing item's title, excerpt and raw date text
pub fn extract_fields(title: &str, excerpt: &str, date_text: &str, now: DateTime<Utc>) -> ExtractedFields {
    let combined = format!("{} {}", title, excerpt);

    ExtractedFields {
        country: extract_country(&combined),
        field_of_study: extract_field_of_study(&combined),
        deadline: extract_deadline(date_text, excerpt, now),
        amount: extract_amount(excerpt),
        funding_type: determine_funding_type(&combined),
        // title first: a capitalized excerpt start would run onto "University of X"
        university: extract_university(title).or_else(|| extract_university(excerpt)),
        ielts_required: has_ielts_requirement(excerpt),
        benefits: extract_benefits(excerpt),
        requirements: extract_requirements(excerpt),
    }
}

/// Destination country, or "International" when none is named
pub fn extract_country(text: &str) -> String {
    let mut text_lower = text.to_lowercase();
    for region in REGION_PHRASES {
        text_lower = text_lower.replace(region, " ");
    }

    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| contains_word(&text_lower, alias))
        .map(|(_, country)| country.to_string())
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
}

/// Every field label whose keywords appear, or ["All Fields"]
pub fn extract_field_of_study(text: &str) -> Vec<String> {
    let text_lower = text.to_lowercase();

    let fields: Vec<String> = FIELD_KEYWORDS
        .iter()
        .filter(|(_, keywords, acronyms)| {
            keywords.iter().any(|kw| contains_word(&text_lower, kw))
                || acronyms.iter().any(|acronym| contains_word(text, acronym))
        })
        .map(|(field, _, _)| field.to_string())
        .collect();

    if fields.is_empty() {
        vec![DEFAULT_FIELD.to_string()]
    } else {
        fields
    }
}

/// First parseable deadline in `date_text + excerpt`, else now + 180 days
pub fn extract_deadline(date_text: &str, excerpt: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = format!("{} {}", date_text, excerpt);

    for pattern in DEADLINE_PATTERNS.iter() {
        for caps in pattern.captures_iter(&text) {
            if let Some(date) = caps.get(1).and_then(|m| parse_date_text(m.as_str())) {
                return date;
            }
        }
    }

    now + Duration::days(DEFAULT_DEADLINE_DAYS)
}

/// Parse loose human dates: "March 15, 2025", "15th Mar 2025", "2025-03-15"
pub fn parse_date_text(raw: &str) -> Option<DateTime<Utc>> {
    let mut cleaned = raw.trim().replace([',', '.'], " ");
    if let Some(re) = ORDINAL_SUFFIX.as_ref() {
        cleaned = re.replace_all(&cleaned, "$1").to_string();
    }
    let cleaned = cleaned
        .split_whitespace()
        .map(|token| if token.eq_ignore_ascii_case("sept") { "Sep" } else { token })
        .collect::<Vec<_>>()
        .join(" ");

    let formats = ["%Y-%m-%d", "%B %d %Y", "%d %B %Y"];
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// First currency amount or funding phrase in the excerpt, else "Full Funding"
pub fn extract_amount(excerpt: &str) -> String {
    AMOUNT_PATTERNS
        .iter()
        .find_map(|re| re.find(excerpt))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_AMOUNT.to_string())
}

/// Full unless the text says "partial"; explicit full-funding phrases win over "partial"
pub fn determine_funding_type(text: &str) -> FundingType {
    let text_lower = text.to_lowercase();

    if contains_any(&text_lower, &["fully funded", "full scholarship", "full tuition"]) {
        return FundingType::Full;
    }
    if text_lower.contains("partial") {
        return FundingType::Partial;
    }
    FundingType::Full
}

/// "<Capitalized words> University|College|Institute|School", preferring the name after "at"
pub fn extract_university(text: &str) -> Option<String> {
    UNIVERSITY_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

pub fn has_ielts_requirement(excerpt: &str) -> bool {
    let text = excerpt.to_lowercase();
    contains_any(&text, &["ielts", "toefl", "english proficiency"])
}

pub fn extract_benefits(excerpt: &str) -> Vec<String> {
    let text = excerpt.to_lowercase();
    let mut benefits = Vec::new();

    if text.contains("tuition") {
        benefits.push("Tuition coverage".to_string());
    }
    if text.contains("stipend") {
        benefits.push("Monthly stipend".to_string());
    }
    if contains_any(&text, &["accommodation", "housing"]) {
        benefits.push("Accommodation".to_string());
    }
    if text.contains("travel") {
        benefits.push("Travel allowance".to_string());
    }
    if contains_any(&text, &["health", "insurance"]) {
        benefits.push("Health insurance".to_string());
    }
    if text.contains("visa") {
        benefits.push("Visa support".to_string());
    }

    if benefits.is_empty() {
        vec![DEFAULT_BENEFIT.to_string()]
    } else {
        benefits
    }
}

pub fn extract_requirements(excerpt: &str) -> Vec<String> {
    let text = excerpt.to_lowercase();
    let mut requirements = Vec::new();

    if text.contains("bachelor") {
        requirements.push("Bachelor's degree".to_string());
    }
    if text.contains("master") {
        requirements.push("Master's degree".to_string());
    }
    if contains_any(&text, &["phd", "doctoral"]) {
        requirements.push("PhD or equivalent".to_string());
    }
    if text.contains("experience") {
        requirements.push("Relevant experience".to_string());
    }
    if contains_any(&text, &["ielts", "toefl"]) {
        requirements.push("English proficiency".to_string());
    }
    if contains_any(&text, &["gpa", "academic"]) {
        requirements.push("Strong academic record".to_string());
    }

    if requirements.is_empty() {
        vec![DEFAULT_REQUIREMENT.to_string()]
    } else {
        requirements
    }
}

/// Check if text contains any of the patterns
pub fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

/// Substring match that only counts when `needle` is not glued to other letters or digits.
/// Keeps short tokens like "uk", "ai" or "it" from matching inside ordinary words.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}
