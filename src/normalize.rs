//! Scholarship Normalization and Deduplication Module
//!
//! Provides functions to:
//! - Coerce raw candidate records into the canonical `Scholarship` shape
//! - Synthesize `{tag}-{millis}-{random}` ids
//! - Deduplicate by lowercase title + university, preferring the latest scrape

use crate::heuristics;
use crate::types::{FundingType, RawRecord, Scholarship};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;

// ============================================
// Field limits and defaults
// ============================================

const TITLE_MAX: usize = 200;
const UNIVERSITY_MAX: usize = 200;
const COUNTRY_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 1000;
const AMOUNT_MAX: usize = 200;

const DEFAULT_UNIVERSITY: &str = "Various Universities";
const DEFAULT_REQUIREMENT: &str = "See official website";
const DEFAULT_MIN_GPA: f64 = 3.0;
const DEFAULT_SOURCE: &str = "manual";
const PLACEHOLDER_LINK: &str = "#";

/// Id tag for records that arrive without one
pub const MANUAL_ID_TAG: &str = "sch";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_RANDOM_LEN: usize = 9;

/// `{tag}-{unix millis}-{9 base36 chars}`
pub fn generate_scholarship_id(tag: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_RANDOM_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", tag, Utc::now().timestamp_millis(), suffix)
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ============================================
// Normalization
// ============================================

/// Total mapping from an untyped record to a valid `Scholarship`.
///
/// | field | rule |
/// |---|---|
/// | id | kept if non-empty, else `sch-{millis}-{random}` |
/// | title, university, country, amount, description | stringified, truncated, defaulted when empty |
/// | fieldOfStudy, benefits, requirements | string items of an array, else one fallback entry |
/// | fundingType | one of the two labels, else Full |
/// | deadline | RFC 3339, date, loose text or epoch millis, else now + 180 days |
/// | applicationFee | non-negative finite number, else 0 |
/// | minGPA | any finite number as given, else 3.0 |
/// | isActive | true unless explicitly false |
pub fn normalize_scholarship(raw: &RawRecord, now: DateTime<Utc>) -> Scholarship {
    let application_link = string_field(raw, "applicationLink").unwrap_or_else(|| PLACEHOLDER_LINK.to_string());
    let source_url = string_field(raw, "sourceUrl").unwrap_or_else(|| application_link.clone());

    Scholarship {
        id: string_field(raw, "id").unwrap_or_else(|| generate_scholarship_id(MANUAL_ID_TAG)),
        title: truncate_chars(&string_field(raw, "title").unwrap_or_default(), TITLE_MAX),
        university: truncate_chars(
            &string_field(raw, "university").unwrap_or_else(|| DEFAULT_UNIVERSITY.to_string()),
            UNIVERSITY_MAX,
        ),
        country: truncate_chars(
            &string_field(raw, "country").unwrap_or_else(|| heuristics::DEFAULT_COUNTRY.to_string()),
            COUNTRY_MAX,
        ),
        field_of_study: list_field(raw, "fieldOfStudy", heuristics::DEFAULT_FIELD),
        funding_type: raw
            .get("fundingType")
            .and_then(Value::as_str)
            .and_then(FundingType::parse_label)
            .unwrap_or_default(),
        amount: truncate_chars(
            &string_field(raw, "amount").unwrap_or_else(|| heuristics::DEFAULT_AMOUNT.to_string()),
            AMOUNT_MAX,
        ),
        deadline: raw
            .get("deadline")
            .and_then(parse_deadline)
            .unwrap_or_else(|| now + Duration::days(heuristics::DEFAULT_DEADLINE_DAYS)),
        application_fee: number_field(raw, "applicationFee")
            .filter(|fee| *fee >= 0.0)
            .unwrap_or(0.0),
        ielts_required: truthy(raw.get("ieltsRequired")),
        min_gpa: number_field(raw, "minGPA").unwrap_or(DEFAULT_MIN_GPA),
        description: truncate_chars(&string_field(raw, "description").unwrap_or_default(), DESCRIPTION_MAX),
        benefits: list_field(raw, "benefits", heuristics::DEFAULT_BENEFIT),
        requirements: list_field(raw, "requirements", DEFAULT_REQUIREMENT),
        application_link,
        source: string_field(raw, "source").unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        source_url,
        last_scraped: raw
            .get("lastScraped")
            .and_then(parse_deadline)
            .unwrap_or(now),
        is_active: raw.get("isActive").and_then(Value::as_bool) != Some(false),
        verified: truthy(raw.get("verified")),
    }
}

pub fn normalize_all(records: &[RawRecord], now: DateTime<Utc>) -> Vec<Scholarship> {
    records.iter().map(|r| normalize_scholarship(r, now)).collect()
}

/// Non-empty string form of a scalar field
fn string_field(raw: &RawRecord, key: &str) -> Option<String> {
    let text = match raw.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn number_field(raw: &RawRecord, key: &str) -> Option<f64> {
    let value = match raw.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn list_field(raw: &RawRecord, key: &str, fallback: &str) -> Vec<String> {
    match raw.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => vec![fallback.to_string()],
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// Timestamps as RFC 3339, plain dates, loose human dates or epoch milliseconds
fn parse_deadline(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| dt.and_utc())
                })
                .or_else(|| heuristics::parse_date_text(s))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

// ============================================
// Deduplication
// ============================================

/// `lowercase(title).trim()-lowercase(university).trim()`
pub fn dedup_key(scholarship: &Scholarship) -> String {
    format!(
        "{}-{}",
        scholarship.title.to_lowercase().trim(),
        scholarship.university.to_lowercase().trim()
    )
}

#[derive(Debug, Default)]
pub struct DeduplicationStats {
    pub total_input: usize,
    pub unique_output: usize,
    pub duplicates_removed: usize,
    /// Keys seen more than once, with their occurrence count
    pub dup_count_by_key: HashMap<String, usize>,
}

pub fn deduplicate_scholarships(scholarships: Vec<Scholarship>) -> Vec<Scholarship> {
    deduplicate_with_stats(scholarships).0
}

/// Single pass; a later duplicate with a strictly newer `last_scraped` takes the
/// first occurrence's slot, so output order follows first appearance of each key
pub fn deduplicate_with_stats(scholarships: Vec<Scholarship>) -> (Vec<Scholarship>, DeduplicationStats) {
    let total_input = scholarships.len();
    let mut kept: Vec<Scholarship> = Vec::with_capacity(total_input);
    let mut slot_by_key: HashMap<String, usize> = HashMap::new();
    let mut dup_count: HashMap<String, usize> = HashMap::new();

    for scholarship in scholarships {
        let key = dedup_key(&scholarship);
        *dup_count.entry(key.clone()).or_insert(0) += 1;

        match slot_by_key.get(&key) {
            Some(&slot) => {
                if scholarship.last_scraped > kept[slot].last_scraped {
                    kept[slot] = scholarship;
                }
            }
            None => {
                slot_by_key.insert(key, kept.len());
                kept.push(scholarship);
            }
        }
    }

    let stats = DeduplicationStats {
        total_input,
        unique_output: kept.len(),
        duplicates_removed: total_input - kept.len(),
        dup_count_by_key: dup_count.into_iter().filter(|(_, count)| *count > 1).collect(),
    };

    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_empty_object() {
        let s = normalize_scholarship(&json!({}), now());
        assert!(s.id.starts_with("sch-"));
        assert_eq!(s.id.rsplit('-').next().unwrap().len(), 9);
        assert_eq!(s.title, "");
        assert_eq!(s.university, "Various Universities");
        assert_eq!(s.country, "International");
        assert_eq!(s.field_of_study, vec!["All Fields"]);
        assert_eq!(s.funding_type, FundingType::Full);
        assert_eq!(s.amount, "Full Funding");
        assert_eq!(s.deadline, now() + Duration::days(180));
        assert_eq!(s.application_fee, 0.0);
        assert_eq!(s.min_gpa, 3.0);
        assert_eq!(s.benefits, vec!["Full funding package"]);
        assert_eq!(s.requirements, vec!["See official website"]);
        assert_eq!(s.application_link, "#");
        assert_eq!(s.source_url, "#");
        assert_eq!(s.source, "manual");
        assert!(s.is_active);
        assert!(!s.verified);
    }

    #[test]
    fn test_normalize_non_object_input() {
        let s = normalize_scholarship(&json!("not a record"), now());
        assert_eq!(s.country, "International");
        assert!(s.is_active);
    }

    #[test]
    fn test_normalize_coerces_fields() {
        let raw = json!({
            "id": "manual-1",
            "title": "x".repeat(250),
            "fundingType": "Stipend",
            "deadline": "2025-06-30",
            "applicationFee": -50,
            "minGPA": "3.5",
            "fieldOfStudy": "Engineering",
            "benefits": ["Tuition", 7, null],
            "applicationLink": "https://apply.example.edu",
            "isActive": 0,
            "verified": 1
        });
        let s = normalize_scholarship(&raw, now());
        assert_eq!(s.id, "manual-1");
        assert_eq!(s.title.chars().count(), 200);
        assert_eq!(s.funding_type, FundingType::Full);
        assert_eq!(s.deadline.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert_eq!(s.application_fee, 0.0);
        assert_eq!(s.min_gpa, 3.5);
        assert_eq!(s.field_of_study, vec!["All Fields"]);
        assert_eq!(s.benefits, vec!["Tuition", "7"]);
        assert_eq!(s.source_url, "https://apply.example.edu");
        // only a literal false deactivates
        assert!(s.is_active);
        assert!(s.verified);
    }

    #[test]
    fn test_normalize_keeps_explicit_zero_gpa_and_partial() {
        let raw = json!({"minGPA": 0, "fundingType": "Partial Scholarship", "isActive": false, "deadline": 1735689600000i64});
        let s = normalize_scholarship(&raw, now());
        assert_eq!(s.min_gpa, 0.0);
        assert_eq!(s.funding_type, FundingType::Partial);
        assert!(!s.is_active);
        assert_eq!(s.deadline, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("Zürich", 2), "Zü");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_scholarship_id("od");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "od");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    fn record(title: &str, university: &str, scraped: &str) -> Scholarship {
        normalize_scholarship(
            &json!({"title": title, "university": university, "lastScraped": scraped}),
            now(),
        )
    }

    #[test]
    fn test_dedupe_prefers_latest_scrape() {
        let first = record("A", "X", "2024-01-01");
        let second = record("a", "x", "2024-02-01");
        let second_id = second.id.clone();

        let out = deduplicate_scholarships(vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, second_id);
    }

    #[test]
    fn test_dedupe_tie_keeps_first_and_order() {
        let a1 = record("Alpha ", "Uni", "2024-03-01");
        let b = record("Beta", "Uni", "2024-01-01");
        let a2 = record(" alpha", "UNI", "2024-03-01");
        let a3 = record("ALPHA", "uni", "2024-05-01");
        let a1_id = a1.id.clone();
        let a3_id = a3.id.clone();

        let (out, stats) = deduplicate_with_stats(vec![a1, b, a2.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, a1_id);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.dup_count_by_key.get("alpha-uni"), Some(&2));

        let out = deduplicate_scholarships(vec![record("Alpha", "Uni", "2024-03-01"), record("Beta", "Uni", "2024-01-01"), a3]);
        assert_eq!(out[0].id, a3_id);
        assert_eq!(out[1].title, "Beta");
    }
}
