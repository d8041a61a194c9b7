//! Match Scoring Module
//!
//! Two independent profile-to-scholarship scores:
//! - `catalog_relevance_score`: weighted five-component score used to rank the whole catalog
//! - `match_endpoint_score`: points-based score behind the match listing (>= 40, top 20)
//!
//! Both are pure, never fail, and return an integer in 0..=100 with a component breakdown.

use crate::heuristics::contains_word;
use crate::types::{EducationLevel, EnglishLevel, FundingType, Profile, Scholarship};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Minimum match-endpoint score for a scholarship to be listed
pub const MATCH_THRESHOLD: u8 = 40;

/// Maximum number of records in the match listing
pub const MATCH_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchScore {
    pub total: u8,
    pub breakdown: BTreeMap<String, f64>,
}

impl MatchScore {
    fn zero() -> Self {
        Self {
            total: 0,
            breakdown: BTreeMap::new(),
        }
    }

    fn from_sum(sum: f64, breakdown: BTreeMap<String, f64>) -> Self {
        Self {
            total: sum.round().clamp(0.0, 100.0) as u8,
            breakdown,
        }
    }
}

// ============================================
// Catalog relevance (weighted components)
// ============================================

const WEIGHT_FIELD: f64 = 0.30;
const WEIGHT_GPA: f64 = 0.20;
const WEIGHT_EXPERIENCE: f64 = 0.15;
const WEIGHT_COUNTRY: f64 = 0.20;
const WEIGHT_LANGUAGE: f64 = 0.15;

/// Weighted sum of field, GPA, experience, country and language components (each 0..=100).
///
/// A profile with no usable signal scores 0. The breakdown holds the unweighted components.
pub fn catalog_relevance_score(profile: &Profile, scholarship: &Scholarship) -> MatchScore {
    if !profile.has_signal() {
        return MatchScore::zero();
    }

    let field = if fields_overlap(&profile.field_of_study, &scholarship.field_of_study) {
        100.0
    } else {
        40.0
    };

    let min_gpa = scholarship.min_gpa;
    let gpa = if min_gpa <= 0.0 || profile.gpa >= min_gpa {
        100.0
    } else {
        f64::max(50.0, (profile.gpa / min_gpa) * 80.0)
    };

    let experience = if profile.experience.is_empty() { 60.0 } else { 90.0 };

    let country = if profile
        .target_countries
        .iter()
        .any(|c| c.trim().eq_ignore_ascii_case(scholarship.country.trim()))
    {
        100.0
    } else if !profile.target_countries.is_empty() {
        60.0
    } else {
        80.0
    };

    let language = match (scholarship.ielts_required, profile.english_level) {
        (true, EnglishLevel::Beginner) => 50.0,
        (true, _) => 85.0,
        (false, _) => 95.0,
    };

    let sum = field * WEIGHT_FIELD
        + gpa * WEIGHT_GPA
        + experience * WEIGHT_EXPERIENCE
        + country * WEIGHT_COUNTRY
        + language * WEIGHT_LANGUAGE;

    let breakdown = BTreeMap::from([
        ("field".to_string(), field),
        ("gpa".to_string(), gpa),
        ("experience".to_string(), experience),
        ("country".to_string(), country),
        ("language".to_string(), language),
    ]);

    MatchScore::from_sum(sum, breakdown)
}

/// Any user field is a case-insensitive substring of a scholarship field, or the reverse
fn fields_overlap(user_fields: &[String], scholarship_fields: &[String]) -> bool {
    user_fields.iter().any(|uf| {
        let uf = uf.to_lowercase();
        scholarship_fields.iter().any(|sf| {
            let sf = sf.to_lowercase();
            uf.contains(&sf) || sf.contains(&uf)
        })
    })
}

// ============================================
// Match endpoint (points)
// ============================================

const EDUCATION_POINTS: f64 = 40.0;
const COUNTRY_POINTS: f64 = 30.0;
const FIELD_POINTS: f64 = 20.0;
/// Share of country points granted to a named destination that does not mention the user's country
const PRESUMED_OPEN_SHARE: f64 = 0.8;

/// Education 40, country 30, field overlap 20, deadline and funding up to 10
pub fn match_endpoint_score(profile: &Profile, scholarship: &Scholarship, now: DateTime<Utc>) -> MatchScore {
    let education = if education_matches(profile.effective_education_level(), &scholarship.requirements) {
        EDUCATION_POINTS
    } else {
        0.0
    };

    let country = COUNTRY_POINTS * country_eligibility(profile.home_country(), scholarship);
    let field = FIELD_POINTS * jaccard_similarity(&profile.field_of_study, &scholarship.field_of_study);
    let additional = deadline_points(scholarship.deadline, now) + funding_points(scholarship.funding_type);

    let breakdown = BTreeMap::from([
        ("education".to_string(), education),
        ("country".to_string(), country),
        ("field".to_string(), field),
        ("additional".to_string(), additional),
    ]);

    MatchScore::from_sum(education + country + field + additional, breakdown)
}

/// Level named literally in the requirements, or through its synonym
fn education_matches(level: EducationLevel, requirements: &[String]) -> bool {
    let text = requirements.join(" ").to_lowercase();
    if text.contains(&level.label().to_lowercase()) {
        return true;
    }
    match level {
        EducationLevel::Bachelors => contains_word(&text, "undergraduate"),
        EducationLevel::Masters => contains_word(&text, "graduate"),
        EducationLevel::PhD => contains_word(&text, "doctoral"),
        EducationLevel::HighSchool => false,
    }
}

/// 1.0 for open destinations or a description naming the user's country, else 0.8
fn country_eligibility(user_country: &str, scholarship: &Scholarship) -> f64 {
    let destination = scholarship.country.trim().to_lowercase();
    if destination.is_empty() || destination == "international" || destination == "various" {
        return 1.0;
    }

    let user_country = user_country.trim().to_lowercase();
    if !user_country.is_empty() && scholarship.description.to_lowercase().contains(&user_country) {
        1.0
    } else {
        PRESUMED_OPEN_SHARE
    }
}

/// |A ∩ B| / |A ∪ B| over lowercased sets; 0 when both are empty
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<String> = a.iter().map(|s| s.trim().to_lowercase()).collect();
    let b: HashSet<String> = b.iter().map(|s| s.trim().to_lowercase()).collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn deadline_points(deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (deadline - now).num_seconds() as f64 / 86_400.0;
    if days > 30.0 {
        5.0
    } else if days > 7.0 {
        3.0
    } else if days > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn funding_points(funding: FundingType) -> f64 {
    match funding {
        FundingType::Full => 5.0,
        FundingType::Partial => 2.0,
    }
}

// ============================================
// Ranking
// ============================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedScholarship {
    #[serde(flatten)]
    pub scholarship: Scholarship,
    pub match_score: u8,
    pub match_breakdown: BTreeMap<String, f64>,
}

impl RankedScholarship {
    fn new(scholarship: &Scholarship, score: MatchScore) -> Self {
        Self {
            scholarship: scholarship.clone(),
            match_score: score.total,
            match_breakdown: score.breakdown,
        }
    }
}

/// Match listing: match-endpoint score >= 40, best first, at most 20
pub fn rank_matches(profile: &Profile, catalog: &[Scholarship], now: DateTime<Utc>) -> Vec<RankedScholarship> {
    let mut relevant: Vec<RankedScholarship> = catalog
        .iter()
        .map(|s| RankedScholarship::new(s, match_endpoint_score(profile, s, now)))
        .filter(|r| r.match_score >= MATCH_THRESHOLD)
        .collect();

    relevant.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    relevant.truncate(MATCH_LIMIT);
    relevant
}

/// Whole catalog ordered by catalog relevance, best first
pub fn rank_by_relevance(profile: &Profile, catalog: &[Scholarship]) -> Vec<RankedScholarship> {
    let mut ranked: Vec<RankedScholarship> = catalog
        .iter()
        .map(|s| RankedScholarship::new(s, catalog_relevance_score(profile, s)))
        .collect();

    ranked.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_scholarship;
    use crate::types::ExperienceEntry;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn scholarship(raw: serde_json::Value) -> Scholarship {
        normalize_scholarship(&raw, now())
    }

    fn profile() -> Profile {
        Profile {
            gpa: 3.8,
            target_countries: vec!["USA".into()],
            field_of_study: vec!["Computer Science".into()],
            english_level: EnglishLevel::Advanced,
            experience: vec![ExperienceEntry::default()],
            ..Default::default()
        }
    }

    #[test]
    fn test_catalog_relevance_worked_example() {
        let s = scholarship(json!({
            "minGPA": 3.0, "country": "USA", "fieldOfStudy": ["Computer Science"], "ieltsRequired": true
        }));
        let score = catalog_relevance_score(&profile(), &s);
        assert_eq!(score.total, 96);
        assert_eq!(score.breakdown["field"], 100.0);
        assert_eq!(score.breakdown["experience"], 90.0);
        assert_eq!(score.breakdown["language"], 85.0);
    }

    #[test]
    fn test_catalog_relevance_empty_profile_is_zero() {
        let s = scholarship(json!({"country": "USA"}));
        let score = catalog_relevance_score(&Profile::default(), &s);
        assert_eq!(score.total, 0);
        assert!(score.breakdown.is_empty());
    }

    #[test]
    fn test_catalog_relevance_low_gpa_and_beginner() {
        let p = Profile {
            gpa: 1.0,
            english_level: EnglishLevel::Beginner,
            experience: vec![ExperienceEntry::default()],
            ..Default::default()
        };
        let s = scholarship(json!({"minGPA": 4.0, "ieltsRequired": true, "fieldOfStudy": ["Law"]}));
        let score = catalog_relevance_score(&p, &s);
        // field 40, gpa floored at 50, experience 90, no preference 80, language 50
        assert_eq!(score.breakdown["gpa"], 50.0);
        assert_eq!(score.breakdown["country"], 80.0);
        assert_eq!(score.total, 59);
    }

    #[test]
    fn test_catalog_relevance_zero_min_gpa_passes() {
        let p = Profile { gpa: 0.5, ..Default::default() };
        let s = scholarship(json!({"minGPA": 0}));
        assert_eq!(catalog_relevance_score(&p, &s).breakdown["gpa"], 100.0);
    }

    #[test]
    fn test_match_endpoint_full_marks() {
        let p = Profile {
            education_level: Some(EducationLevel::Masters),
            field_of_study: vec!["Engineering".into()],
            ..Default::default()
        };
        let s = scholarship(json!({
            "country": "International",
            "fieldOfStudy": ["engineering"],
            "requirements": ["Open to graduate applicants"],
            "deadline": (now() + Duration::days(60)).to_rfc3339()
        }));
        let score = match_endpoint_score(&p, &s, now());
        assert_eq!(score.total, 100);
    }

    #[test]
    fn test_match_endpoint_presumed_open_destination() {
        let p = Profile {
            target_countries: vec!["Nigeria".into()],
            field_of_study: vec!["Medicine".into(), "Biology".into()],
            ..Default::default()
        };
        let s = scholarship(json!({
            "country": "Germany",
            "fieldOfStudy": ["Medicine", "Chemistry"],
            "requirements": ["Bachelor's degree holders"],
            "fundingType": "Partial Scholarship",
            "deadline": (now() + Duration::days(10)).to_rfc3339()
        }));
        let score = match_endpoint_score(&p, &s, now());
        assert_eq!(score.breakdown["education"], 40.0);
        assert_eq!(score.breakdown["country"], 24.0);
        assert!((score.breakdown["field"] - 20.0 / 3.0).abs() < 1e-9);
        assert_eq!(score.breakdown["additional"], 5.0);
        // 40 + 24 + 6.67 + 5
        assert_eq!(score.total, 76);

        let mentions = scholarship(json!({"country": "Germany", "description": "Applicants from nigeria welcome"}));
        assert_eq!(match_endpoint_score(&p, &mentions, now()).breakdown["country"], 30.0);
    }

    #[test]
    fn test_match_endpoint_education_synonyms_are_whole_words() {
        let undergraduate = scholarship(json!({
            "country": "France",
            "requirements": ["Open to undergraduate students only"]
        }));

        let bachelor = Profile {
            education_level: Some(EducationLevel::Bachelors),
            ..Default::default()
        };
        assert_eq!(match_endpoint_score(&bachelor, &undergraduate, now()).breakdown["education"], 40.0);

        let master = Profile {
            education_level: Some(EducationLevel::Masters),
            ..Default::default()
        };
        let score = match_endpoint_score(&master, &undergraduate, now());
        assert_eq!(score.breakdown["education"], 0.0);
        assert!(score.total < MATCH_THRESHOLD);
    }

    #[test]
    fn test_match_endpoint_past_deadline_no_points() {
        let s = scholarship(json!({"deadline": (now() - Duration::days(1)).to_rfc3339(), "fundingType": "Partial Scholarship"}));
        assert_eq!(match_endpoint_score(&Profile::default(), &s, now()).breakdown["additional"], 2.0);
    }

    #[test]
    fn test_jaccard_empty_sets() {
        assert_eq!(jaccard_similarity(&[], &[]), 0.0);
        assert_eq!(jaccard_similarity(&["A".into()], &["a".into()]), 1.0);
    }

    #[test]
    fn test_rank_matches_threshold_order_and_cap() {
        let p = Profile {
            education_level: Some(EducationLevel::PhD),
            ..Default::default()
        };
        let mut catalog = Vec::new();
        for i in 0..25 {
            catalog.push(scholarship(json!({
                "title": format!("Doctoral award {}", i),
                "requirements": ["Doctoral candidates"],
                "country": "International"
            })));
        }
        // education miss: 30 + 5 + 5 = 40, still listed
        catalog.push(scholarship(json!({"title": "Borderline", "country": "International"})));
        // 24 + 5 + 5 = 34, dropped
        catalog.push(scholarship(json!({"title": "Weak", "country": "France"})));

        let ranked = rank_matches(&p, &catalog, now());
        assert_eq!(ranked.len(), MATCH_LIMIT);
        assert!(ranked.iter().all(|r| r.match_score >= MATCH_THRESHOLD));
        assert!(ranked.windows(2).all(|w| w[0].match_score >= w[1].match_score));
        assert!(ranked.iter().all(|r| r.scholarship.title != "Weak"));

        let all = rank_by_relevance(&profile(), &catalog);
        assert_eq!(all.len(), catalog.len());
    }
}
