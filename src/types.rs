use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unvalidated candidate record as produced by a site adapter or read from a seed file.
pub type RawRecord = serde_json::Value;

// ============================================
// Scholarship catalog
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FundingType {
    #[default]
    #[serde(rename = "Full Scholarship")]
    Full,
    #[serde(rename = "Partial Scholarship")]
    Partial,
}

impl FundingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingType::Full => "Full Scholarship",
            FundingType::Partial => "Partial Scholarship",
        }
    }

    /// Lenient parse used by the normalizer; `None` for anything outside the two labels
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "full scholarship" | "full" => Some(FundingType::Full),
            "partial scholarship" | "partial" => Some(FundingType::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for FundingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical catalog record, created by ingestion and never mutated by users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scholarship {
    pub id: String,
    pub title: String,
    pub university: String,
    pub country: String,
    pub field_of_study: Vec<String>,
    pub funding_type: FundingType,
    pub amount: String,
    pub deadline: DateTime<Utc>,
    pub application_fee: f64,
    pub ielts_required: bool,
    #[serde(rename = "minGPA")]
    pub min_gpa: f64,
    pub description: String,
    pub benefits: Vec<String>,
    pub requirements: Vec<String>,
    pub application_link: String,
    pub source: String,
    pub source_url: String,
    pub last_scraped: DateTime<Utc>,
    pub is_active: bool,
    pub verified: bool,
}

// ============================================
// User profile
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    #[serde(rename = "High School")]
    HighSchool,
    #[serde(rename = "Bachelor's")]
    Bachelors,
    #[serde(rename = "Master's")]
    Masters,
    #[serde(rename = "PhD")]
    PhD,
}

impl EducationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "High School",
            EducationLevel::Bachelors => "Bachelor's",
            EducationLevel::Masters => "Master's",
            EducationLevel::PhD => "PhD",
        }
    }

    /// Map a free-form degree name ("Master's Degree", "PhD/Doctorate", "BSc") to a level
    pub fn from_degree(degree: &str) -> Option<Self> {
        let d = degree.to_lowercase();
        if d.contains("phd") || d.contains("doctor") {
            Some(EducationLevel::PhD)
        } else if d.contains("master") || d.starts_with("msc") || d.starts_with("mba") {
            Some(EducationLevel::Masters)
        } else if d.contains("bachelor") || d.starts_with("bsc") || d.starts_with("beng") {
            Some(EducationLevel::Bachelors)
        } else if d.contains("high school") || d.contains("secondary") {
            Some(EducationLevel::HighSchool)
        } else {
            None
        }
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnglishLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
    Native,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationEntry {
    pub degree: String,
    pub university: String,
    pub field: String,
    pub gpa: Option<f64>,
    pub graduation_year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceEntry {
    pub company: String,
    pub position: String,
    pub duration: String,
    pub description: Option<String>,
}

/// One per user; education and experience entries are kept for display and only counted when scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub user_id: String,
    pub education_level: Option<EducationLevel>,
    pub education: Vec<EducationEntry>,
    pub experience: Vec<ExperienceEntry>,
    pub skills: Vec<String>,
    pub target_countries: Vec<String>,
    pub field_of_study: Vec<String>,
    pub gpa: f64,
    pub english_level: EnglishLevel,
}

impl Profile {
    /// Explicit level, else derived from the first education entry, else Bachelor's
    pub fn effective_education_level(&self) -> EducationLevel {
        self.education_level
            .or_else(|| {
                self.education
                    .first()
                    .and_then(|e| EducationLevel::from_degree(&e.degree))
            })
            .unwrap_or(EducationLevel::Bachelors)
    }

    /// Country used for eligibility checks: the first target country
    pub fn home_country(&self) -> &str {
        self.target_countries
            .first()
            .map(|c| c.as_str())
            .unwrap_or("International")
    }

    /// Whether the profile carries anything a score can be computed from
    pub fn has_signal(&self) -> bool {
        !self.field_of_study.is_empty()
            || !self.education.is_empty()
            || !self.experience.is_empty()
            || !self.skills.is_empty()
            || !self.target_countries.is_empty()
            || self.gpa > 0.0
    }
}

// ============================================
// Saved scholarships
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Saved,
    Applied,
    Interview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "saved",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "saved" => Ok(ApplicationStatus::Saved),
            "applied" => Ok(ApplicationStatus::Applied),
            "interview" => Ok(ApplicationStatus::Interview),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => anyhow::bail!("Unknown application status: {}", other),
        }
    }
}

/// User x scholarship join entry with a snapshot of the scholarship for offline display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScholarship {
    pub user_id: String,
    pub scholarship_id: String,
    pub scholarship: Scholarship,
    pub status: ApplicationStatus,
    pub saved_at: DateTime<Utc>,
}

// ============================================
// Scrape audit log
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only record written once per ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScrapeLog {
    #[serde(rename_all = "camelCase")]
    Completed {
        timestamp: DateTime<Utc>,
        total_found: usize,
        new_added: usize,
        sources: Vec<SourceOutcome>,
    },
    Failed {
        timestamp: DateTime<Utc>,
        error: String,
    },
}

impl ScrapeLog {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScrapeLog::Completed { timestamp, .. } | ScrapeLog::Failed { timestamp, .. } => *timestamp,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            ScrapeLog::Completed { .. } => "completed",
            ScrapeLog::Failed { .. } => "failed",
        }
    }
}
