//! Saved scholarship tracking: per-user application statistics and upcoming deadlines.

use crate::types::{ApplicationStatus, Profile, SavedScholarship};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Days ahead a saved deadline counts as upcoming
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStats {
    pub saved_count: usize,
    pub applied_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    /// Accepted over applied, as a rounded percentage
    pub success_rate: u32,
    pub profile_completed: bool,
}

/// Counts by status over everything the user saved
pub fn user_stats(saved: &[SavedScholarship], profile: Option<&Profile>) -> SavedStats {
    let count = |status: ApplicationStatus| saved.iter().filter(|s| s.status == status).count();

    let applied_count = count(ApplicationStatus::Applied);
    let accepted_count = count(ApplicationStatus::Accepted);

    let success_rate = if applied_count > 0 {
        (accepted_count as f64 / applied_count as f64 * 100.0).round() as u32
    } else {
        0
    };

    SavedStats {
        saved_count: saved.len(),
        applied_count,
        accepted_count,
        rejected_count: count(ApplicationStatus::Rejected),
        success_rate,
        profile_completed: profile.is_some_and(|p| !p.field_of_study.is_empty()),
    }
}

/// Whole days until `deadline`, rounded up
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (deadline - now).num_milliseconds();
    millis.div_euclid(86_400_000) + i64::from(millis.rem_euclid(86_400_000) != 0)
}

/// Saved entries due within the next 30 days (0 included), soonest first, at most `limit`
pub fn upcoming_deadlines(saved: &[SavedScholarship], now: DateTime<Utc>, limit: usize) -> Vec<SavedScholarship> {
    let mut upcoming: Vec<SavedScholarship> = saved
        .iter()
        .filter(|s| (0..=UPCOMING_WINDOW_DAYS).contains(&days_until(s.scholarship.deadline, now)))
        .cloned()
        .collect();

    upcoming.sort_by_key(|s| s.scholarship.deadline);
    upcoming.truncate(limit);
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_scholarship;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, deadline: DateTime<Utc>, status: ApplicationStatus) -> SavedScholarship {
        let scholarship = normalize_scholarship(&json!({"id": id, "deadline": deadline.to_rfc3339()}), now());
        SavedScholarship {
            user_id: "u1".into(),
            scholarship_id: id.into(),
            scholarship,
            status,
            saved_at: now(),
        }
    }

    #[test]
    fn test_user_stats() {
        let d = now() + Duration::days(40);
        let saved = vec![
            entry("a", d, ApplicationStatus::Applied),
            entry("b", d, ApplicationStatus::Applied),
            entry("c", d, ApplicationStatus::Applied),
            entry("d", d, ApplicationStatus::Accepted),
            entry("e", d, ApplicationStatus::Rejected),
            entry("f", d, ApplicationStatus::Saved),
        ];
        let profile = Profile { field_of_study: vec!["Law".into()], ..Default::default() };

        let stats = user_stats(&saved, Some(&profile));
        assert_eq!(stats.saved_count, 6);
        assert_eq!(stats.applied_count, 3);
        assert_eq!(stats.accepted_count, 1);
        assert_eq!(stats.rejected_count, 1);
        assert_eq!(stats.success_rate, 33);
        assert!(stats.profile_completed);
    }

    #[test]
    fn test_user_stats_without_applications() {
        let stats = user_stats(&[], None);
        assert_eq!(stats.success_rate, 0);
        assert!(!stats.profile_completed);
    }

    #[test]
    fn test_days_until_rounds_up() {
        assert_eq!(days_until(now() + Duration::hours(1), now()), 1);
        assert_eq!(days_until(now() + Duration::days(2), now()), 2);
        assert_eq!(days_until(now() - Duration::hours(1), now()), 0);
        assert_eq!(days_until(now() - Duration::hours(25), now()), -1);
    }

    #[test]
    fn test_upcoming_deadlines_window_and_order() {
        let saved = vec![
            entry("far", now() + Duration::days(45), ApplicationStatus::Saved),
            entry("soon", now() + Duration::days(3), ApplicationStatus::Saved),
            entry("edge", now() + Duration::days(30), ApplicationStatus::Applied),
            entry("today", now() - Duration::hours(2), ApplicationStatus::Saved),
            entry("past", now() - Duration::days(2), ApplicationStatus::Saved),
        ];
        let upcoming = upcoming_deadlines(&saved, now(), 5);
        let ids: Vec<&str> = upcoming.iter().map(|s| s.scholarship_id.as_str()).collect();
        assert_eq!(ids, vec!["today", "soon", "edge"]);

        assert_eq!(upcoming_deadlines(&saved, now(), 1).len(), 1);
    }
}
