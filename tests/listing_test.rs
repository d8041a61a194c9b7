//! Listing adapter tests against saved listing pages in tests/fixtures

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use scholarship_finder::config::ScrapeConfig;
use scholarship_finder::normalize::{deduplicate_scholarships, normalize_all};
use scholarship_finder::scrapers::{opportunity_desk, parse_listing, scholars4dev, ListingAdapter};
use scholarship_finder::types::FundingType;
use std::fs;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap()
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{}", name)).expect("Failed to read fixture")
}

#[test]
fn test_scholars4dev_listing_items() {
    let items = parse_listing(&scholars4dev(), &fixture("scholars4dev_listing.html"));

    // the linkless announcement is skipped
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Chevening Scholarships at University of Oxford");
    assert_eq!(items[1].link, "/2210/daad-partial-grant/");
    assert_eq!(items[1].date_text, "Closes 15th March 2027");
}

#[test]
fn test_scholars4dev_candidates_normalize() {
    let adapter = ListingAdapter::new(scholars4dev(), &ScrapeConfig::default()).unwrap();
    let records = adapter.candidates_from_html(&fixture("scholars4dev_listing.html"), now());
    let scholarships = normalize_all(&records, now());

    let chevening = &scholarships[0];
    assert!(chevening.id.starts_with("s4d-"));
    assert_eq!(chevening.university, "University of Oxford");
    assert_eq!(chevening.country, "UK");
    assert_eq!(chevening.funding_type, FundingType::Full);
    assert_eq!(chevening.amount, "Fully funded");
    assert!(chevening.ielts_required);
    assert_eq!(chevening.deadline.date_naive(), NaiveDate::from_ymd_opt(2026, 11, 5).unwrap());
    assert_eq!(chevening.source, "scholars4dev");
    assert!(chevening.benefits.contains(&"Monthly stipend".to_string()));

    let daad = &scholarships[1];
    assert_eq!(daad.country, "Germany");
    assert_eq!(daad.university, "Various Universities");
    assert_eq!(daad.funding_type, FundingType::Partial);
    assert_eq!(daad.amount, "€1,200");
    assert_eq!(daad.field_of_study, vec!["Engineering"]);
    assert_eq!(daad.deadline.date_naive(), NaiveDate::from_ymd_opt(2027, 3, 15).unwrap());
    assert_eq!(daad.application_link, "https://www.scholars4dev.com/2210/daad-partial-grant/");
    assert_eq!(daad.source_url, daad.application_link);
    assert_eq!(daad.requirements, vec!["Bachelor's degree"]);
}

#[test]
fn test_opportunity_desk_falls_back_to_article() {
    let adapter = ListingAdapter::new(opportunity_desk(), &ScrapeConfig::default()).unwrap();
    let records = adapter.candidates_from_html(&fixture("opportunitydesk_listing.html"), now());
    assert_eq!(records.len(), 2);

    let scholarships = normalize_all(&records, now());
    let kaust = &scholarships[0];
    assert!(kaust.id.starts_with("od-"));
    assert_eq!(kaust.country, "Saudi Arabia");
    assert_eq!(kaust.university, "Various");
    assert_eq!(kaust.amount, "$30,000");
    assert!(kaust.field_of_study.contains(&"Data Science".to_string()));
    assert_eq!(kaust.deadline.date_naive(), NaiveDate::from_ymd_opt(2027, 1, 31).unwrap());

    let global = &scholarships[1];
    assert_eq!(global.country, "International");
    assert_eq!(global.deadline, now() + Duration::days(180));
}

#[test]
fn test_repeated_scrape_dedupes_by_title_and_university() {
    let adapter = ListingAdapter::new(scholars4dev(), &ScrapeConfig::default()).unwrap();
    let html = fixture("scholars4dev_listing.html");

    let mut records = adapter.candidates_from_html(&html, now());
    records.extend(adapter.candidates_from_html(&html, now() + Duration::hours(1)));

    let unique = deduplicate_scholarships(normalize_all(&records, now()));
    assert_eq!(unique.len(), 2);
    // later scrape wins
    assert_eq!(unique[0].last_scraped, now() + Duration::hours(1));
}
