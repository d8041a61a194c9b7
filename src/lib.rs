//! Scholarship Finder Library
//!
//! Scholarship discovery: scrape listing sites, normalize and deduplicate
//! into a catalog, and score catalog entries against user profiles.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod heuristics;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod resume;
pub mod saved;
pub mod scrapers;
pub mod storage;
pub mod types;

pub use types::*;
