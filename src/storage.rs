//! Persistence Module
//!
//! SQLite-backed store for the four record kinds:
//! - scholarships (indexed by country, deadline and field of study)
//! - profiles, one per user
//! - saved scholarships with a catalog snapshot and application status
//! - append-only scrape logs
//!
//! Records are kept as JSON documents next to the columns used for lookups.

use crate::normalize::dedup_key;
use crate::types::{ApplicationStatus, Profile, RawRecord, SavedScholarship, Scholarship, ScrapeLog};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Ids and dedup keys already persisted
#[derive(Debug, Default, Clone)]
pub struct CatalogIndex {
    pub ids: HashSet<String>,
    pub keys: HashSet<String>,
}

impl CatalogIndex {
    pub fn contains(&self, scholarship: &Scholarship) -> bool {
        self.ids.contains(&scholarship.id) || self.keys.contains(&dedup_key(scholarship))
    }

    pub fn insert(&mut self, scholarship: &Scholarship) {
        self.ids.insert(scholarship.id.clone());
        self.keys.insert(dedup_key(scholarship));
    }
}

/// What the ingestion job needs from persistence
pub trait ScholarshipStore: Send + Sync {
    fn catalog_index(&self) -> Result<CatalogIndex>;

    /// Insert new records; returns how many rows were written
    fn insert_scholarships(&self, scholarships: &[Scholarship]) -> Result<usize>;

    fn append_scrape_log(&self, log: &ScrapeLog) -> Result<()>;
}

// ============================================
// SQLite store
// ============================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, relative paths resolved against `root`
    pub fn open(root: &str, path: &str) -> Result<Self> {
        let db_path = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            PathBuf::from(root).join(path)
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open scholarship database {:?}", db_path))?;
        info!(path = ?db_path, "Opened scholarship database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Scholarship database lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scholarships (
                id TEXT PRIMARY KEY,
                dedup_key TEXT NOT NULL,
                country TEXT NOT NULL,
                deadline TEXT NOT NULL,
                last_scraped TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scholarships_country ON scholarships(country);
            CREATE INDEX IF NOT EXISTS idx_scholarships_deadline ON scholarships(deadline);
            CREATE INDEX IF NOT EXISTS idx_scholarships_dedup_key ON scholarships(dedup_key);

            CREATE TABLE IF NOT EXISTS scholarship_fields (
                scholarship_id TEXT NOT NULL,
                field TEXT NOT NULL,
                PRIMARY KEY (scholarship_id, field)
            );
            CREATE INDEX IF NOT EXISTS idx_scholarship_fields_field ON scholarship_fields(field);

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS saved_scholarships (
                user_id TEXT NOT NULL,
                scholarship_id TEXT NOT NULL,
                status TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                snapshot TEXT NOT NULL,
                PRIMARY KEY (user_id, scholarship_id)
            );

            CREATE TABLE IF NOT EXISTS scrape_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL
            );",
        )
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Whole catalog in insertion order
    pub fn all_scholarships(&self) -> Result<Vec<Scholarship>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM scholarships ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut scholarships = Vec::new();
        for data in rows {
            scholarships.push(decode(&data?)?);
        }
        Ok(scholarships)
    }

    pub fn get_scholarship(&self, id: &str) -> Result<Option<Scholarship>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM scholarships WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        data.map(|d| decode(&d)).transpose()
    }

    /// Ids of scholarships offering `field`, through the field index
    pub fn ids_for_field(&self, field: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT scholarship_id FROM scholarship_fields WHERE field = ?1 COLLATE NOCASE ORDER BY scholarship_id",
        )?;
        let ids = stmt
            .query_map(params![field], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Most recent first
    pub fn scrape_logs(&self, limit: usize) -> Result<Vec<ScrapeLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT data FROM scrape_logs ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let mut logs = Vec::new();
        for data in rows {
            logs.push(decode(&data?)?);
        }
        Ok(logs)
    }

    // ===== Profiles =====

    /// Create on first save, replace afterwards
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        if profile.user_id.trim().is_empty() {
            anyhow::bail!("Profile is missing a user id");
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (user_id, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![profile.user_id, encode(profile)?, timestamp(Utc::now())],
        )?;
        debug!(user_id = %profile.user_id, "Profile saved");
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM profiles WHERE user_id = ?1", params![user_id], |row| row.get(0))
            .optional()?;
        data.map(|d| decode(&d)).transpose()
    }

    // ===== Saved scholarships =====

    /// `None` when the user already saved this scholarship
    pub fn save_scholarship(
        &self,
        user_id: &str,
        scholarship: &Scholarship,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedScholarship>> {
        let saved = SavedScholarship {
            user_id: user_id.to_string(),
            scholarship_id: scholarship.id.clone(),
            scholarship: scholarship.clone(),
            status: ApplicationStatus::Saved,
            saved_at: now,
        };

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO saved_scholarships (user_id, scholarship_id, status, saved_at, snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                saved.user_id,
                saved.scholarship_id,
                saved.status.as_str(),
                timestamp(saved.saved_at),
                encode(&saved.scholarship)?
            ],
        )?;

        Ok((inserted > 0).then_some(saved))
    }

    /// Returns whether an entry was removed
    pub fn remove_saved(&self, user_id: &str, scholarship_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM saved_scholarships WHERE user_id = ?1 AND scholarship_id = ?2",
            params![user_id, scholarship_id],
        )?;
        Ok(removed > 0)
    }

    pub fn update_saved_status(
        &self,
        user_id: &str,
        scholarship_id: &str,
        status: ApplicationStatus,
    ) -> Result<Option<SavedScholarship>> {
        {
            let conn = self.conn()?;
            let updated = conn.execute(
                "UPDATE saved_scholarships SET status = ?3 WHERE user_id = ?1 AND scholarship_id = ?2",
                params![user_id, scholarship_id, status.as_str()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
        }

        Ok(self
            .list_saved(user_id)?
            .into_iter()
            .find(|s| s.scholarship_id == scholarship_id))
    }

    /// Newest saves first
    pub fn list_saved(&self, user_id: &str) -> Result<Vec<SavedScholarship>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT scholarship_id, status, saved_at, snapshot FROM saved_scholarships
             WHERE user_id = ?1 ORDER BY saved_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut saved = Vec::new();
        for row in rows {
            let (scholarship_id, status, saved_at, snapshot) = row?;
            saved.push(SavedScholarship {
                user_id: user_id.to_string(),
                scholarship_id,
                scholarship: decode(&snapshot)?,
                status: status.parse()?,
                saved_at: DateTime::parse_from_rfc3339(&saved_at)
                    .with_context(|| format!("Bad saved_at timestamp: {}", saved_at))?
                    .with_timezone(&Utc),
            });
        }
        Ok(saved)
    }
}

impl ScholarshipStore for SqliteStore {
    fn catalog_index(&self) -> Result<CatalogIndex> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, dedup_key FROM scholarships")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut index = CatalogIndex::default();
        for row in rows {
            let (id, key) = row?;
            index.ids.insert(id);
            index.keys.insert(key);
        }
        Ok(index)
    }

    fn insert_scholarships(&self, scholarships: &[Scholarship]) -> Result<usize> {
        if scholarships.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for s in scholarships {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO scholarships (id, dedup_key, country, deadline, last_scraped, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    s.id,
                    dedup_key(s),
                    s.country,
                    timestamp(s.deadline),
                    timestamp(s.last_scraped),
                    encode(s)?
                ],
            )?;
            for field in &s.field_of_study {
                tx.execute(
                    "INSERT OR IGNORE INTO scholarship_fields (scholarship_id, field) VALUES (?1, ?2)",
                    params![s.id, field],
                )?;
            }
        }

        tx.commit().context("Failed to commit scholarship batch")?;
        debug!(inserted, "Scholarships inserted");
        Ok(inserted)
    }

    fn append_scrape_log(&self, log: &ScrapeLog) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scrape_logs (timestamp, status, data) VALUES (?1, ?2, ?3)",
            params![timestamp(log.timestamp()), log.status_label(), encode(log)?],
        )?;
        Ok(())
    }
}

// ============================================
// In-memory store
// ============================================

/// Store used by tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    scholarships: Mutex<Vec<Scholarship>>,
    logs: Mutex<Vec<ScrapeLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scholarships(&self) -> Vec<Scholarship> {
        self.scholarships.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<ScrapeLog> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ScholarshipStore for MemoryStore {
    fn catalog_index(&self) -> Result<CatalogIndex> {
        let scholarships = self
            .scholarships
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let mut index = CatalogIndex::default();
        for s in scholarships.iter() {
            index.insert(s);
        }
        Ok(index)
    }

    fn insert_scholarships(&self, new: &[Scholarship]) -> Result<usize> {
        let mut scholarships = self
            .scholarships
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let mut inserted = 0;
        for s in new {
            if !scholarships.iter().any(|existing| existing.id == s.id) {
                scholarships.push(s.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn append_scrape_log(&self, log: &ScrapeLog) -> Result<()> {
        self.logs
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?
            .push(log.clone());
        Ok(())
    }
}

// ============================================
// Seed catalog
// ============================================

/// Manually curated records from a JSON array file; a missing file yields nothing
pub fn load_seed_records(root: &str, path: &str) -> Result<Vec<RawRecord>> {
    let seed_path = PathBuf::from(root).join(path);
    if !seed_path.exists() {
        debug!(path = ?seed_path, "No seed file");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&seed_path)
        .with_context(|| format!("Failed to read seed file {:?}", seed_path))?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Seed file {:?} is not a JSON array", seed_path))?;

    info!(count = records.len(), path = ?seed_path, "Loaded seed records");
    Ok(records)
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize record")
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).context("Failed to deserialize stored record")
}
