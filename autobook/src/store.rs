//! SQLite persistence: the specialty ledger, the opening-event log, and the
//! referral queue.
//!
//! Every operation opens its own connection, mutates inside a single
//! statement and closes, so a crash mid-run never leaves a transaction open.
//! The store is not defended against concurrent writers; the workflow is the
//! single writer by design.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::StoreError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A specialty and its currently free slot count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtyRecord {
    pub name: String,
    pub free_count: i64,
}

/// One logged demand spike: more than one slot for a specialty appeared
/// between two polls. `delta` is stored negative (previous free count minus
/// the current one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningEvent {
    pub logged_at: String,
    pub specialty: String,
    pub delta: i64,
}

/// A referral waiting to be booked, or the record of its booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub added_at: String,
    pub referral_id: String,
    pub specialty: String,
    pub booked: bool,
    pub booked_date: Option<String>,
    pub booked_time: Option<String>,
    pub changed_at: Option<String>,
    pub specificity: Option<String>,
    pub note: Option<String>,
    pub notified: bool,
}

/// What [`Store::create_referral`] did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    /// The specialty has never been seen in the ledger.
    UnknownSpecialty,
    /// The referral number is already in the queue.
    Duplicate,
}

#[derive(Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let conn = store.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS specialties(
                name TEXT NOT NULL PRIMARY KEY,
                free_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS openings(
                logged_at TEXT NOT NULL,
                name TEXT NOT NULL,
                delta INTEGER NOT NULL,
                FOREIGN KEY (name) REFERENCES specialties(name)
            );
            CREATE TABLE IF NOT EXISTS referrals(
                added_at TEXT NOT NULL,
                referral_id TEXT NOT NULL UNIQUE,
                specialty TEXT NOT NULL,
                booked INTEGER NOT NULL,
                booked_date TEXT,
                booked_time TEXT,
                changed_at TEXT,
                specificity TEXT,
                note TEXT,
                notified INTEGER NOT NULL,
                FOREIGN KEY (specialty) REFERENCES specialties(name)
            );",
        )?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn now() -> String {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    // ---- specialty ledger ----

    /// All known specialties with their stored free counts.
    pub fn specialties(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name, free_count FROM specialties")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (name, count) = row?;
            out.insert(name, count);
        }
        Ok(out)
    }

    pub fn insert_specialty(&self, name: &str, free_count: i64) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO specialties(name, free_count) VALUES(?1, ?2)",
            params![name, free_count],
        )?;
        Ok(())
    }

    pub fn set_free_count(&self, name: &str, free_count: i64) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE specialties SET free_count = ?1 WHERE name = ?2",
            params![free_count, name],
        )?;
        Ok(())
    }

    // ---- opening events ----

    pub fn log_opening(&self, specialty: &str, delta: i64) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO openings(logged_at, name, delta) VALUES(?1, ?2, ?3)",
            params![Self::now(), specialty, delta],
        )?;
        Ok(())
    }

    pub fn openings(&self) -> Result<Vec<OpeningEvent>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT logged_at, name, delta FROM openings")?;
        let rows = stmt.query_map([], |r| {
            Ok(OpeningEvent {
                logged_at: r.get(0)?,
                specialty: r.get(1)?,
                delta: r.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Drop opening events older than 30 days. Returns how many went.
    pub fn purge_old_openings(&self) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let purged = conn.execute(
            "DELETE FROM openings WHERE logged_at < datetime('now', '-30 days', 'localtime')",
            [],
        )?;
        Ok(purged)
    }

    // ---- referral queue ----

    /// Queue a referral for booking. The specialty must already be in the
    /// ledger and the referral number must not be queued yet; both rejections
    /// are soft (logged, no row).
    pub fn create_referral(
        &self,
        referral_id: &str,
        specialty: &str,
        specificity: Option<&str>,
        note: Option<&str>,
    ) -> Result<QueueOutcome, StoreError> {
        let conn = self.connect()?;
        let known: Option<String> = conn
            .query_row(
                "SELECT name FROM specialties WHERE name = ?1",
                params![specialty],
                |r| r.get(0),
            )
            .optional()?;
        if known.is_none() {
            warn!(referral_id, specialty, "unknown specialty, referral not queued");
            return Ok(QueueOutcome::UnknownSpecialty);
        }
        let duplicate: Option<String> = conn
            .query_row(
                "SELECT referral_id FROM referrals WHERE referral_id = ?1",
                params![referral_id],
                |r| r.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            warn!(referral_id, "referral already queued");
            return Ok(QueueOutcome::Duplicate);
        }
        conn.execute(
            "INSERT INTO referrals(added_at, referral_id, specialty, booked,
                booked_date, booked_time, changed_at, specificity, note, notified)
             VALUES(?1, ?2, ?3, 0, NULL, NULL, NULL, ?4, ?5, 0)",
            params![Self::now(), referral_id, specialty, specificity, note],
        )?;
        debug!(referral_id, specialty, "referral queued");
        Ok(QueueOutcome::Queued)
    }

    pub fn pending_referrals(&self) -> Result<Vec<ReferralRecord>, StoreError> {
        self.select_referrals("WHERE booked = 0")
    }

    pub fn all_referrals(&self) -> Result<Vec<ReferralRecord>, StoreError> {
        self.select_referrals("")
    }

    fn select_referrals(&self, filter: &str) -> Result<Vec<ReferralRecord>, StoreError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT added_at, referral_id, specialty, booked, booked_date,
                    booked_time, changed_at, specificity, note, notified
             FROM referrals {filter}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |r| {
            Ok(ReferralRecord {
                added_at: r.get(0)?,
                referral_id: r.get(1)?,
                specialty: r.get(2)?,
                booked: r.get::<_, i64>(3)? != 0,
                booked_date: r.get(4)?,
                booked_time: r.get(5)?,
                changed_at: r.get(6)?,
                specificity: r.get(7)?,
                note: r.get(8)?,
                notified: r.get::<_, i64>(9)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Record a successful claim: booked flag, date, time and change
    /// timestamp in one statement. Idempotent for identical values: a row
    /// already booked for the same date and time is left alone, timestamp
    /// included.
    pub fn mark_booked(
        &self,
        referral_id: &str,
        booked_date: &str,
        booked_time: &str,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE referrals
             SET booked = 1, booked_date = ?1, booked_time = ?2, changed_at = ?3
             WHERE referral_id = ?4
               AND (booked = 0 OR booked_date IS NOT ?1 OR booked_time IS NOT ?2)",
            params![booked_date, booked_time, Self::now(), referral_id],
        )?;
        Ok(())
    }

    /// Force the booked flag, for operator corrections.
    pub fn set_booked_flag(&self, referral_id: &str, booked: bool) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE referrals SET booked = ?1 WHERE referral_id = ?2",
            params![booked as i64, referral_id],
        )?;
        Ok(())
    }

    pub fn delete_referral(&self, referral_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM referrals WHERE referral_id = ?1",
            params![referral_id],
        )?;
        Ok(())
    }

    pub fn mark_notified(&self, referral_id: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE referrals SET notified = 1 WHERE referral_id = ?1",
            params![referral_id],
        )?;
        Ok(())
    }
}
