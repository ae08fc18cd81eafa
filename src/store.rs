//! Append-only query log backed by SQLite.
//!
//! One row per search attempt, written exactly once whether the search
//! completed or failed. Connection per call, default isolation, no pooling.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

/// A query record to append: input parameters, raw page snapshot, and the
/// parsed (or failed) outcome. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub case_type: String,
    pub case_number: String,
    pub case_year: String,
    pub queried_at: DateTime<Utc>,
    pub raw_response: String,
    pub parties: String,
    pub filing_date: String,
    pub next_hearing_date: String,
    pub order_judgment_link: String,
    pub status: String,
}

/// History entry returned by `/history` — a subset of the record fields.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub case_type: String,
    pub case_number: String,
    pub case_year: String,
    pub timestamp: String,
    pub status: String,
}

/// Handle to the query log. Cheap to clone; each operation opens its own
/// connection.
#[derive(Debug, Clone)]
pub struct QueryStore {
    path: PathBuf,
}

impl QueryStore {
    /// Open the store, creating the parent directory and schema on first run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open query database {}", path.display()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                case_type TEXT,
                case_number TEXT,
                case_year TEXT,
                query_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                raw_response TEXT,
                parties TEXT,
                filing_date TEXT,
                next_hearing_date TEXT,
                order_judgment_link TEXT,
                status TEXT
            );",
        )
        .context("failed to create queries table")?;

        Ok(Self { path })
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("failed to open query database {}", self.path.display()))
    }

    /// Append one query record. Returns the new row id.
    pub fn record(&self, rec: &QueryRecord) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO queries (case_type, case_number, case_year, query_timestamp,
                                  raw_response, parties, filing_date, next_hearing_date,
                                  order_judgment_link, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                rec.case_type,
                rec.case_number,
                rec.case_year,
                rec.queried_at.to_rfc3339(),
                rec.raw_response,
                rec.parties,
                rec.filing_date,
                rec.next_hearing_date,
                rec.order_judgment_link,
                rec.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The newest `limit` entries, newest first.
    ///
    /// Ordered by rowid rather than timestamp so submission order holds
    /// even for same-second inserts.
    pub fn recent(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT case_type, case_number, case_year, query_timestamp, status
             FROM queries
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map([limit], |row| {
                Ok(HistoryEntry {
                    case_type: row.get(0)?,
                    case_number: row.get(1)?,
                    case_year: row.get(2)?,
                    timestamp: row.get(3)?,
                    status: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(case_number: &str, status: &str) -> QueryRecord {
        QueryRecord {
            case_type: "W.P.(C)".into(),
            case_number: case_number.into(),
            case_year: "2024".into(),
            queried_at: Utc::now(),
            raw_response: "<html></html>".into(),
            parties: "A vs B".into(),
            filing_date: String::new(),
            next_hearing_date: "12-May-2025".into(),
            order_judgment_link: String::new(),
            status: status.into(),
        }
    }

    #[test]
    fn test_open_creates_parent_dir_and_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db/queries.db");
        let store = QueryStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.recent(50).unwrap().is_empty());
    }

    #[test]
    fn test_record_and_recent_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = QueryStore::open(dir.path().join("queries.db")).unwrap();

        // Same-second inserts must still come back in submission order.
        for i in 1..=5 {
            store.record(&sample(&format!("{i}/2024"), "Found")).unwrap();
        }

        let history = store.recent(50).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].case_number, "5/2024");
        assert_eq!(history[4].case_number, "1/2024");
    }

    #[test]
    fn test_recent_caps_at_limit() {
        let dir = TempDir::new().unwrap();
        let store = QueryStore::open(dir.path().join("queries.db")).unwrap();

        for i in 0..60 {
            store
                .record(&sample(&format!("{i}/2024"), "Not Found"))
                .unwrap();
        }

        let history = store.recent(50).unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].case_number, "59/2024");
    }

    #[test]
    fn test_failed_searches_are_recorded() {
        let dir = TempDir::new().unwrap();
        let store = QueryStore::open(dir.path().join("queries.db")).unwrap();

        store.record(&sample("9/2024", "CAPTCHA Failed")).unwrap();
        let history = store.recent(1).unwrap();
        assert_eq!(history[0].status, "CAPTCHA Failed");
    }
}
