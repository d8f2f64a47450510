//! Persisted downloads
//!
//! Only finished, non-transient downloads are written here. The row is what
//! lets an "open" or "delete" notification action work after a restart.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub notification_id: i32,
    pub profile_name: String,
    pub url: String,
    pub location: String,
    pub mime_type: Option<String>,
    pub total_bytes: Option<i64>,
    pub state: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadRecord> {
    let started_at: String = row.get(7)?;
    let completed_at: Option<String> = row.get(8)?;
    Ok(DownloadRecord {
        notification_id: row.get(0)?,
        profile_name: row.get(1)?,
        url: row.get(2)?,
        location: row.get(3)?,
        mime_type: row.get(4)?,
        total_bytes: row.get(5)?,
        state: row.get(6)?,
        started_at: parse_time(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_time).transpose()?,
    })
}

const COLUMNS: &str = "notification_id, profile_name, url, location, mime_type, total_bytes, \
                       state, started_at, completed_at";

impl Database {
    pub fn save_download(&self, record: &DownloadRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO downloads ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    COLUMNS
                ),
                rusqlite::params![
                    record.notification_id,
                    record.profile_name,
                    record.url,
                    record.location,
                    record.mime_type,
                    record.total_bytes,
                    record.state,
                    record.started_at.to_rfc3339(),
                    record.completed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_download(&self, notification_id: i32) -> Result<Option<DownloadRecord>> {
        self.with_connection(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {} FROM downloads WHERE notification_id = ?1", COLUMNS),
                    [notification_id],
                    record_from_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    pub fn list_downloads(&self, profile_name: &str) -> Result<Vec<DownloadRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM downloads WHERE profile_name = ?1 ORDER BY notification_id",
                COLUMNS
            ))?;
            let records = stmt
                .query_map([profile_name], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_download(&self, notification_id: i32) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM downloads WHERE notification_id = ?1",
                [notification_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn delete_downloads_for_profile(&self, profile_name: &str) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM downloads WHERE profile_name = ?1",
                [profile_name],
            )?;
            Ok(removed)
        })
    }
}
