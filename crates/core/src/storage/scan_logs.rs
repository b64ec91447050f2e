//! Scan log storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_booking_kind, parse_datetime, parse_uuid};
use crate::error::Result;
use crate::models::ScanLog;

pub struct ScanLogStore<'a> {
    conn: &'a Connection,
}

impl<'a> ScanLogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, log), fields(booking_id = %log.booking_id, kind = log.booking_kind.as_str()))]
    pub fn create(&self, log: &ScanLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO scan_logs (id, booking_id, booking_kind, user_name, subject, scanned_by, scanned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log.id.to_string(),
                log.booking_id.to_string(),
                log.booking_kind.as_str(),
                log.user_name,
                log.subject,
                log.scanned_by.to_string(),
                log.scanned_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Scans recorded for one booking, oldest first
    pub fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<ScanLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, booking_id, booking_kind, user_name, subject, scanned_by, scanned_at
             FROM scan_logs WHERE booking_id = ?1 ORDER BY scanned_at",
        )?;
        let logs = stmt
            .query_map(params![booking_id.to_string()], |row| {
                Ok(ScanLog {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    booking_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    booking_kind: parse_booking_kind(&row.get::<_, String>(2)?)?,
                    user_name: row.get(3)?,
                    subject: row.get(4)?,
                    scanned_by: parse_uuid(&row.get::<_, String>(5)?)?,
                    scanned_at: parse_datetime(&row.get::<_, String>(6)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}
