//! Feedback storage operations

use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{parse_datetime, parse_uuid};
use crate::error::Result;
use crate::models::Feedback;

pub struct FeedbackStore<'a> {
    conn: &'a Connection,
}

impl<'a> FeedbackStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, feedback), fields(feedback_id = %feedback.id))]
    pub fn create(&self, feedback: &Feedback) -> Result<()> {
        self.conn.execute(
            "INSERT INTO feedback (id, name, email, message, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feedback.id.to_string(),
                feedback.name,
                feedback.email,
                feedback.message,
                feedback.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent feedback first
    pub fn list_recent(&self, limit: u32) -> Result<Vec<Feedback>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, message, created_at FROM feedback
             ORDER BY created_at DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(Feedback {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    message: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
