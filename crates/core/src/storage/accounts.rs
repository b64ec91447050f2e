//! Identity account and session storage

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Account, Session};

pub struct AccountStore<'a> {
    conn: &'a Connection,
}

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, display_name, photo_url, created_at, last_login";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        photo_url: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        last_login: parse_datetime_opt(row.get::<_, Option<String>>(6)?)?,
    })
}

impl<'a> AccountStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new account
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub fn create(&self, account: &Account) -> Result<()> {
        self.conn.execute(
            "INSERT INTO accounts (id, email, password_hash, display_name, photo_url, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.id.to_string(),
                account.email,
                account.password_hash,
                account.display_name,
                account.photo_url,
                account.created_at.to_rfc3339(),
                account.last_login.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Find account by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        let account = self
            .conn
            .query_row(&sql, params![id.to_string()], account_from_row)
            .optional()?;
        Ok(account)
    }

    /// Find account by email (case-insensitive)
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE email = ?1", ACCOUNT_COLUMNS);
        let account = self
            .conn
            .query_row(&sql, params![email], account_from_row)
            .optional()?;
        Ok(account)
    }

    /// Update display name and photo
    #[instrument(skip(self))]
    pub fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE accounts SET display_name = COALESCE(?1, display_name), photo_url = COALESCE(?2, photo_url)
             WHERE id = ?3",
            params![display_name, photo_url, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Update last login time
    pub fn update_last_login(&self, id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET last_login = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(account_id = %session.account_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, account_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.account_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find valid session
    #[instrument(skip(self))]
    pub fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, created_at, expires_at FROM sessions WHERE id = ?1 AND expires_at > ?2",
        )?;

        let now = Utc::now().to_rfc3339();
        let session = stmt
            .query_row(params![session_id.to_string(), now], |row| {
                Ok(Session {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    account_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Delete session
    pub fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}
