//! User profile storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_json_list, parse_role, parse_uuid, to_json_list, OptionalExt};
use crate::error::Result;
use crate::models::User;

pub struct UserStore<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str =
    "id, name, email, phone, gender, city, role, viewed_categories, liked_events, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        gender: row.get(4)?,
        city: row.get(5)?,
        role: parse_role(&row.get::<_, String>(6)?)?,
        viewed_categories: parse_json_list(&row.get::<_, String>(7)?)?,
        liked_events: parse_json_list(&row.get::<_, String>(8)?)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?)?,
    })
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a profile record
    #[instrument(skip(self, user), fields(user_id = %user.id, role = user.role.as_str()))]
    pub fn create(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, phone, gender, city, role, viewed_categories, liked_events, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.phone,
                user.gender,
                user.city,
                user.role.as_str(),
                to_json_list(&user.viewed_categories),
                to_json_list(&user.liked_events),
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find profile by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = self
            .conn
            .query_row(&sql, params![id.to_string()], user_from_row)
            .optional()?;
        Ok(user)
    }

    /// Update editable profile fields
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn update(&self, user: &User) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE users SET name = ?1, phone = ?2, gender = ?3, city = ?4, role = ?5 WHERE id = ?6",
            params![
                user.name,
                user.phone,
                user.gender,
                user.city,
                user.role.as_str(),
                user.id.to_string(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Store the browsing history lists
    pub fn update_history(
        &self,
        id: Uuid,
        viewed_categories: &[String],
        liked_events: &[Uuid],
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE users SET viewed_categories = ?1, liked_events = ?2 WHERE id = ?3",
            params![
                to_json_list(viewed_categories),
                to_json_list(liked_events),
                id.to_string(),
            ],
        )?;
        Ok(changed > 0)
    }
}
