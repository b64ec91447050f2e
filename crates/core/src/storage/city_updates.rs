//! City update storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::CityUpdate;

pub struct CityUpdateStore<'a> {
    conn: &'a Connection,
}

fn update_from_row(row: &Row<'_>) -> rusqlite::Result<CityUpdate> {
    Ok(CityUpdate {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        author_id: parse_uuid(&row.get::<_, String>(1)?)?,
        title: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        image_url: row.get(5)?,
        location: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

impl<'a> CityUpdateStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, update), fields(update_id = %update.id, category = %update.category))]
    pub fn create(&self, update: &CityUpdate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO city_updates (id, author_id, title, category, description, image_url, location, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                update.id.to_string(),
                update.author_id.to_string(),
                update.title,
                update.category,
                update.description,
                update.image_url,
                update.location,
                update.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<CityUpdate>> {
        let update = self
            .conn
            .query_row(
                "SELECT id, author_id, title, category, description, image_url, location, created_at
                 FROM city_updates WHERE id = ?1",
                params![id.to_string()],
                update_from_row,
            )
            .optional()?;
        Ok(update)
    }

    /// Returns false when no such update exists
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM city_updates WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    /// Most recent updates first
    #[instrument(skip(self))]
    pub fn list_recent(&self, limit: u32) -> Result<Vec<CityUpdate>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, author_id, title, category, description, image_url, location, created_at
             FROM city_updates ORDER BY created_at DESC LIMIT ?1",
        )?;
        let updates = stmt
            .query_map(params![limit], update_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn test_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        let author = Uuid::new_v4();

        for (i, title) in ["Old", "Middle", "New"].iter().enumerate() {
            let mut update = CityUpdate::new(
                author,
                title.to_string(),
                "Roads".into(),
                "Pothole repaired".into(),
            );
            update.created_at = Utc::now() - Duration::hours(10 - i as i64);
            db.city_updates().create(&update).unwrap();
        }

        let titles: Vec<_> = db
            .city_updates()
            .list_recent(2)
            .unwrap()
            .into_iter()
            .map(|u| u.title)
            .collect();
        assert_eq!(titles, vec!["New", "Middle"]);
    }
}
