//! Event storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    format_date, format_time, money_to_sql, parse_date, parse_datetime, parse_json_list,
    parse_money, parse_time, parse_uuid, to_json_list, OptionalExt,
};
use crate::error::Result;
use crate::models::Event;

pub struct EventStore<'a> {
    conn: &'a Connection,
}

const EVENT_COLUMNS: &str = "id, organizer_id, title, description, date, time, location, category, \
     is_paid, price, max_seats, max_tickets, tags, contact, image_urls, created_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        organizer_id: parse_uuid(&row.get::<_, String>(1)?)?,
        title: row.get(2)?,
        description: row.get(3)?,
        date: parse_date(&row.get::<_, String>(4)?)?,
        time: parse_time(&row.get::<_, String>(5)?)?,
        location: row.get(6)?,
        category: row.get(7)?,
        is_paid: row.get(8)?,
        price: parse_money(row.get(9)?)?,
        max_seats: row.get(10)?,
        max_tickets: row.get(11)?,
        tags: parse_json_list(&row.get::<_, String>(12)?)?,
        contact: row.get(13)?,
        image_urls: parse_json_list(&row.get::<_, String>(14)?)?,
        created_at: parse_datetime(&row.get::<_, String>(15)?)?,
    })
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, title = %event.title))]
    pub fn create(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, organizer_id, title, description, date, time, location, category,
                 is_paid, price, max_seats, max_tickets, tags, contact, image_urls, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                event.id.to_string(),
                event.organizer_id.to_string(),
                event.title,
                event.description,
                format_date(event.date),
                format_time(event.time),
                event.location,
                event.category,
                event.is_paid,
                money_to_sql(event.price)?,
                event.max_seats,
                event.max_tickets,
                to_json_list(&event.tags),
                event.contact,
                to_json_list(&event.image_urls),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        let event = self
            .conn
            .query_row(&sql, params![id.to_string()], event_from_row)
            .optional()?;
        Ok(event)
    }

    /// All events in date order
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Event>> {
        let sql = format!("SELECT {} FROM events ORDER BY date, time", EVENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map([], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Delete an event row. Returns false when no such event exists.
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    /// Events created by an organizer, newest first
    #[instrument(skip(self))]
    pub fn list_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE organizer_id = ?1 ORDER BY created_at DESC",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![organizer_id.to_string()], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }
}
