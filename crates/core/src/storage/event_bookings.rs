//! Event booking storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    money_to_sql, parse_datetime, parse_money, parse_payment_status, parse_status, parse_uuid,
    OptionalExt,
};
use crate::error::Result;
use crate::models::{BookingStatus, EventBooking};

pub struct EventBookingStore<'a> {
    conn: &'a Connection,
}

const BOOKING_COLUMNS: &str = "id, event_id, event_name, user_id, user_email, person_name, \
     contact_info, tickets, notes, total_amount, payment_status, status, verified, created_at";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<EventBooking> {
    Ok(EventBooking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        event_id: parse_uuid(&row.get::<_, String>(1)?)?,
        event_name: row.get(2)?,
        user_id: parse_uuid(&row.get::<_, String>(3)?)?,
        user_email: row.get(4)?,
        person_name: row.get(5)?,
        contact_info: row.get(6)?,
        tickets: row.get(7)?,
        notes: row.get(8)?,
        total_amount: parse_money(row.get(9)?)?,
        payment_status: parse_payment_status(&row.get::<_, String>(10)?)?,
        status: parse_status(&row.get::<_, String>(11)?)?,
        verified: row.get(12)?,
        created_at: parse_datetime(&row.get::<_, String>(13)?)?,
    })
}

impl<'a> EventBookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a booking. Fails with a constraint violation when the user
    /// already holds an active booking for the event.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, event_id = %booking.event_id))]
    pub fn create(&self, booking: &EventBooking) -> Result<()> {
        self.conn.execute(
            "INSERT INTO event_bookings (id, event_id, event_name, user_id, user_email, person_name,
                 contact_info, tickets, notes, total_amount, payment_status, status, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                booking.id.to_string(),
                booking.event_id.to_string(),
                booking.event_name,
                booking.user_id.to_string(),
                booking.user_email,
                booking.person_name,
                booking.contact_info,
                booking.tickets,
                booking.notes,
                money_to_sql(booking.total_amount)?,
                booking.payment_status.as_str(),
                booking.status.as_str(),
                booking.verified,
                booking.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<EventBooking>> {
        let sql = format!("SELECT {} FROM event_bookings WHERE id = ?1", BOOKING_COLUMNS);
        let booking = self
            .conn
            .query_row(&sql, params![id.to_string()], booking_from_row)
            .optional()?;
        Ok(booking)
    }

    /// The user's active booking for an event, if any
    #[instrument(skip(self))]
    pub fn find_active_for_user(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<EventBooking>> {
        let sql = format!(
            "SELECT {} FROM event_bookings
             WHERE event_id = ?1 AND user_id = ?2 AND status NOT IN ('Cancelled', 'Rejected')
             LIMIT 1",
            BOOKING_COLUMNS
        );
        let booking = self
            .conn
            .query_row(
                &sql,
                params![event_id.to_string(), user_id.to_string()],
                booking_from_row,
            )
            .optional()?;
        Ok(booking)
    }

    /// Tickets held by active bookings for an event
    #[instrument(skip(self))]
    pub fn sum_active_tickets(&self, event_id: Uuid) -> Result<u32> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(tickets), 0) FROM event_bookings
             WHERE event_id = ?1 AND status NOT IN ('Cancelled', 'Rejected')",
            params![event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }

    /// A user's bookings, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>> {
        let sql = format!(
            "SELECT {} FROM event_bookings WHERE user_id = ?1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(params![user_id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Bookings for one event, newest first
    #[instrument(skip(self))]
    pub fn list_for_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>> {
        let sql = format!(
            "SELECT {} FROM event_bookings WHERE event_id = ?1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(params![event_id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Every event booking, newest first
    #[instrument(skip(self))]
    pub fn list_all(&self) -> Result<Vec<EventBooking>> {
        let sql = format!(
            "SELECT {} FROM event_bookings ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map([], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Drop every booking of an event, returning the removed ids
    #[instrument(skip(self))]
    pub fn delete_for_event(&self, event_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = self
            .list_for_event(event_id)?
            .into_iter()
            .map(|b| b.id)
            .collect();
        self.conn.execute(
            "DELETE FROM event_bookings WHERE event_id = ?1",
            params![event_id.to_string()],
        )?;
        Ok(ids)
    }

    #[instrument(skip(self))]
    pub fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE event_bookings SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Flip the verified flag. Returns false when already verified.
    #[instrument(skip(self))]
    pub fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE event_bookings SET verified = 1 WHERE id = ?1 AND verified = 0",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }
}
