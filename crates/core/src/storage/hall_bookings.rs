//! Hall booking storage operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    format_date, format_time, money_to_sql, parse_date, parse_datetime, parse_money,
    parse_purpose, parse_status, parse_time, parse_uuid, purpose_to_sql, OptionalExt,
};
use crate::error::Result;
use crate::models::{BookingStatus, HallBooking};

pub struct HallBookingStore<'a> {
    conn: &'a Connection,
}

const BOOKING_COLUMNS: &str = "id, hall_id, hall_name, user_id, user_email, date, time, \
     person_name, contact_info, attendees, purpose, notes, total_amount, status, verified, created_at";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<HallBooking> {
    Ok(HallBooking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        hall_id: parse_uuid(&row.get::<_, String>(1)?)?,
        hall_name: row.get(2)?,
        user_id: parse_uuid(&row.get::<_, String>(3)?)?,
        user_email: row.get(4)?,
        date: parse_date(&row.get::<_, String>(5)?)?,
        time: parse_time(&row.get::<_, String>(6)?)?,
        person_name: row.get(7)?,
        contact_info: row.get(8)?,
        attendees: row.get(9)?,
        purpose: parse_purpose(&row.get::<_, String>(10)?),
        notes: row.get(11)?,
        total_amount: parse_money(row.get(12)?)?,
        status: parse_status(&row.get::<_, String>(13)?)?,
        verified: row.get(14)?,
        created_at: parse_datetime(&row.get::<_, String>(15)?)?,
    })
}

impl<'a> HallBookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a booking. Fails with a constraint violation when the hall
    /// already has an active booking on the same date.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, hall_id = %booking.hall_id, date = %booking.date))]
    pub fn create(&self, booking: &HallBooking) -> Result<()> {
        self.conn.execute(
            "INSERT INTO hall_bookings (id, hall_id, hall_name, user_id, user_email, date, time,
                 person_name, contact_info, attendees, purpose, notes, total_amount, status, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                booking.id.to_string(),
                booking.hall_id.to_string(),
                booking.hall_name,
                booking.user_id.to_string(),
                booking.user_email,
                format_date(booking.date),
                format_time(booking.time),
                booking.person_name,
                booking.contact_info,
                booking.attendees,
                purpose_to_sql(&booking.purpose),
                booking.notes,
                money_to_sql(booking.total_amount)?,
                booking.status.as_str(),
                booking.verified,
                booking.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find booking by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<HallBooking>> {
        let sql = format!("SELECT {} FROM hall_bookings WHERE id = ?1", BOOKING_COLUMNS);
        let booking = self
            .conn
            .query_row(&sql, params![id.to_string()], booking_from_row)
            .optional()?;
        Ok(booking)
    }

    /// The active booking holding a hall on a date, if any
    #[instrument(skip(self))]
    pub fn find_active_for_date(&self, hall_id: Uuid, date: NaiveDate) -> Result<Option<HallBooking>> {
        let sql = format!(
            "SELECT {} FROM hall_bookings
             WHERE hall_id = ?1 AND date = ?2 AND status NOT IN ('Cancelled', 'Rejected')
             LIMIT 1",
            BOOKING_COLUMNS
        );
        let booking = self
            .conn
            .query_row(
                &sql,
                params![hall_id.to_string(), format_date(date)],
                booking_from_row,
            )
            .optional()?;
        Ok(booking)
    }

    /// A user's bookings, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<HallBooking>> {
        let sql = format!(
            "SELECT {} FROM hall_bookings WHERE user_id = ?1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(params![user_id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Bookings for one hall, newest first
    #[instrument(skip(self))]
    pub fn list_for_hall(&self, hall_id: Uuid) -> Result<Vec<HallBooking>> {
        let sql = format!(
            "SELECT {} FROM hall_bookings WHERE hall_id = ?1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(params![hall_id.to_string()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    /// Every booking, newest first
    pub fn list_all(&self) -> Result<Vec<HallBooking>> {
        let sql = format!(
            "SELECT {} FROM hall_bookings ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map([], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }

    #[instrument(skip(self))]
    pub fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE hall_bookings SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Flip the verified flag. Returns false when already verified.
    #[instrument(skip(self))]
    pub fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE hall_bookings SET verified = 1 WHERE id = ?1 AND verified = 0",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }
}
