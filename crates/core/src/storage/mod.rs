//! SQLite storage layer for Citiverse

mod accounts;
mod city_updates;
mod event_bookings;
mod events;
mod feedback;
mod hall_bookings;
mod halls;
mod migrations;
mod parse;
mod scan_logs;
mod traits;
mod users;

use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result, EVENT_ALREADY_BOOKED, HALL_DATE_TAKEN};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection, Subscription};
use crate::models::{
    BookingStatus, CityUpdate, CommunityHall, Event, EventBooking, Feedback, HallBooking,
    ScanLog, User,
};

pub use accounts::AccountStore;
pub use city_updates::CityUpdateStore;
pub use event_bookings::EventBookingStore;
pub use events::EventStore;
pub use feedback::FeedbackStore;
pub use hall_bookings::HallBookingStore;
pub use halls::HallStore;
pub use parse::{DATE_FORMAT, TIME_FORMAT};
pub use scan_logs::ScanLogStore;
pub use traits::{
    CityUpdateRepository, EventBookingRepository, EventRepository, FeedbackRepository,
    HallBookingRepository, HallRepository, ScanLogRepository, Storage, UserRepository,
};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
    feed: ChangeFeed,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self {
            conn,
            feed: ChangeFeed::new(),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_current_version(&self.conn)
    }

    /// Shared change feed; clones publish to the same subscribers
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Subscribe to writes on one collection
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        self.feed.subscribe(collection)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn publish(&self, collection: Collection, kind: ChangeKind, id: Uuid) {
        self.feed.publish(ChangeEvent {
            collection,
            kind,
            id,
        });
    }

    pub fn accounts(&self) -> AccountStore<'_> {
        AccountStore::new(&self.conn)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    pub fn halls(&self) -> HallStore<'_> {
        HallStore::new(&self.conn)
    }

    pub fn hall_bookings(&self) -> HallBookingStore<'_> {
        HallBookingStore::new(&self.conn)
    }

    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    pub fn event_bookings(&self) -> EventBookingStore<'_> {
        EventBookingStore::new(&self.conn)
    }

    pub fn city_updates(&self) -> CityUpdateStore<'_> {
        CityUpdateStore::new(&self.conn)
    }

    pub fn feedback(&self) -> FeedbackStore<'_> {
        FeedbackStore::new(&self.conn)
    }

    pub fn scan_logs(&self) -> ScanLogStore<'_> {
        ScanLogStore::new(&self.conn)
    }
}

/// Report a unique-index hit as the same conflict the pre-check raises
fn map_conflict(err: Error, message: &str) -> Error {
    match err {
        Error::Database(ref e) if parse::is_constraint_violation(e) => {
            warn!(%e, "Booking insert hit a uniqueness constraint");
            Error::Conflict(message.to_string())
        }
        other => other,
    }
}

fn require_found(changed: bool, what: &str, id: Uuid) -> Result<()> {
    if changed {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} {}", what, id)))
    }
}

// Implement repository traits for Database
// Every successful write is published on the change feed

impl UserRepository for Database {
    fn create_user(&self, user: &User) -> Result<()> {
        self.users().create(user)?;
        self.publish(Collection::Users, ChangeKind::Added, user.id);
        Ok(())
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        require_found(self.users().update(user)?, "User", user.id)?;
        self.publish(Collection::Users, ChangeKind::Modified, user.id);
        Ok(())
    }

    fn record_viewed_category(&self, user_id: Uuid, category: &str) -> Result<()> {
        let mut user = self
            .find_user_by_id(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

        if user.viewed_categories.iter().any(|c| c == category) {
            return Ok(());
        }
        user.viewed_categories.push(category.to_string());
        self.users()
            .update_history(user_id, &user.viewed_categories, &user.liked_events)?;
        self.publish(Collection::Users, ChangeKind::Modified, user_id);
        Ok(())
    }

    fn record_liked_event(&self, user_id: Uuid, event_id: Uuid) -> Result<()> {
        let mut user = self
            .find_user_by_id(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

        if user.liked_events.contains(&event_id) {
            return Ok(());
        }
        user.liked_events.push(event_id);
        self.users()
            .update_history(user_id, &user.viewed_categories, &user.liked_events)?;
        self.publish(Collection::Users, ChangeKind::Modified, user_id);
        Ok(())
    }
}

impl HallRepository for Database {
    fn create_hall(&self, hall: &CommunityHall) -> Result<()> {
        self.halls().create(hall)?;
        self.publish(Collection::CommunityHalls, ChangeKind::Added, hall.id);
        Ok(())
    }

    fn find_hall_by_id(&self, id: Uuid) -> Result<Option<CommunityHall>> {
        self.halls().find_by_id(id)
    }

    fn list_halls(&self) -> Result<Vec<CommunityHall>> {
        self.halls().list()
    }

    fn list_halls_by_owner(&self, owner_id: Uuid) -> Result<Vec<CommunityHall>> {
        self.halls().list_by_owner(owner_id)
    }

    fn update_hall(&self, hall: &CommunityHall) -> Result<()> {
        require_found(self.halls().update(hall)?, "Hall", hall.id)?;
        self.publish(Collection::CommunityHalls, ChangeKind::Modified, hall.id);
        Ok(())
    }
}

impl HallBookingRepository for Database {
    fn create_hall_booking(&self, booking: &HallBooking) -> Result<()> {
        self.hall_bookings()
            .create(booking)
            .map_err(|e| map_conflict(e, HALL_DATE_TAKEN))?;
        self.publish(Collection::HallBookings, ChangeKind::Added, booking.id);
        Ok(())
    }

    fn find_hall_booking_by_id(&self, id: Uuid) -> Result<Option<HallBooking>> {
        self.hall_bookings().find_by_id(id)
    }

    fn find_active_hall_booking(&self, hall_id: Uuid, date: NaiveDate) -> Result<Option<HallBooking>> {
        self.hall_bookings().find_active_for_date(hall_id, date)
    }

    fn list_hall_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<HallBooking>> {
        self.hall_bookings().list_for_user(user_id)
    }

    fn list_hall_bookings_for_hall(&self, hall_id: Uuid) -> Result<Vec<HallBooking>> {
        self.hall_bookings().list_for_hall(hall_id)
    }

    fn list_all_hall_bookings(&self) -> Result<Vec<HallBooking>> {
        self.hall_bookings().list_all()
    }

    fn update_hall_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()> {
        // Re-activating a booking can collide with a newer one on the same date
        let changed = self
            .hall_bookings()
            .update_status(id, status)
            .map_err(|e| map_conflict(e, HALL_DATE_TAKEN))?;
        require_found(changed, "Hall booking", id)?;
        self.publish(Collection::HallBookings, ChangeKind::Modified, id);
        Ok(())
    }

    fn mark_hall_booking_verified(&self, id: Uuid) -> Result<bool> {
        let flipped = self.hall_bookings().mark_verified(id)?;
        if flipped {
            self.publish(Collection::HallBookings, ChangeKind::Modified, id);
        }
        Ok(flipped)
    }
}

impl EventRepository for Database {
    fn create_event(&self, event: &Event) -> Result<()> {
        self.events().create(event)?;
        self.publish(Collection::Events, ChangeKind::Added, event.id);
        Ok(())
    }

    fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        self.events().find_by_id(id)
    }

    fn list_events(&self) -> Result<Vec<Event>> {
        self.events().list()
    }

    fn list_events_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>> {
        self.events().list_by_organizer(organizer_id)
    }

    fn delete_event(&self, id: Uuid) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let bookings = self.event_bookings().delete_for_event(id)?;
        require_found(self.events().delete(id)?, "Event", id)?;
        tx.commit()?;

        for booking_id in bookings {
            self.publish(Collection::EventBookings, ChangeKind::Removed, booking_id);
        }
        self.publish(Collection::Events, ChangeKind::Removed, id);
        Ok(())
    }
}

impl EventBookingRepository for Database {
    fn create_event_booking(&self, booking: &EventBooking) -> Result<()> {
        self.event_bookings()
            .create(booking)
            .map_err(|e| map_conflict(e, EVENT_ALREADY_BOOKED))?;
        self.publish(Collection::EventBookings, ChangeKind::Added, booking.id);
        Ok(())
    }

    fn find_event_booking_by_id(&self, id: Uuid) -> Result<Option<EventBooking>> {
        self.event_bookings().find_by_id(id)
    }

    fn find_active_event_booking(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<EventBooking>> {
        self.event_bookings().find_active_for_user(event_id, user_id)
    }

    fn sum_active_tickets(&self, event_id: Uuid) -> Result<u32> {
        self.event_bookings().sum_active_tickets(event_id)
    }

    fn list_event_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>> {
        self.event_bookings().list_for_user(user_id)
    }

    fn list_event_bookings_for_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>> {
        self.event_bookings().list_for_event(event_id)
    }

    fn list_all_event_bookings(&self) -> Result<Vec<EventBooking>> {
        self.event_bookings().list_all()
    }

    fn update_event_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()> {
        let changed = self
            .event_bookings()
            .update_status(id, status)
            .map_err(|e| map_conflict(e, EVENT_ALREADY_BOOKED))?;
        require_found(changed, "Event booking", id)?;
        self.publish(Collection::EventBookings, ChangeKind::Modified, id);
        Ok(())
    }

    fn mark_event_booking_verified(&self, id: Uuid) -> Result<bool> {
        let flipped = self.event_bookings().mark_verified(id)?;
        if flipped {
            self.publish(Collection::EventBookings, ChangeKind::Modified, id);
        }
        Ok(flipped)
    }
}

impl CityUpdateRepository for Database {
    fn create_city_update(&self, update: &CityUpdate) -> Result<()> {
        self.city_updates().create(update)?;
        self.publish(Collection::CityUpdates, ChangeKind::Added, update.id);
        Ok(())
    }

    fn list_recent_city_updates(&self, limit: u32) -> Result<Vec<CityUpdate>> {
        self.city_updates().list_recent(limit)
    }

    fn find_city_update_by_id(&self, id: Uuid) -> Result<Option<CityUpdate>> {
        self.city_updates().find_by_id(id)
    }

    fn delete_city_update(&self, id: Uuid) -> Result<()> {
        require_found(self.city_updates().delete(id)?, "City update", id)?;
        self.publish(Collection::CityUpdates, ChangeKind::Removed, id);
        Ok(())
    }
}

impl FeedbackRepository for Database {
    fn create_feedback(&self, feedback: &Feedback) -> Result<()> {
        self.feedback().create(feedback)?;
        self.publish(Collection::Feedback, ChangeKind::Added, feedback.id);
        Ok(())
    }

    fn list_recent_feedback(&self, limit: u32) -> Result<Vec<Feedback>> {
        self.feedback().list_recent(limit)
    }
}

impl ScanLogRepository for Database {
    fn create_scan_log(&self, log: &ScanLog) -> Result<()> {
        self.scan_logs().create(log)?;
        self.publish(Collection::ScanLogs, ChangeKind::Added, log.id);
        Ok(())
    }

    fn list_scan_logs_for_booking(&self, booking_id: Uuid) -> Result<Vec<ScanLog>> {
        self.scan_logs().list_for_booking(booking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::pricing::Money;
    use tempfile::tempdir;

    #[test]
    fn test_open_file_database_runs_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("citiverse.db");

        {
            let db = Database::open(&path).unwrap();
            assert!(db.schema_version().unwrap() >= 4);
        }

        // Reopening applies nothing new
        let db = Database::open(&path).unwrap();
        assert!(db.schema_version().unwrap() >= 4);
    }

    #[test]
    fn test_writes_publish_to_subscribers() {
        let db = Database::open_in_memory().unwrap();
        let sub = db.subscribe(Collection::Users);

        let user = User::new(Uuid::new_v4(), "Ravi".into(), "ravi@example.com".into(), UserRole::User);
        db.create_user(&user).unwrap();
        db.record_viewed_category(user.id, "Sports").unwrap();

        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeKind::Added);
        assert_eq!(events[1].kind, ChangeKind::Modified);
        assert!(events.iter().all(|e| e.id == user.id));
    }

    #[test]
    fn test_history_has_set_semantics() {
        let db = Database::open_in_memory().unwrap();
        let user = User::new(Uuid::new_v4(), "Meera".into(), "meera@example.com".into(), UserRole::User);
        db.create_user(&user).unwrap();

        let event_id = Uuid::new_v4();
        db.record_viewed_category(user.id, "Workshop").unwrap();
        db.record_viewed_category(user.id, "Workshop").unwrap();
        db.record_viewed_category(user.id, "Sports").unwrap();
        db.record_liked_event(user.id, event_id).unwrap();
        db.record_liked_event(user.id, event_id).unwrap();

        let loaded = db.find_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(loaded.viewed_categories, vec!["Workshop".to_string(), "Sports".to_string()]);
        assert_eq!(loaded.liked_events, vec![event_id]);
    }

    fn confirmed_hall_booking(hall: &CommunityHall, date: NaiveDate) -> HallBooking {
        HallBooking {
            id: Uuid::new_v4(),
            hall_id: hall.id,
            hall_name: hall.name.clone(),
            user_id: Uuid::new_v4(),
            user_email: "guest@example.com".into(),
            date,
            time: chrono::NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            person_name: "Guest".into(),
            contact_info: "9876543210".into(),
            attendees: 40,
            purpose: crate::models::BookingPurpose::Meeting,
            notes: String::new(),
            total_amount: Money::from_rupees(14_000),
            status: BookingStatus::Confirmed,
            verified: false,
            created_at: chrono::Utc::now(),
        }
    }

    fn confirmed_event_booking(event: &Event, user_id: Uuid) -> EventBooking {
        EventBooking {
            id: Uuid::new_v4(),
            event_id: event.id,
            event_name: event.title.clone(),
            user_id,
            user_email: "fan@example.com".into(),
            person_name: "Fan".into(),
            contact_info: "9876543210".into(),
            tickets: 2,
            notes: String::new(),
            total_amount: Money::from_rupees(200),
            payment_status: crate::models::PaymentStatus::Paid,
            status: BookingStatus::Confirmed,
            verified: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_racing_hall_insert_reports_date_taken() {
        let db = Database::open_in_memory().unwrap();
        let hall = CommunityHall::new(
            "Shanti Hall".into(),
            "Kothrud".into(),
            200,
            Money::from_rupees(350),
            Uuid::new_v4(),
        );
        db.create_hall(&hall).unwrap();
        let date = NaiveDate::from_ymd_opt(2030, 5, 1).unwrap();

        let sub = db.subscribe(Collection::HallBookings);
        db.create_hall_booking(&confirmed_hall_booking(&hall, date)).unwrap();
        let err = db
            .create_hall_booking(&confirmed_hall_booking(&hall, date))
            .unwrap_err();

        match err {
            Error::Conflict(message) => assert_eq!(message, HALL_DATE_TAKEN),
            other => panic!("unexpected error: {other:?}"),
        }
        // Only the first insert is announced
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn test_racing_event_insert_reports_already_booked() {
        let db = Database::open_in_memory().unwrap();
        let event = Event::new(
            Uuid::new_v4(),
            "Food Fest".into(),
            NaiveDate::from_ymd_opt(2030, 4, 10).unwrap(),
            chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            "Social".into(),
            50,
        );
        db.create_event(&event).unwrap();
        let fan = Uuid::new_v4();

        db.create_event_booking(&confirmed_event_booking(&event, fan)).unwrap();
        let err = db
            .create_event_booking(&confirmed_event_booking(&event, fan))
            .unwrap_err();

        match err {
            Error::Conflict(message) => assert_eq!(message, EVENT_ALREADY_BOOKED),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.sum_active_tickets(event.id).unwrap(), 2);
    }

    #[test]
    fn test_history_for_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        let err = db.record_viewed_category(Uuid::new_v4(), "Sports").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
