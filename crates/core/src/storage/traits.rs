//! Storage repository traits
//!
//! These traits define the storage interface per collection, so the booking
//! and signup flows can run against SQLite or a test double.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    BookingStatus, CityUpdate, CommunityHall, Event, EventBooking, Feedback, HallBooking,
    ScanLog, User,
};

/// User profile operations
pub trait UserRepository {
    /// Create a profile record
    fn create_user(&self, user: &User) -> Result<()>;

    /// Find profile by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Update editable profile fields
    fn update_user(&self, user: &User) -> Result<()>;

    /// Add a category to the viewing history if not already present
    fn record_viewed_category(&self, user_id: Uuid, category: &str) -> Result<()>;

    /// Add an event to the liked list if not already present
    fn record_liked_event(&self, user_id: Uuid, event_id: Uuid) -> Result<()>;
}

/// Community hall operations
pub trait HallRepository {
    fn create_hall(&self, hall: &CommunityHall) -> Result<()>;

    fn find_hall_by_id(&self, id: Uuid) -> Result<Option<CommunityHall>>;

    /// All halls, newest first
    fn list_halls(&self) -> Result<Vec<CommunityHall>>;

    fn list_halls_by_owner(&self, owner_id: Uuid) -> Result<Vec<CommunityHall>>;

    fn update_hall(&self, hall: &CommunityHall) -> Result<()>;
}

/// Hall booking operations
pub trait HallBookingRepository {
    /// Insert a booking; a second active booking for the same hall and date
    /// is reported as [`crate::Error::Conflict`].
    fn create_hall_booking(&self, booking: &HallBooking) -> Result<()>;

    fn find_hall_booking_by_id(&self, id: Uuid) -> Result<Option<HallBooking>>;

    /// The non-cancelled, non-rejected booking holding a hall on a date
    fn find_active_hall_booking(&self, hall_id: Uuid, date: NaiveDate) -> Result<Option<HallBooking>>;

    fn list_hall_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<HallBooking>>;

    fn list_hall_bookings_for_hall(&self, hall_id: Uuid) -> Result<Vec<HallBooking>>;

    fn list_all_hall_bookings(&self) -> Result<Vec<HallBooking>>;

    fn update_hall_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()>;

    /// Set the verified flag; false when it was already set
    fn mark_hall_booking_verified(&self, id: Uuid) -> Result<bool>;
}

/// Event operations
pub trait EventRepository {
    fn create_event(&self, event: &Event) -> Result<()>;

    fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>>;

    /// All events in date order
    fn list_events(&self) -> Result<Vec<Event>>;

    fn list_events_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>>;

    /// Remove an event together with its bookings
    fn delete_event(&self, id: Uuid) -> Result<()>;
}

/// Event booking operations
pub trait EventBookingRepository {
    /// Insert a booking; a second active booking by the same user for the
    /// same event is reported as [`crate::Error::Conflict`].
    fn create_event_booking(&self, booking: &EventBooking) -> Result<()>;

    fn find_event_booking_by_id(&self, id: Uuid) -> Result<Option<EventBooking>>;

    fn find_active_event_booking(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<EventBooking>>;

    /// Tickets held by active bookings
    fn sum_active_tickets(&self, event_id: Uuid) -> Result<u32>;

    fn list_event_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>>;

    fn list_event_bookings_for_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>>;

    fn list_all_event_bookings(&self) -> Result<Vec<EventBooking>>;

    fn update_event_booking_status(&self, id: Uuid, status: BookingStatus) -> Result<()>;

    /// Set the verified flag; false when it was already set
    fn mark_event_booking_verified(&self, id: Uuid) -> Result<bool>;
}

/// Append-only city update feed
pub trait CityUpdateRepository {
    fn create_city_update(&self, update: &CityUpdate) -> Result<()>;

    /// Newest first, at most `limit`
    fn list_recent_city_updates(&self, limit: u32) -> Result<Vec<CityUpdate>>;

    fn find_city_update_by_id(&self, id: Uuid) -> Result<Option<CityUpdate>>;

    fn delete_city_update(&self, id: Uuid) -> Result<()>;
}

pub trait FeedbackRepository {
    fn create_feedback(&self, feedback: &Feedback) -> Result<()>;

    fn list_recent_feedback(&self, limit: u32) -> Result<Vec<Feedback>>;
}

pub trait ScanLogRepository {
    fn create_scan_log(&self, log: &ScanLog) -> Result<()>;

    fn list_scan_logs_for_booking(&self, booking_id: Uuid) -> Result<Vec<ScanLog>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
pub trait Storage:
    UserRepository
    + HallRepository
    + HallBookingRepository
    + EventRepository
    + EventBookingRepository
    + CityUpdateRepository
    + FeedbackRepository
    + ScanLogRepository
{
}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: UserRepository
        + HallRepository
        + HallBookingRepository
        + EventRepository
        + EventBookingRepository
        + CityUpdateRepository
        + FeedbackRepository
        + ScanLogRepository
{
}
