//! Creating and removing listings
//!
//! Halls, events, city updates and feedback are written here after the
//! required-field and role checks. Organizers remove their own events;
//! admins moderate any event or city update and see every booking.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::{assert_event_invariants, assert_hall_invariants};
use crate::models::{CityUpdate, CommunityHall, Event, EventBooking, Feedback, HallBooking, User};
use crate::permissions::{AccessPolicy, Capability};
use crate::storage::Storage;
use crate::validation::{is_valid_email, require, ValidationError};

fn ensure(policy: &AccessPolicy, user: &User, capability: Capability) -> Result<()> {
    if policy.can(user, capability) {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!("{:?}", capability)))
    }
}

/// List a hall owned by `owner`
#[instrument(skip_all, fields(owner_id = %owner.id, hall_name = %hall.name))]
pub fn add_hall<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    owner: &User,
    mut hall: CommunityHall,
) -> Result<CommunityHall> {
    ensure(policy, owner, Capability::AddHalls)?;
    require(&hall.name, "Hall name")?;
    require(&hall.location, "Location")?;
    if hall.capacity == 0 {
        return Err(ValidationError::Capacity.into());
    }

    hall.owner_id = owner.id;
    assert_hall_invariants(&hall);
    storage.create_hall(&hall)?;
    info!(hall_id = %hall.id, "Hall listed");
    Ok(hall)
}

/// Publish an event organised by `organizer`
#[instrument(skip_all, fields(organizer_id = %organizer.id, title = %event.title))]
pub fn create_event<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    organizer: &User,
    mut event: Event,
) -> Result<Event> {
    ensure(policy, organizer, Capability::CreateEvents)?;
    require(&event.title, "Title")?;
    require(&event.category, "Category")?;
    if event.max_seats == 0 {
        return Err(ValidationError::Capacity.into());
    }
    if let Some(max) = event.max_tickets {
        if max == 0 || max > event.max_seats {
            return Err(ValidationError::Quantity {
                max: event.max_seats,
            }
            .into());
        }
    }

    event.organizer_id = organizer.id;
    event.is_paid = !event.price.is_zero();
    assert_event_invariants(&event);
    storage.create_event(&event)?;
    info!(event_id = %event.id, "Event created");
    Ok(event)
}

/// Events organised by `organizer`, newest first
pub fn organizer_events<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    organizer: &User,
) -> Result<Vec<Event>> {
    ensure(policy, organizer, Capability::ViewOwnEvents)?;
    storage.list_events_by_organizer(organizer.id)
}

/// Delete an event. Its organizer may delete it while no booking is
/// active; admins may delete any event. Remaining bookings go with it.
#[instrument(skip_all, fields(user_id = %user.id, event_id = %event_id))]
pub fn delete_event<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    user: &User,
    event_id: Uuid,
) -> Result<()> {
    let event = storage
        .find_event_by_id(event_id)?
        .ok_or_else(|| Error::NotFound(format!("Event {}", event_id)))?;

    let moderator = policy.can(user, Capability::ModerateContent);
    if !moderator {
        if event.organizer_id != user.id {
            return Err(Error::PermissionDenied(
                "Only the organizer can delete this event".to_string(),
            ));
        }
        let active = storage
            .list_event_bookings_for_event(event_id)?
            .iter()
            .any(|b| b.status.is_active());
        if active {
            return Err(Error::InvalidOperation(
                "Cancel the active bookings before deleting this event.".to_string(),
            ));
        }
    }

    storage.delete_event(event_id)?;
    info!(moderated = moderator, "Event deleted");
    Ok(())
}

#[instrument(skip_all, fields(author_id = %author.id))]
pub fn post_city_update<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    author: &User,
    mut update: CityUpdate,
) -> Result<CityUpdate> {
    ensure(policy, author, Capability::PostCityUpdates)?;
    require(&update.title, "Title")?;
    require(&update.category, "Category")?;
    require(&update.description, "Description")?;

    update.author_id = author.id;
    storage.create_city_update(&update)?;
    Ok(update)
}

/// Take down a city update
#[instrument(skip_all, fields(moderator_id = %moderator.id, update_id = %update_id))]
pub fn remove_city_update<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    moderator: &User,
    update_id: Uuid,
) -> Result<()> {
    ensure(policy, moderator, Capability::ModerateContent)?;
    storage.delete_city_update(update_id)?;
    info!("City update removed");
    Ok(())
}

/// Every hall and event booking on the platform
#[derive(Debug, Clone, Default)]
pub struct BookingOverview {
    pub hall_bookings: Vec<HallBooking>,
    pub event_bookings: Vec<EventBooking>,
}

pub fn all_bookings<S: Storage>(
    storage: &S,
    policy: &AccessPolicy,
    admin: &User,
) -> Result<BookingOverview> {
    ensure(policy, admin, Capability::ViewAllBookings)?;
    Ok(BookingOverview {
        hall_bookings: storage.list_all_hall_bookings()?,
        event_bookings: storage.list_all_event_bookings()?,
    })
}

/// Contact-form feedback; no account needed
#[instrument(skip_all)]
pub fn submit_feedback<S: Storage>(storage: &S, feedback: Feedback) -> Result<Feedback> {
    require(&feedback.name, "Name")?;
    require(&feedback.message, "Message")?;
    if !is_valid_email(feedback.email.trim()) {
        return Err(ValidationError::Email.into());
    }

    storage.create_feedback(&feedback)?;
    info!(feedback_id = %feedback.id, "Feedback received");
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::pricing::Money;
    use crate::feed::{ChangeKind, Collection};
    use crate::models::{BookingStatus, PaymentStatus};
    use crate::storage::{
        CityUpdateRepository, Database, EventBookingRepository, EventRepository,
        FeedbackRepository, HallRepository,
    };
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn user(role: UserRole) -> User {
        User::new(Uuid::new_v4(), "Owner".into(), "owner@example.com".into(), role)
    }

    #[test]
    fn test_only_hall_owners_add_halls() {
        let db = Database::open_in_memory().unwrap();
        let policy = AccessPolicy::default();
        let hall = CommunityHall::new(
            "Shanti Hall".into(),
            "Kothrud".into(),
            100,
            Money::from_rupees(300),
            Uuid::nil(),
        );

        assert!(matches!(
            add_hall(&db, &policy, &user(UserRole::User), hall.clone()),
            Err(Error::PermissionDenied(_))
        ));

        let owner = user(UserRole::HallOwner);
        let stored = add_hall(&db, &policy, &owner, hall).unwrap();
        assert_eq!(stored.owner_id, owner.id);
        assert_eq!(db.list_halls_by_owner(owner.id).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_capacity_hall_rejected() {
        let db = Database::open_in_memory().unwrap();
        let policy = AccessPolicy::default();
        let mut hall = CommunityHall::new(
            "Tiny".into(),
            "Baner".into(),
            1,
            Money::ZERO,
            Uuid::nil(),
        );
        hall.capacity = 0;

        let err = add_hall(&db, &policy, &user(UserRole::HallOwner), hall).unwrap_err();
        assert_eq!(err.to_string(), "Capacity must be greater than zero.");
    }

    #[test]
    fn test_event_ticket_limit_within_seats() {
        let db = Database::open_in_memory().unwrap();
        let policy = AccessPolicy::default();
        let organizer = user(UserRole::Organizer);
        let event = Event::new(
            Uuid::nil(),
            "Meetup".into(),
            NaiveDate::from_ymd_opt(2030, 1, 5).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            "Meeting".into(),
            10,
        );

        assert!(create_event(&db, &policy, &organizer, event.clone().with_max_tickets(11)).is_err());
        let stored = create_event(&db, &policy, &organizer, event.with_max_tickets(4)).unwrap();
        assert_eq!(stored.organizer_id, organizer.id);
    }

    #[test]
    fn test_city_update_and_feedback_required_fields() {
        let db = Database::open_in_memory().unwrap();
        let policy = AccessPolicy::default();
        let author = user(UserRole::User);

        let blank = CityUpdate::new(Uuid::nil(), "".into(), "Roads".into(), "x".into());
        assert!(post_city_update(&db, &policy, &author, blank).is_err());

        let update = CityUpdate::new(Uuid::nil(), "Road repair".into(), "Roads".into(), "Done".into());
        post_city_update(&db, &policy, &author, update).unwrap();
        assert_eq!(db.list_recent_city_updates(10).unwrap()[0].author_id, author.id);

        let bad_email = Feedback::new("Asha".into(), "not-an-email".into(), "Great app".into());
        assert!(submit_feedback(&db, bad_email).is_err());
        let ok = Feedback::new("Asha".into(), "asha@example.com".into(), "Great app".into());
        submit_feedback(&db, ok).unwrap();
        assert_eq!(db.list_recent_feedback(5).unwrap().len(), 1);
    }

    fn meetup(db: &Database, policy: &AccessPolicy, organizer: &User) -> Event {
        let event = Event::new(
            Uuid::nil(),
            "Meetup".into(),
            NaiveDate::from_ymd_opt(2030, 1, 5).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            "Meeting".into(),
            10,
        );
        create_event(db, policy, organizer, event).unwrap()
    }

    fn ticket(event: &Event, status: BookingStatus) -> EventBooking {
        EventBooking {
            id: Uuid::new_v4(),
            event_id: event.id,
            event_name: event.title.clone(),
            user_id: Uuid::new_v4(),
            user_email: "fan@example.com".into(),
            person_name: "Fan".into(),
            contact_info: "9876543210".into(),
            tickets: 1,
            notes: String::new(),
            total_amount: Money::ZERO,
            payment_status: PaymentStatus::Paid,
            status,
            verified: false,
            created_at: Utc::now(),
        }
    }

    fn admin() -> (AccessPolicy, User) {
        let policy = AccessPolicy::new(["admin@mycitiverse.in"]);
        let admin = User::new(
            Uuid::new_v4(),
            "Admin".into(),
            "admin@mycitiverse.in".into(),
            UserRole::User,
        );
        (policy, admin)
    }

    #[test]
    fn test_organizer_deletes_own_event() {
        let db = Database::open_in_memory().unwrap();
        let policy = AccessPolicy::default();
        let organizer = user(UserRole::Organizer);
        let event = meetup(&db, &policy, &organizer);
        db.create_event_booking(&ticket(&event, BookingStatus::Cancelled))
            .unwrap();

        assert!(matches!(
            delete_event(&db, &policy, &user(UserRole::Organizer), event.id),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            delete_event(&db, &policy, &user(UserRole::User), event.id),
            Err(Error::PermissionDenied(_))
        ));

        let sub = db.subscribe(Collection::Events);
        delete_event(&db, &policy, &organizer, event.id).unwrap();

        assert!(db.find_event_by_id(event.id).unwrap().is_none());
        assert!(db.list_event_bookings_for_event(event.id).unwrap().is_empty());
        let changes = sub.drain();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Removed);
        assert!(matches!(
            delete_event(&db, &policy, &organizer, event.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_active_bookings_need_a_moderator() {
        let db = Database::open_in_memory().unwrap();
        let (policy, admin) = admin();
        let organizer = user(UserRole::Organizer);
        let event = meetup(&db, &policy, &organizer);
        db.create_event_booking(&ticket(&event, BookingStatus::Confirmed))
            .unwrap();

        let err = delete_event(&db, &policy, &organizer, event.id).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(db.find_event_by_id(event.id).unwrap().is_some());

        delete_event(&db, &policy, &admin, event.id).unwrap();
        assert!(db.find_event_by_id(event.id).unwrap().is_none());
        assert!(db.list_all_event_bookings().unwrap().is_empty());
    }

    #[test]
    fn test_city_update_moderation() {
        let db = Database::open_in_memory().unwrap();
        let (policy, admin) = admin();
        let author = user(UserRole::User);
        let update = CityUpdate::new(Uuid::nil(), "Road repair".into(), "Roads".into(), "Done".into());
        let update = post_city_update(&db, &policy, &author, update).unwrap();

        assert!(matches!(
            remove_city_update(&db, &policy, &author, update.id),
            Err(Error::PermissionDenied(_))
        ));
        remove_city_update(&db, &policy, &admin, update.id).unwrap();
        assert!(db.find_city_update_by_id(update.id).unwrap().is_none());
        assert!(db.list_recent_city_updates(10).unwrap().is_empty());
        assert!(matches!(
            remove_city_update(&db, &policy, &admin, update.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_booking_overview_and_own_events() {
        let db = Database::open_in_memory().unwrap();
        let (policy, admin) = admin();
        let organizer = user(UserRole::Organizer);
        let event = meetup(&db, &policy, &organizer);
        db.create_event_booking(&ticket(&event, BookingStatus::Confirmed))
            .unwrap();

        assert!(matches!(
            all_bookings(&db, &policy, &organizer),
            Err(Error::PermissionDenied(_))
        ));
        let overview = all_bookings(&db, &policy, &admin).unwrap();
        assert!(overview.hall_bookings.is_empty());
        assert_eq!(overview.event_bookings.len(), 1);

        assert!(matches!(
            organizer_events(&db, &policy, &user(UserRole::User)),
            Err(Error::PermissionDenied(_))
        ));
        let mine = organizer_events(&db, &policy, &organizer).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, event.id);
    }
}
