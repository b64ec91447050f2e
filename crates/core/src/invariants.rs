//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{CommunityHall, Event, EventBooking, HallBooking};

/// Validate that a hall's stored state is internally consistent
pub fn assert_hall_invariants(hall: &CommunityHall) {
    debug_assert!(hall.capacity > 0, "Hall {} has zero capacity", hall.id);

    debug_assert!(
        !hall.name.trim().is_empty(),
        "Hall {} has empty name",
        hall.id
    );
}

/// Validate an event's seat configuration
pub fn assert_event_invariants(event: &Event) {
    debug_assert!(event.max_seats > 0, "Event {} has no seats", event.id);

    if let Some(max) = event.max_tickets {
        debug_assert!(
            max > 0 && max <= event.max_seats,
            "Event {} allows {} tickets per booking with {} seats",
            event.id,
            max,
            event.max_seats
        );
    }
}

/// Validate a hall booking about to be written
pub fn assert_hall_booking_invariants(booking: &HallBooking, hall: &CommunityHall) {
    debug_assert!(
        booking.attendees > 0 && booking.attendees <= hall.capacity,
        "Booking {} has {} attendees for capacity {}",
        booking.id,
        booking.attendees,
        hall.capacity
    );

    debug_assert!(
        hall.price_per_plate.checked_times(booking.attendees) == Some(booking.total_amount),
        "Booking {} total {} does not match {} x {}",
        booking.id,
        booking.total_amount,
        hall.price_per_plate,
        booking.attendees
    );
}

/// Validate an event booking about to be written
pub fn assert_event_booking_invariants(booking: &EventBooking, event: &Event) {
    debug_assert!(
        booking.tickets > 0 && booking.tickets <= event.max_seats,
        "Booking {} has {} tickets for {} seats",
        booking.id,
        booking.tickets,
        event.max_seats
    );

    debug_assert!(
        event.price.checked_times(booking.tickets) == Some(booking.total_amount),
        "Booking {} total {} does not match {} x {}",
        booking.id,
        booking.total_amount,
        event.price,
        booking.tickets
    );
}
