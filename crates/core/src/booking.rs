//! Booking conflict checker
//!
//! Validates a hall or event booking request, rejects conflicts with
//! existing active bookings, computes the total and writes the booking
//! exactly once at the end. The storage layer backs the conflict pre-check
//! with unique indexes, so a racing second write surfaces as the same
//! conflict.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result, EVENT_ALREADY_BOOKED, HALL_DATE_TAKEN};
use crate::invariants::{assert_event_booking_invariants, assert_hall_booking_invariants};
use crate::models::{
    BookingKind, BookingPurpose, BookingStatus, EventBooking, HallBooking, PaymentStatus,
    ScanLog, User,
};
use crate::permissions::{AccessPolicy, Capability};
use crate::pricing::Money;
use crate::storage::{Storage, DATE_FORMAT, TIME_FORMAT};
use crate::validation::{is_valid_name, is_valid_phone, require, ValidationError};

const QR_PREFIX: &str = "citiverse";

/// Hall booking form as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallBookingRequest {
    pub hall_id: Uuid,
    /// ISO date, `YYYY-MM-DD`
    pub date: String,
    /// 24-hour time, `HH:MM`
    pub time: String,
    pub person_name: String,
    pub contact_info: String,
    pub attendees: i64,
    pub purpose: BookingPurpose,
    pub notes: String,
}

/// Event booking form as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBookingRequest {
    pub event_id: Uuid,
    pub person_name: String,
    pub contact_info: String,
    pub tickets: i64,
    pub notes: String,
}

/// What the caller shows on the confirmation view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub kind: BookingKind,
    pub status: BookingStatus,
    pub total_amount: Money,
    /// Text encoded into the ticket QR code
    pub qr_payload: String,
}

/// Owner decision on a pending hall booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn status(self) -> BookingStatus {
        match self {
            ReviewDecision::Approve => BookingStatus::Approved,
            ReviewDecision::Reject => BookingStatus::Rejected,
        }
    }
}

/// Result of checking a scanned ticket at the door
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    NotFound,
    AlreadyVerified { booking_id: Uuid },
    Verified {
        booking_id: Uuid,
        kind: BookingKind,
        user_name: String,
        subject: String,
    },
}

/// Encode a booking reference for a QR code
pub fn qr_payload(kind: BookingKind, booking_id: Uuid) -> String {
    format!("{}:{}:{}", QR_PREFIX, kind.as_str(), booking_id)
}

/// Decode a scanned QR payload. A bare booking id is accepted without a kind.
pub fn parse_qr_payload(payload: &str) -> Option<(Option<BookingKind>, Uuid)> {
    let payload = payload.trim();
    match payload.split(':').collect::<Vec<_>>().as_slice() {
        [prefix, kind, id] if *prefix == QR_PREFIX => {
            let kind = match *kind {
                "hall" => BookingKind::Hall,
                "event" => BookingKind::Event,
                _ => return None,
            };
            Uuid::parse_str(id).ok().map(|id| (Some(kind), id))
        }
        [id] => Uuid::parse_str(id).ok().map(|id| (None, id)),
        _ => None,
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| ValidationError::Date(s.to_string()))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT).map_err(|_| ValidationError::Time(s.to_string()))
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn total_for(unit: Money, quantity: u32) -> Result<Money> {
    unit.checked_times(quantity)
        .ok_or_else(|| Error::InvalidOperation("Booking total is too large".to_string()))
}

/// Booking operations over a storage backend
pub struct BookingService<'a, S: Storage> {
    storage: &'a S,
    policy: &'a AccessPolicy,
}

impl<'a, S: Storage> BookingService<'a, S> {
    pub fn new(storage: &'a S, policy: &'a AccessPolicy) -> Self {
        Self { storage, policy }
    }

    fn require(&self, user: &User, capability: Capability) -> Result<()> {
        if self.policy.can(user, capability) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!("{:?}", capability)))
        }
    }

    /// Book a hall against the current local time
    pub fn submit_hall_booking(
        &self,
        user: &User,
        request: &HallBookingRequest,
    ) -> Result<BookingConfirmation> {
        self.submit_hall_booking_at(user, request, local_now())
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, hall_id = %request.hall_id))]
    pub fn submit_hall_booking_at(
        &self,
        user: &User,
        request: &HallBookingRequest,
        now: NaiveDateTime,
    ) -> Result<BookingConfirmation> {
        self.require(user, Capability::BookHalls)?;

        let hall = self
            .storage
            .find_hall_by_id(request.hall_id)?
            .ok_or_else(|| Error::NotFound(format!("Hall {}", request.hall_id)))?;
        if !hall.available {
            return Err(Error::InvalidOperation(
                "This hall is not available for booking.".to_string(),
            ));
        }

        // Required fields, then the party size bound
        require(&request.date, "Date")?;
        require(&request.time, "Time")?;
        require(&request.person_name, "Name")?;
        require(&request.contact_info, "Contact")?;
        if !is_valid_name(request.person_name.trim()) {
            return Err(ValidationError::Name.into());
        }
        if let BookingPurpose::Other(text) = &request.purpose {
            if text.trim().is_empty() {
                return Err(ValidationError::PurposeUnspecified.into());
            }
        }

        if request.attendees <= 0 {
            return Err(ValidationError::Quantity { max: hall.capacity }.into());
        }
        let attendees = u32::try_from(request.attendees).unwrap_or(u32::MAX);
        if attendees > hall.capacity {
            return Err(Error::CapacityExceeded {
                requested: attendees,
                capacity: hall.capacity,
            });
        }

        let date = parse_date(&request.date)?;
        let time = parse_time(&request.time)?;
        if date.and_time(time) <= now {
            return Err(ValidationError::NotInFuture.into());
        }

        if let Some(existing) = self.storage.find_active_hall_booking(hall.id, date)? {
            info!(existing = %existing.id, %date, "Hall date already taken");
            return Err(Error::Conflict(HALL_DATE_TAKEN.to_string()));
        }

        let status = if hall.requires_approval {
            BookingStatus::Pending
        } else {
            BookingStatus::Confirmed
        };

        let booking = HallBooking {
            id: Uuid::new_v4(),
            hall_id: hall.id,
            hall_name: hall.name.clone(),
            user_id: user.id,
            user_email: user.email.clone(),
            date,
            time,
            person_name: request.person_name.trim().to_string(),
            contact_info: request.contact_info.trim().to_string(),
            attendees,
            purpose: match &request.purpose {
                BookingPurpose::Other(text) => BookingPurpose::Other(text.trim().to_string()),
                other => other.clone(),
            },
            notes: request.notes.clone(),
            total_amount: total_for(hall.price_per_plate, attendees)?,
            status,
            verified: false,
            created_at: Utc::now(),
        };
        assert_hall_booking_invariants(&booking, &hall);

        self.storage.create_hall_booking(&booking)?;
        info!(booking_id = %booking.id, status = %booking.status, total = %booking.total_amount, "Hall booked");

        Ok(BookingConfirmation {
            booking_id: booking.id,
            kind: BookingKind::Hall,
            status: booking.status,
            total_amount: booking.total_amount,
            qr_payload: qr_payload(BookingKind::Hall, booking.id),
        })
    }

    /// Book event tickets against the current local time
    pub fn submit_event_booking(
        &self,
        user: &User,
        request: &EventBookingRequest,
    ) -> Result<BookingConfirmation> {
        self.submit_event_booking_at(user, request, local_now())
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, event_id = %request.event_id))]
    pub fn submit_event_booking_at(
        &self,
        user: &User,
        request: &EventBookingRequest,
        now: NaiveDateTime,
    ) -> Result<BookingConfirmation> {
        self.require(user, Capability::BookEvents)?;

        let event = self
            .storage
            .find_event_by_id(request.event_id)?
            .ok_or_else(|| Error::NotFound(format!("Event {}", request.event_id)))?;

        require(&request.person_name, "Name")?;
        require(&request.contact_info, "Contact")?;
        if !is_valid_name(request.person_name.trim()) {
            return Err(ValidationError::Name.into());
        }
        if !is_valid_phone(request.contact_info.trim()) {
            return Err(ValidationError::Phone.into());
        }

        let limit = event.max_tickets.unwrap_or(event.max_seats).min(event.max_seats);
        if request.tickets <= 0 || request.tickets > i64::from(limit) {
            return Err(ValidationError::Quantity { max: limit }.into());
        }
        let tickets = u32::try_from(request.tickets).unwrap_or(u32::MAX);

        if event.starts_at() <= now {
            return Err(ValidationError::NotInFuture.into());
        }

        if self
            .storage
            .find_active_event_booking(event.id, user.id)?
            .is_some()
        {
            return Err(Error::Conflict(EVENT_ALREADY_BOOKED.to_string()));
        }

        let remaining = event
            .max_seats
            .saturating_sub(self.storage.sum_active_tickets(event.id)?);
        if tickets > remaining {
            return Err(Error::CapacityExceeded {
                requested: tickets,
                capacity: remaining,
            });
        }

        let booking = EventBooking {
            id: Uuid::new_v4(),
            event_id: event.id,
            event_name: event.title.clone(),
            user_id: user.id,
            user_email: user.email.clone(),
            person_name: request.person_name.trim().to_string(),
            contact_info: request.contact_info.trim().to_string(),
            tickets,
            notes: request.notes.clone(),
            total_amount: total_for(event.price, tickets)?,
            payment_status: PaymentStatus::Paid,
            status: BookingStatus::Confirmed,
            verified: false,
            created_at: Utc::now(),
        };
        assert_event_booking_invariants(&booking, &event);

        self.storage.create_event_booking(&booking)?;
        info!(booking_id = %booking.id, tickets, total = %booking.total_amount, "Event booked");

        Ok(BookingConfirmation {
            booking_id: booking.id,
            kind: BookingKind::Event,
            status: booking.status,
            total_amount: booking.total_amount,
            qr_payload: qr_payload(BookingKind::Event, booking.id),
        })
    }

    /// Approve or reject a pending hall booking
    #[instrument(skip(self, reviewer), fields(reviewer_id = %reviewer.id))]
    pub fn review_hall_booking(
        &self,
        booking_id: Uuid,
        decision: ReviewDecision,
        reviewer: &User,
    ) -> Result<BookingStatus> {
        self.require(reviewer, Capability::ReviewHallBookings)?;

        let booking = self
            .storage
            .find_hall_booking_by_id(booking_id)?
            .ok_or_else(|| Error::NotFound(format!("Hall booking {}", booking_id)))?;
        let hall = self
            .storage
            .find_hall_by_id(booking.hall_id)?
            .ok_or_else(|| Error::NotFound(format!("Hall {}", booking.hall_id)))?;

        if hall.owner_id != reviewer.id && !self.policy.is_admin(reviewer) {
            return Err(Error::PermissionDenied(
                "Only the hall owner can review this booking".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(Error::InvalidOperation(format!(
                "Booking is already {}",
                booking.status
            )));
        }

        let status = decision.status();
        self.storage.update_hall_booking_status(booking_id, status)?;
        info!(%booking_id, %status, "Hall booking reviewed");
        Ok(status)
    }

    /// Cancel one of the user's own hall bookings
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn cancel_hall_booking(&self, booking_id: Uuid, user: &User) -> Result<()> {
        self.require(user, Capability::CancelOwnBookings)?;

        let booking = self
            .storage
            .find_hall_booking_by_id(booking_id)?
            .ok_or_else(|| Error::NotFound(format!("Hall booking {}", booking_id)))?;
        if booking.user_id != user.id {
            return Err(Error::PermissionDenied(
                "You can only cancel your own bookings".to_string(),
            ));
        }
        if !booking.status.is_active() {
            return Err(Error::InvalidOperation(format!(
                "Booking is already {}",
                booking.status
            )));
        }

        self.storage
            .update_hall_booking_status(booking_id, BookingStatus::Cancelled)?;
        info!(%booking_id, "Hall booking cancelled");
        Ok(())
    }

    /// Cancel one of the user's own event bookings
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn cancel_event_booking(&self, booking_id: Uuid, user: &User) -> Result<()> {
        self.require(user, Capability::CancelOwnBookings)?;

        let booking = self
            .storage
            .find_event_booking_by_id(booking_id)?
            .ok_or_else(|| Error::NotFound(format!("Event booking {}", booking_id)))?;
        if booking.user_id != user.id {
            return Err(Error::PermissionDenied(
                "You can only cancel your own bookings".to_string(),
            ));
        }
        if !booking.status.is_active() {
            return Err(Error::InvalidOperation(format!(
                "Booking is already {}",
                booking.status
            )));
        }

        self.storage
            .update_event_booking_status(booking_id, BookingStatus::Cancelled)?;
        info!(%booking_id, "Event booking cancelled");
        Ok(())
    }

    /// Check a scanned ticket, flip its verified flag and log the scan
    #[instrument(skip(self, staff), fields(staff_id = %staff.id))]
    pub fn verify_scan(&self, payload: &str, staff: &User) -> Result<ScanOutcome> {
        self.require(staff, Capability::VerifyBookingScans)?;

        let Some((kind, booking_id)) = parse_qr_payload(payload) else {
            warn!("Unreadable booking QR payload");
            return Ok(ScanOutcome::NotFound);
        };

        let found = match kind {
            Some(BookingKind::Hall) => self.hall_scan_target(booking_id)?,
            Some(BookingKind::Event) => self.event_scan_target(booking_id)?,
            None => match self.hall_scan_target(booking_id)? {
                Some(target) => Some(target),
                None => self.event_scan_target(booking_id)?,
            },
        };

        let Some((kind, verified, user_name, subject)) = found else {
            return Ok(ScanOutcome::NotFound);
        };
        if verified {
            return Ok(ScanOutcome::AlreadyVerified { booking_id });
        }

        let flipped = match kind {
            BookingKind::Hall => self.storage.mark_hall_booking_verified(booking_id)?,
            BookingKind::Event => self.storage.mark_event_booking_verified(booking_id)?,
        };
        if !flipped {
            return Ok(ScanOutcome::AlreadyVerified { booking_id });
        }

        self.storage.create_scan_log(&ScanLog {
            id: Uuid::new_v4(),
            booking_id,
            booking_kind: kind,
            user_name: user_name.clone(),
            subject: subject.clone(),
            scanned_by: staff.id,
            scanned_at: Utc::now(),
        })?;
        info!(%booking_id, kind = kind.as_str(), "Booking verified at the door");

        Ok(ScanOutcome::Verified {
            booking_id,
            kind,
            user_name,
            subject,
        })
    }

    fn hall_scan_target(&self, id: Uuid) -> Result<Option<(BookingKind, bool, String, String)>> {
        Ok(self
            .storage
            .find_hall_booking_by_id(id)?
            .map(|b| (BookingKind::Hall, b.verified, b.person_name, b.hall_name)))
    }

    fn event_scan_target(&self, id: Uuid) -> Result<Option<(BookingKind, bool, String, String)>> {
        Ok(self
            .storage
            .find_event_booking_by_id(id)?
            .map(|b| (BookingKind::Event, b.verified, b.person_name, b.event_name)))
    }
}
