//! Hall and event booking models

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Money;

/// Lifecycle of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Waiting for the hall owner
    Pending,
    Confirmed,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Approved => "Approved",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Active bookings hold their slot
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(BookingStatus::Pending),
            "Confirmed" | "confirmed" => Ok(BookingStatus::Confirmed),
            "Approved" | "approved" => Ok(BookingStatus::Approved),
            "Rejected" | "rejected" => Ok(BookingStatus::Rejected),
            "Cancelled" | "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
        }
    }
}

/// Purpose selected on the hall booking form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingPurpose {
    Wedding,
    Birthday,
    Meeting,
    Seminar,
    /// Free-text purpose entered under "Others"
    Other(String),
}

impl BookingPurpose {
    pub fn label(&self) -> &str {
        match self {
            BookingPurpose::Wedding => "Wedding",
            BookingPurpose::Birthday => "Birthday",
            BookingPurpose::Meeting => "Meeting",
            BookingPurpose::Seminar => "Seminar",
            BookingPurpose::Other(text) => text,
        }
    }

    /// Inverse of `label`. Unknown labels are free-text purposes.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Wedding" => BookingPurpose::Wedding,
            "Birthday" => BookingPurpose::Birthday,
            "Meeting" => BookingPurpose::Meeting,
            "Seminar" => BookingPurpose::Seminar,
            other => BookingPurpose::Other(other.to_string()),
        }
    }
}

/// Which collection a booking lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingKind {
    Hall,
    Event,
}

impl BookingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Hall => "hall",
            BookingKind::Event => "event",
        }
    }
}

/// A reservation of a community hall for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallBooking {
    pub id: Uuid,
    pub hall_id: Uuid,
    pub hall_name: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub person_name: String,
    pub contact_info: String,
    pub attendees: u32,
    pub purpose: BookingPurpose,
    pub notes: String,
    /// price_per_plate x attendees at booking time
    pub total_amount: Money,
    pub status: BookingStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Tickets bought for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBooking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_name: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub person_name: String,
    pub contact_info: String,
    pub tickets: u32,
    pub notes: String,
    /// price x tickets at booking time
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_activity() {
        assert!(BookingStatus::Confirmed.is_active());
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Approved.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Rejected.is_active());
    }

    #[test]
    fn test_status_parse_accepts_dashboard_spelling() {
        assert_eq!("approved".parse::<BookingStatus>(), Ok(BookingStatus::Approved));
        assert_eq!("Cancelled".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert!("done".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_purpose_labels() {
        assert_eq!(BookingPurpose::from_label("Wedding"), BookingPurpose::Wedding);
        assert_eq!(
            BookingPurpose::from_label("Book launch"),
            BookingPurpose::Other("Book launch".to_string())
        );
        assert_eq!(BookingPurpose::Other("Puja".into()).label(), "Puja");
    }
}
