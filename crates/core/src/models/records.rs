//! Append-only records: city updates, feedback, scan logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BookingKind;

/// A news item on the city feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityUpdate {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl CityUpdate {
    pub fn new(author_id: Uuid, title: String, category: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            title,
            category,
            description,
            image_url: None,
            location: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = location;
        self
    }
}

/// Message left through the feedback button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(name: String, email: String, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            message,
            created_at: Utc::now(),
        }
    }
}

/// One successful staff-side QR verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLog {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub booking_kind: BookingKind,
    pub user_name: String,
    /// Hall or event name the booking was for
    pub subject: String,
    pub scanned_by: Uuid,
    pub scanned_at: DateTime<Utc>,
}
