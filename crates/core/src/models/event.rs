//! Event model

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Money;

/// Categories offered by the organize form
pub const EVENT_CATEGORIES: &[&str] = &[
    "Meeting",
    "Conference",
    "Workshop",
    "Social",
    "Sports",
    "Other",
];

/// An event published by an organizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub category: String,
    pub is_paid: bool,
    /// Ticket price, zero for free events
    pub price: Money,
    /// Total seats across all bookings
    pub max_seats: u32,
    /// Optional cap on tickets in a single booking
    pub max_tickets: Option<u32>,
    pub tags: Vec<String>,
    pub contact: String,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        organizer_id: Uuid,
        title: String,
        date: NaiveDate,
        time: NaiveTime,
        category: String,
        max_seats: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            title,
            description: String::new(),
            date,
            time,
            location: String::new(),
            category,
            is_paid: false,
            price: Money::ZERO,
            max_seats,
            max_tickets: None,
            tags: Vec::new(),
            contact: String::new(),
            image_urls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.is_paid = !price.is_zero();
        self.price = price;
        self
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = location;
        self
    }

    pub fn with_max_tickets(mut self, max: u32) -> Self {
        self.max_tickets = Some(max);
        self
    }

    /// Split a comma-separated tag list the way the organize form submits it
    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}
