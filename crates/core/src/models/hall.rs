//! Community hall model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Money;

/// A bookable community hall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityHall {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub address: Option<String>,
    /// Maximum attendees, always greater than zero
    pub capacity: u32,
    pub price_per_plate: Money,
    pub available: bool,
    pub facilities: Vec<String>,
    pub owner_id: Uuid,
    pub image_urls: Vec<String>,
    /// Bookings start as Pending and wait for the owner when set
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
}

impl CommunityHall {
    pub fn new(
        name: String,
        location: String,
        capacity: u32,
        price_per_plate: Money,
        owner_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            location,
            address: None,
            capacity,
            price_per_plate,
            available: true,
            facilities: Vec::new(),
            owner_id,
            image_urls: Vec::new(),
            requires_approval: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_address(mut self, address: String) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_facilities(mut self, facilities: Vec<String>) -> Self {
        self.facilities = facilities;
        self
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}
