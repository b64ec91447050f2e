//! User, account, and session models

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationError;

/// Role chosen at signup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Organizer,
    HallOwner,
    Influencer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Organizer => "organizer",
            UserRole::HallOwner => "hall_owner",
            UserRole::Influencer => "influencer",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::User => "User",
            UserRole::Organizer => "Event Organizer",
            UserRole::HallOwner => "Hall Owner",
            UserRole::Influencer => "Influencer",
        }
    }

    pub fn all() -> &'static [UserRole] {
        &[
            UserRole::User,
            UserRole::Organizer,
            UserRole::HallOwner,
            UserRole::Influencer,
        ]
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ValidationError::Role(s.to_string()))
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Profile record stored in `users`, keyed by the identity account ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub city: String,
    pub role: UserRole,
    /// Categories the user has browsed, oldest first, no duplicates
    pub viewed_categories: Vec<String>,
    pub liked_events: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Uuid, name: String, email: String, role: UserRole) -> Self {
        Self {
            id,
            name,
            email,
            phone: String::new(),
            gender: String::new(),
            city: String::new(),
            role,
            viewed_categories: Vec::new(),
            liked_events: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_contact(mut self, phone: String, gender: String, city: String) -> Self {
        self.phone = phone;
        self.gender = gender;
        self.city = city;
        self
    }
}

/// Credentials held by the identity collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name: None,
            photo_url: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }
}

/// Active session for a signed-in account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(account_id: Uuid, duration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            created_at: now,
            expires_at: now + chrono::Duration::hours(duration_hours),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}
