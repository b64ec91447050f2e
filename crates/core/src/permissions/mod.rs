//! Role and capability checks
//!
//! Navigation links, dashboards, and service operations all ask the same
//! question: does this user hold a capability?

use std::collections::HashSet;

use crate::models::{User, UserRole};

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    // Bookings
    BookHalls,
    BookEvents,
    CancelOwnBookings,

    // Organizers
    CreateEvents,
    ViewOwnEvents,

    // Hall owners
    AddHalls,
    ReviewHallBookings,

    // Content
    PostCityUpdates,

    // Staff
    VerifyBookingScans,

    // Admin
    ModerateContent,
    ViewAllBookings,
}

/// True when the user's profile carries the role
pub fn has_role(user: &User, role: UserRole) -> bool {
    user.role == role
}

/// Admins are identified by email, not by profile role
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_emails: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, user: &User) -> bool {
        self.admin_emails.contains(&user.email.to_ascii_lowercase())
    }

    /// Check if a user holds a capability
    pub fn can(&self, user: &User, capability: Capability) -> bool {
        if self.is_admin(user) {
            return true;
        }

        match capability {
            // Any signed-in user
            Capability::BookHalls
            | Capability::BookEvents
            | Capability::CancelOwnBookings
            | Capability::PostCityUpdates => true,

            Capability::CreateEvents | Capability::ViewOwnEvents => {
                has_role(user, UserRole::Organizer)
            }

            Capability::AddHalls | Capability::ReviewHallBookings => {
                has_role(user, UserRole::HallOwner)
            }

            // Event staff scan tickets at the door
            Capability::VerifyBookingScans => {
                has_role(user, UserRole::Organizer) || has_role(user, UserRole::HallOwner)
            }

            Capability::ModerateContent | Capability::ViewAllBookings => false,
        }
    }

    /// Every capability the user holds, for composing navigation
    pub fn capabilities(&self, user: &User) -> Vec<Capability> {
        ALL_CAPABILITIES
            .iter()
            .copied()
            .filter(|c| self.can(user, *c))
            .collect()
    }
}

const ALL_CAPABILITIES: &[Capability] = &[
    Capability::BookHalls,
    Capability::BookEvents,
    Capability::CancelOwnBookings,
    Capability::CreateEvents,
    Capability::ViewOwnEvents,
    Capability::AddHalls,
    Capability::ReviewHallBookings,
    Capability::PostCityUpdates,
    Capability::VerifyBookingScans,
    Capability::ModerateContent,
    Capability::ViewAllBookings,
];
