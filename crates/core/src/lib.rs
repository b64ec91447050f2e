//! Citiverse Core Library
//!
//! Models, validation, role checks, storage, identity and the booking
//! conflict checker for the Citiverse platform.

pub mod booking;
pub mod catalog;
pub mod error;
pub mod feed;
pub mod identity;
pub mod invariants;
pub mod listings;
pub mod models;
pub mod permissions;
pub mod pricing;
pub mod storage;
pub mod validation;

pub use booking::{
    BookingConfirmation, BookingService, EventBookingRequest, HallBookingRequest,
    ReviewDecision, ScanOutcome,
};
pub use error::{Error, Result};
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection, Subscription};
pub use identity::IdentityProvider;
pub use listings::BookingOverview;
pub use models::*;
pub use permissions::*;
pub use pricing::{commission_breakdown, CommissionBreakdown, Money};
pub use storage::{
    CityUpdateRepository, Database, EventBookingRepository, EventRepository,
    FeedbackRepository, HallBookingRepository, HallRepository, ScanLogRepository, Storage,
    UserRepository,
};
pub use validation::{SignupForm, ValidationError};
