//! Error types for Citiverse Core

use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("Requested {requested} exceeds the available capacity of {capacity}.")]
    CapacityExceeded { requested: u32, capacity: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Business-rule outcomes that block a submission but are not failures
    /// of a collaborator.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Conflict(_) | Error::CapacityExceeded { .. }
        )
    }

    /// Message shown to the user. Collaborator failures collapse into a
    /// generic retry message; rule violations keep their specific text.
    pub fn user_message(&self) -> String {
        match self {
            Error::Database(_) | Error::Io(_) | Error::Serialization(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Conflict text for a hall already held on the requested date
pub const HALL_DATE_TAKEN: &str = "This hall is already booked for the selected date.";

/// Conflict text for a second booking of the same event by one user
pub const EVENT_ALREADY_BOOKED: &str = "You have already booked this event.";
