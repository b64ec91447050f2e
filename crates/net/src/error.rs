//! Mail/OTP service error types

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::protocol::ApiResponse;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Mail/OTP service errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Invalid or expired OTP")]
    InvalidOrExpired,

    #[error("Failed to send email: {0}")]
    Mail(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidEmail | Error::InvalidOrExpired => StatusCode::BAD_REQUEST,
            Error::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Mail(_) => StatusCode::BAD_GATEWAY,
            Error::Io(_) | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Error::Io(_) | Error::Http(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}
