//! Request and response bodies for the mail/OTP endpoints
//!
//! All bodies are JSON. Field names match what the web client sends.

use serde::{Deserialize, Serialize};

/// `POST /send-otp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

/// `POST /verify-otp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// `POST /send-welcome`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Reply for every POST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// `GET /warmup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupResponse {
    pub status: String,
}
