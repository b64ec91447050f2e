//! Citiverse Network Library
//!
//! The mail/OTP service used during signup.
//!
//! # Architecture
//!
//! - **OtpServer**: axum HTTP process issuing and verifying codes
//! - **OtpClient**: reqwest client the signup flow talks through
//! - **Mailer**: delivery seam; SMTP, logging and in-memory implementations
//!
//! # Usage
//!
//! ```ignore
//! let server = OtpServer::start(ServerConfig::default(), Arc::new(LogMailer)).await?;
//!
//! let client = OtpClient::new("http://localhost:5000");
//! client.send_otp("asha@example.com").await?;
//! client.verify_otp("asha@example.com", "042917").await?;
//! ```

pub mod client;
pub mod error;
pub mod mailer;
pub mod otp;
pub mod protocol;
pub mod server;

pub use client::OtpClient;
pub use error::{Error, Result};
pub use mailer::{LogMailer, Mailer, MemoryMailer, OutgoingMail, SmtpMailer, SmtpSettings};
pub use otp::OtpStore;
pub use protocol::{ApiResponse, SendOtpRequest, VerifyOtpRequest, WarmupResponse, WelcomeRequest};
pub use server::{OtpServer, ServerConfig, SharedMailer};

/// Default port for the mail/OTP service
pub const DEFAULT_PORT: u16 = 5000;
