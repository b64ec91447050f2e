//! Citiverse application layer
//!
//! Configuration, shared state and the OTP-gated signup flow.

pub mod clock;
pub mod config;
pub mod error;
pub mod signup;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, Result};
pub use signup::{OtpGateway, SignupError, SignupSession, SignupState, WelcomeGateway};
pub use state::AppState;
