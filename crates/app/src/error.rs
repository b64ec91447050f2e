//! Application error types

use crate::config::ConfigError;
use crate::signup::SignupError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Core(#[from] citiverse_core::Error),

    #[error("Network error: {0}")]
    Net(#[from] citiverse_net::Error),

    #[error(transparent)]
    Signup(#[from] SignupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application state lock poisoned")]
    Poisoned,
}
