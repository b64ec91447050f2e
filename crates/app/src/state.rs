//! Application state management
//!
//! Shared handles to the database, the access policy and the mail/OTP
//! client. Built once at startup and passed to whatever needs them.

use std::sync::{Arc, Mutex};

use chrono::Duration;
use citiverse_core::validation::SignupForm;
use citiverse_core::{AccessPolicy, BookingService, Database, User};
use citiverse_net::OtpClient;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::signup::{OtpGateway, SignupSession, WelcomeGateway};

/// Main application state
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub policy: Arc<AccessPolicy>,
    pub otp: OtpClient,
    pub clock: SystemClock,
    resend_cooldown: Duration,
}

impl AppState {
    /// Open the configured database and build the service handles
    pub fn new(config: &AppConfig) -> Result<Self> {
        let db_path = config.database_path()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        let version = db.schema_version()?;
        info!(path = %db_path.display(), version, "Database ready");
        Ok(Self::with_database(db, config))
    }

    pub fn with_database(db: Database, config: &AppConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            policy: Arc::new(AccessPolicy::new(&config.admin_emails)),
            otp: OtpClient::new(config.otp_service_url.clone()),
            clock: SystemClock,
            resend_cooldown: Duration::seconds(config.resend_cooldown_secs),
        }
    }

    /// A fresh signup session talking to the configured OTP service
    pub fn signup(&self) -> SignupSession<'_, OtpClient, SystemClock> {
        SignupSession::with_cooldown(&self.otp, &self.clock, self.resend_cooldown)
    }

    /// Create the verified signup's account, then send the welcome mail
    /// with the database unlocked
    pub async fn submit_signup<G, C>(
        &self,
        session: &SignupSession<'_, G, C>,
        form: &SignupForm,
    ) -> Result<User>
    where
        G: OtpGateway + WelcomeGateway,
        C: Clock,
    {
        let user = {
            let db = self.db.lock().map_err(|_| AppError::Poisoned)?;
            session.register(&*db, form)?
        };
        session.welcome(&user).await;
        Ok(user)
    }

    /// Run `f` with the database locked
    pub fn with_db<R>(&self, f: impl FnOnce(&Database) -> R) -> Result<R> {
        let db = self.db.lock().map_err(|_| AppError::Poisoned)?;
        Ok(f(&db))
    }

    /// Run `f` against a booking service over the locked database
    pub fn with_bookings<R>(
        &self,
        f: impl FnOnce(&BookingService<'_, Database>) -> citiverse_core::Result<R>,
    ) -> Result<R> {
        let db = self.db.lock().map_err(|_| AppError::Poisoned)?;
        let service = BookingService::new(&*db, &self.policy);
        Ok(f(&service)?)
    }
}
