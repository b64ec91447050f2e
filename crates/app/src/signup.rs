//! OTP-gated signup
//!
//! A [`SignupSession`] tracks one signup form: the code request, its resend
//! countdown and verification. The account is only created once the email
//! on the form has been verified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use citiverse_core::validation::{is_valid_email, SignupForm, ValidationError};
use citiverse_core::{IdentityProvider, Storage, User};
use citiverse_net::OtpClient;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;

/// Seconds before a code may be requested again
pub const RESEND_COOLDOWN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("A code request is already in progress.")]
    RequestInFlight,

    #[error("Please wait {remaining_secs} seconds before requesting a new code.")]
    CooldownActive { remaining_secs: i64 },

    #[error("Please request a verification code first.")]
    CodeNotRequested,

    #[error("Invalid or expired OTP")]
    InvalidOrExpired,

    #[error("Please verify your email before creating an account.")]
    NotVerified,

    #[error("The email on the form does not match the verified email.")]
    EmailMismatch,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", .0.user_message())]
    Identity(#[from] citiverse_core::Error),

    #[error("{0}")]
    Gateway(String),
}

impl From<citiverse_net::Error> for SignupError {
    fn from(err: citiverse_net::Error) -> Self {
        match err {
            citiverse_net::Error::InvalidEmail => SignupError::InvalidEmail,
            citiverse_net::Error::InvalidOrExpired => SignupError::InvalidOrExpired,
            other => SignupError::Gateway(other.to_string()),
        }
    }
}

/// Where a signup session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupState {
    Unrequested,
    /// Code sent; resend locked until the countdown ends
    Sent,
    ResendAvailable,
    Verified,
}

/// Mail/OTP service calls made during signup
#[allow(async_fn_in_trait)]
pub trait OtpGateway {
    async fn request_code(&self, email: &str) -> citiverse_net::Result<()>;

    /// `Err(InvalidOrExpired)` for a wrong or stale code
    async fn confirm_code(&self, email: &str, code: &str) -> citiverse_net::Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait WelcomeGateway {
    async fn send_welcome(&self, email: &str, name: &str) -> citiverse_net::Result<()>;
}

impl OtpGateway for OtpClient {
    async fn request_code(&self, email: &str) -> citiverse_net::Result<()> {
        self.send_otp(email).await
    }

    async fn confirm_code(&self, email: &str, code: &str) -> citiverse_net::Result<()> {
        self.verify_otp(email, code).await
    }
}

impl WelcomeGateway for OtpClient {
    async fn send_welcome(&self, email: &str, name: &str) -> citiverse_net::Result<()> {
        OtpClient::send_welcome(self, email, name).await
    }
}

#[derive(Debug, Default)]
struct Progress {
    email: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    verified: bool,
}

/// Clears the in-flight flag however the request ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub struct SignupSession<'a, G, C> {
    gateway: &'a G,
    clock: &'a C,
    cooldown: Duration,
    progress: Mutex<Progress>,
    in_flight: AtomicBool,
}

impl<'a, G, C> SignupSession<'a, G, C>
where
    G: OtpGateway + WelcomeGateway,
    C: Clock,
{
    pub fn new(gateway: &'a G, clock: &'a C) -> Self {
        Self::with_cooldown(gateway, clock, Duration::seconds(RESEND_COOLDOWN_SECS))
    }

    pub fn with_cooldown(gateway: &'a G, clock: &'a C, cooldown: Duration) -> Self {
        Self {
            gateway,
            clock,
            cooldown,
            progress: Mutex::new(Progress::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Progress {
        self.progress
            .lock()
            .map(|p| Progress {
                email: p.email.clone(),
                sent_at: p.sent_at,
                verified: p.verified,
            })
            .unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        if let Ok(mut progress) = self.progress.lock() {
            f(&mut progress);
        }
    }

    pub fn state(&self) -> SignupState {
        let progress = self.snapshot();
        match (progress.verified, progress.sent_at) {
            (true, _) => SignupState::Verified,
            (false, None) => SignupState::Unrequested,
            (false, Some(_)) if self.remaining(&progress) > 0 => SignupState::Sent,
            (false, Some(_)) => SignupState::ResendAvailable,
        }
    }

    fn remaining(&self, progress: &Progress) -> i64 {
        let Some(sent_at) = progress.sent_at else {
            return 0;
        };
        let left = self.cooldown - (self.clock.now() - sent_at);
        // Round partial seconds up so the countdown never shows 0 early
        let secs = (left.num_milliseconds() + 999).div_euclid(1000);
        secs.max(0)
    }

    /// Countdown shown next to the resend button
    pub fn seconds_until_resend(&self) -> i64 {
        let progress = self.snapshot();
        if progress.verified {
            return 0;
        }
        self.remaining(&progress)
    }

    /// Phone, password, gender, city and role are editable only once verified
    pub fn fields_unlocked(&self) -> bool {
        self.state() == SignupState::Verified
    }

    pub fn verified_email(&self) -> Option<String> {
        let progress = self.snapshot();
        progress.verified.then_some(progress.email).flatten()
    }

    /// Ask the service to mail a code to `email`
    #[instrument(skip(self))]
    pub async fn request_code(&self, email: &str) -> Result<(), SignupError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(SignupError::InvalidEmail);
        }

        // Re-requesting for the verified address is a no-op
        if self
            .verified_email()
            .is_some_and(|verified| same_email(&verified, email))
        {
            return Ok(());
        }

        let remaining = self.seconds_until_resend();
        if remaining > 0 {
            return Err(SignupError::CooldownActive {
                remaining_secs: remaining,
            });
        }

        let _guard = InFlight::acquire(&self.in_flight).ok_or(SignupError::RequestInFlight)?;

        if let Err(e) = self.gateway.request_code(email).await {
            warn!(error = %e, "Code request failed");
            return Err(e.into());
        }

        let now = self.clock.now();
        self.update(|p| {
            p.email = Some(email.to_string());
            p.sent_at = Some(now);
            p.verified = false;
        });
        info!("Verification code sent");
        Ok(())
    }

    /// Check `code` for `email`. Wrong and expired codes are reported the
    /// same way and may be retried.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), SignupError> {
        let progress = self.snapshot();
        let Some(requested) = progress.email else {
            return Err(SignupError::CodeNotRequested);
        };
        if !same_email(&requested, email) {
            return Err(SignupError::EmailMismatch);
        }
        if progress.verified {
            return Ok(());
        }

        self.gateway.confirm_code(&requested, code.trim()).await?;

        self.update(|p| p.verified = true);
        info!("Email verified");
        Ok(())
    }

    /// Validate the form and write the account and its profile
    pub fn register<D>(&self, db: &D, form: &SignupForm) -> Result<User, SignupError>
    where
        D: IdentityProvider + Storage,
    {
        let verified = self.verified_email().ok_or(SignupError::NotVerified)?;
        if !same_email(&verified, &form.email) {
            return Err(SignupError::EmailMismatch);
        }
        form.validate()?;

        let name = form.name.trim();
        let profile = User::new(Uuid::nil(), name.to_string(), form.email.clone(), form.role)
            .with_contact(
                form.phone.trim().to_string(),
                form.gender.trim().to_string(),
                form.city.trim().to_string(),
            );
        let user = db.create_account_with_profile(&form.password, profile)?;

        info!(user_id = %user.id, role = form.role.as_str(), "Account created");
        Ok(user)
    }

    /// [`register`](Self::register), then a best-effort welcome mail.
    /// `db` stays borrowed across the mail call; with a shared database use
    /// [`AppState::submit_signup`](crate::AppState::submit_signup).
    pub async fn submit_account<D>(&self, db: &D, form: &SignupForm) -> Result<User, SignupError>
    where
        D: IdentityProvider + Storage,
    {
        let user = self.register(db, form)?;
        self.welcome(&user).await;
        Ok(user)
    }

    /// Mail the welcome message. Failures are logged and otherwise ignored.
    pub async fn welcome(&self, user: &User) {
        if let Err(e) = self.gateway.send_welcome(&user.email, &user.name).await {
            warn!(user_id = %user.id, error = %e, "Welcome mail failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use citiverse_core::{Database, UserRepository, UserRole};

    use super::*;
    use crate::clock::ManualClock;

    /// Accepts "123456" for any email
    #[derive(Default)]
    struct FakeGateway {
        requests: RefCell<Vec<String>>,
        welcomes: RefCell<Vec<String>>,
        fail_requests: bool,
        fail_welcome: bool,
    }

    impl OtpGateway for FakeGateway {
        async fn request_code(&self, email: &str) -> citiverse_net::Result<()> {
            tokio::task::yield_now().await;
            if self.fail_requests {
                return Err(citiverse_net::Error::Mail("relay down".into()));
            }
            self.requests.borrow_mut().push(email.to_string());
            Ok(())
        }

        async fn confirm_code(&self, _email: &str, code: &str) -> citiverse_net::Result<()> {
            if code == "123456" {
                Ok(())
            } else {
                Err(citiverse_net::Error::InvalidOrExpired)
            }
        }
    }

    impl WelcomeGateway for FakeGateway {
        async fn send_welcome(&self, email: &str, _name: &str) -> citiverse_net::Result<()> {
            if self.fail_welcome {
                return Err(citiverse_net::Error::Mail("relay down".into()));
            }
            self.welcomes.borrow_mut().push(email.to_string());
            Ok(())
        }
    }

    fn form(email: &str) -> SignupForm {
        SignupForm {
            name: "Asha Rao".into(),
            email: email.into(),
            phone: "9876543210".into(),
            password: "Abc123!".into(),
            confirm_password: "Abc123!".into(),
            gender: "female".into(),
            city: "Pune".into(),
            role: UserRole::Organizer,
            terms_accepted: true,
        }
    }

    #[tokio::test]
    async fn test_request_arms_countdown() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);

        assert_eq!(session.state(), SignupState::Unrequested);
        assert!(matches!(
            session.request_code("not-an-email").await,
            Err(SignupError::InvalidEmail)
        ));

        session.request_code("asha@example.com").await.unwrap();
        assert_eq!(session.state(), SignupState::Sent);
        assert_eq!(session.seconds_until_resend(), 60);

        clock.advance(Duration::seconds(45));
        assert!(matches!(
            session.request_code("asha@example.com").await,
            Err(SignupError::CooldownActive { remaining_secs: 15 })
        ));

        clock.advance(Duration::seconds(15));
        assert_eq!(session.state(), SignupState::ResendAvailable);
        assert_eq!(session.seconds_until_resend(), 0);

        session.request_code("asha@example.com").await.unwrap();
        assert_eq!(session.state(), SignupState::Sent);
        assert_eq!(gateway.requests.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);

        let (first, second) = tokio::join!(
            session.request_code("asha@example.com"),
            session.request_code("asha@example.com"),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(SignupError::RequestInFlight)));
        assert_eq!(gateway.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_leaves_state() {
        let gateway = FakeGateway {
            fail_requests: true,
            ..Default::default()
        };
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);

        assert!(matches!(
            session.request_code("asha@example.com").await,
            Err(SignupError::Gateway(_))
        ));
        assert_eq!(session.state(), SignupState::Unrequested);
        assert_eq!(session.seconds_until_resend(), 0);
    }

    #[tokio::test]
    async fn test_verify_code() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);

        assert!(matches!(
            session.verify_code("asha@example.com", "123456").await,
            Err(SignupError::CodeNotRequested)
        ));

        session.request_code("asha@example.com").await.unwrap();
        assert!(matches!(
            session.verify_code("asha@example.com", "000000").await,
            Err(SignupError::InvalidOrExpired)
        ));
        assert_eq!(session.state(), SignupState::Sent);
        assert!(!session.fields_unlocked());

        session.verify_code("Asha@Example.com", "123456").await.unwrap();
        assert_eq!(session.state(), SignupState::Verified);
        assert!(session.fields_unlocked());
    }

    #[tokio::test]
    async fn test_submit_requires_verification() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(
            session.submit_account(&db, &form("asha@example.com")).await,
            Err(SignupError::NotVerified)
        ));

        session.request_code("asha@example.com").await.unwrap();
        assert!(matches!(
            session.submit_account(&db, &form("asha@example.com")).await,
            Err(SignupError::NotVerified)
        ));

        session.verify_code("asha@example.com", "123456").await.unwrap();
        let user = session
            .submit_account(&db, &form("asha@example.com"))
            .await
            .unwrap();

        assert_eq!(user.role, UserRole::Organizer);
        let stored = db.find_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.city, "Pune");
        assert_eq!(gateway.welcomes.borrow().as_slice(), ["asha@example.com"]);
    }

    #[tokio::test]
    async fn test_submit_checks_form() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);
        let db = Database::open_in_memory().unwrap();

        session.request_code("asha@example.com").await.unwrap();
        session.verify_code("asha@example.com", "123456").await.unwrap();

        assert!(matches!(
            session.submit_account(&db, &form("other@example.com")).await,
            Err(SignupError::EmailMismatch)
        ));

        let mut bad = form("asha@example.com");
        bad.phone = "12345".into();
        let err = session.submit_account(&db, &bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Phone number must be 10 digits.");

        let mut bad = form("asha@example.com");
        bad.terms_accepted = false;
        assert!(matches!(
            session.submit_account(&db, &bad).await,
            Err(SignupError::Validation(ValidationError::TermsNotAccepted))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_surfaced_and_state_kept() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);
        let db = Database::open_in_memory().unwrap();
        db.create_account("asha@example.com", "Abc123!", None).unwrap();

        session.request_code("asha@example.com").await.unwrap();
        session.verify_code("asha@example.com", "123456").await.unwrap();

        let err = session
            .submit_account(&db, &form("asha@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already in use");
        assert_eq!(session.state(), SignupState::Verified);
    }

    #[tokio::test]
    async fn test_welcome_failure_does_not_fail_signup() {
        let gateway = FakeGateway {
            fail_welcome: true,
            ..Default::default()
        };
        let clock = ManualClock::default();
        let session = SignupSession::new(&gateway, &clock);
        let db = Database::open_in_memory().unwrap();

        session.request_code("asha@example.com").await.unwrap();
        session.verify_code("asha@example.com", "123456").await.unwrap();
        assert!(session
            .submit_account(&db, &form("asha@example.com"))
            .await
            .is_ok());
    }
}
