//! Shared field validation
//!
//! Pure predicates used by every form (signup, bookings, halls, events,
//! feedback). Each `ValidationError` displays the exact message shown inline
//! next to the form.

use thiserror::Error;

use crate::models::UserRole;

/// Special characters accepted (and one required) in passwords
pub const PASSWORD_SPECIALS: &str = "@$!%*?#&";

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name must contain only alphabets and spaces.")]
    Name,

    #[error("Please enter a valid email address.")]
    Email,

    #[error("Phone number must be 10 digits.")]
    Phone,

    #[error("Password must be 6-15 characters with uppercase, lowercase, number, and special character.")]
    Password,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Please select both gender and city.")]
    GenderAndCity,

    #[error("City must contain only alphabets and spaces.")]
    City,

    #[error("Unknown role: {0}")]
    Role(String),

    #[error("You must accept the terms and conditions.")]
    TermsNotAccepted,

    #[error("{0} is required.")]
    Required(&'static str),

    #[error("Please enter a valid number between 1 and {max}.")]
    Quantity { max: u32 },

    #[error("Please specify the purpose of booking.")]
    PurposeUnspecified,

    #[error("Invalid date: {0}")]
    Date(String),

    #[error("Invalid time: {0}")]
    Time(String),

    #[error("Please choose a date and time in the future.")]
    NotInFuture,

    #[error("Capacity must be greater than zero.")]
    Capacity,

    #[error("Price cannot be negative.")]
    Price,
}

/// Letters and spaces only, with at least one letter.
pub fn is_valid_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
}

/// Exactly ten ASCII digits.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    if local.is_empty() || domain.is_empty() {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && !tld.is_empty() && !domain.starts_with('.') && !domain.contains("..")
        }
        None => false,
    }
}

/// 6 to 15 characters containing a lowercase letter, an uppercase letter,
/// a digit, and one of `@$!%*?#&`.
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return false;
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    has_lower && has_upper && has_digit && has_special
}

/// Same alphabet as names.
pub fn is_valid_city(city: &str) -> bool {
    is_valid_name(city)
}

/// Require a non-blank value
pub fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

/// Fields collected by the signup form
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    pub gender: String,
    pub city: String,
    pub role: UserRole,
    pub terms_accepted: bool,
}

impl SignupForm {
    /// Validate every field, reporting the first failure in form order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.name) {
            return Err(ValidationError::Name);
        }

        if !is_valid_email(&self.email) {
            return Err(ValidationError::Email);
        }

        if !is_valid_phone(&self.phone) {
            return Err(ValidationError::Phone);
        }

        if !is_valid_password(&self.password) {
            return Err(ValidationError::Password);
        }

        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        if self.gender.trim().is_empty() || self.city.trim().is_empty() {
            return Err(ValidationError::GenderAndCity);
        }

        if !is_valid_city(&self.city) {
            return Err(ValidationError::City);
        }

        if !self.terms_accepted {
            return Err(ValidationError::TermsNotAccepted);
        }

        Ok(())
    }
}
