//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{BookingKind, BookingPurpose, BookingStatus, PaymentStatus, UserRole};
use crate::pricing::Money;

/// Stored date format (ISO calendar date)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stored time format (24-hour clock, minutes)
pub const TIME_FORMAT: &str = "%H:%M";

const OTHER_PURPOSE_TAG: &str = "Other:";

fn conversion_error<E>(e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

fn text_error(message: String) -> SqlError {
    SqlError::FromSqlConversionFailure(
        0,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_error)
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(conversion_error)
}

pub fn parse_time(s: &str) -> Result<NaiveTime, SqlError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT).map_err(conversion_error)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a JSON array column
pub fn parse_json_list<T: DeserializeOwned>(s: &str) -> Result<Vec<T>, SqlError> {
    serde_json::from_str(s).map_err(conversion_error)
}

/// Encode a list for a JSON array column
pub fn to_json_list<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

pub fn parse_money(paise: i64) -> Result<Money, SqlError> {
    u64::try_from(paise)
        .map(Money::from_paise)
        .map_err(|_| text_error(format!("negative amount: {}", paise)))
}

/// Amounts above `i64::MAX` paise cannot be stored
pub fn money_to_sql(money: Money) -> Result<i64, SqlError> {
    i64::try_from(money.paise()).map_err(|e| SqlError::ToSqlConversionFailure(Box::new(e)))
}

/// Built-in purposes are stored by label, free text under an `Other:` tag
pub fn purpose_to_sql(purpose: &BookingPurpose) -> String {
    match purpose {
        BookingPurpose::Other(text) => format!("{}{}", OTHER_PURPOSE_TAG, text),
        builtin => builtin.label().to_string(),
    }
}

pub fn parse_purpose(s: &str) -> BookingPurpose {
    match s.strip_prefix(OTHER_PURPOSE_TAG) {
        Some(text) => BookingPurpose::Other(text.to_string()),
        None => BookingPurpose::from_label(s),
    }
}

pub fn parse_status(s: &str) -> Result<BookingStatus, SqlError> {
    s.parse().map_err(text_error)
}

pub fn parse_role(s: &str) -> Result<UserRole, SqlError> {
    s.parse().map_err(conversion_error)
}

pub fn parse_payment_status(s: &str) -> Result<PaymentStatus, SqlError> {
    match s {
        "Paid" => Ok(PaymentStatus::Paid),
        "Unpaid" => Ok(PaymentStatus::Unpaid),
        other => Err(text_error(format!("unknown payment status: {}", other))),
    }
}

pub fn parse_booking_kind(s: &str) -> Result<BookingKind, SqlError> {
    match s {
        "hall" => Ok(BookingKind::Hall),
        "event" => Ok(BookingKind::Event),
        other => Err(text_error(format!("unknown booking kind: {}", other))),
    }
}

/// True for a UNIQUE or CHECK constraint failure
pub fn is_constraint_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_time_round_trip_format() {
        let date = parse_date("2026-12-05").unwrap();
        assert_eq!(format_date(date), "2026-12-05");

        let time = parse_time("18:30").unwrap();
        assert_eq!(format_time(time), "18:30");

        assert!(parse_date("05/12/2026").is_err());
    }

    #[test]
    fn test_negative_money_rejected() {
        assert!(parse_money(-1).is_err());
        assert_eq!(parse_money(250).unwrap(), Money::from_paise(250));
    }

    #[test]
    fn test_money_above_column_range_rejected() {
        assert_eq!(money_to_sql(Money::from_paise(250)).unwrap(), 250);
        assert!(money_to_sql(Money::from_paise(u64::MAX)).is_err());
    }

    #[test]
    fn test_purpose_keeps_free_text() {
        for purpose in [
            BookingPurpose::Seminar,
            BookingPurpose::Other("Wedding".into()),
            BookingPurpose::Other("Book launch".into()),
        ] {
            assert_eq!(parse_purpose(&purpose_to_sql(&purpose)), purpose);
        }
        assert_eq!(purpose_to_sql(&BookingPurpose::Seminar), "Seminar");
        // Rows written as a bare label still read back
        assert_eq!(parse_purpose("Puja"), BookingPurpose::Other("Puja".into()));
    }
}
