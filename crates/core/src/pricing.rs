//! Money and derived charges
//!
//! Amounts are held in paise so derived totals are exact.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// GST applied to the platform commission, in percent
pub const GST_RATE_PERCENT: i64 = 18;

/// A non-negative amount in paise, at most [`Money::MAX`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest amount the database column can hold
    pub const MAX: Money = Money(i64::MAX as u64);

    pub const fn from_paise(paise: u64) -> Self {
        Money(paise)
    }

    pub const fn from_rupees(rupees: u64) -> Self {
        Money(rupees * 100)
    }

    pub fn paise(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn bounded(paise: u64) -> Option<Money> {
        (paise <= Self::MAX.0).then_some(Money(paise))
    }

    /// Unit price times quantity, `None` above [`Money::MAX`]
    pub fn checked_times(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(u64::from(quantity)).and_then(Self::bounded)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).and_then(Self::bounded)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rupees = self.0 / 100;
        let paise = self.0 % 100;
        if paise == 0 {
            write!(f, "₹{}", rupees)
        } else {
            write!(f, "₹{}.{:02}", rupees, paise)
        }
    }
}

impl FromStr for Money {
    type Err = String;

    /// Parse "1250", "1250.5" or "1250.50" (rupees)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('₹');
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() || frac.len() > 2 {
            return Err(format!("invalid amount: {}", s));
        }

        let rupees: u64 = whole.parse().map_err(|_| format!("invalid amount: {}", s))?;
        let paise: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| format!("invalid amount: {}", s))? * 10,
            _ => frac.parse().map_err(|_| format!("invalid amount: {}", s))?,
        };

        rupees
            .checked_mul(100)
            .and_then(|p| p.checked_add(paise))
            .and_then(Money::bounded)
            .ok_or_else(|| format!("amount too large: {}", s))
    }
}

/// Platform commission after the customer discount, with GST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionBreakdown {
    /// Discount on the GST-exclusive booking value, in paise
    pub discount: i64,
    pub net_taxable: i64,
    pub gst: i64,
    pub final_receivable: i64,
}

/// Divide rounding half away from zero
fn div_round(numerator: i128, denominator: i128) -> i64 {
    let q = (numerator.abs() + denominator / 2) / denominator;
    (if numerator < 0 { -q } else { q }) as i64
}

/// Commission receivable for a booking.
///
/// The discount is `discount_percent` of the booking value with GST
/// removed; it comes out of the commission base before GST is applied.
pub fn commission_breakdown(
    total_booking: Money,
    discount_percent: u32,
    commission_base: Money,
) -> CommissionBreakdown {
    let total = i128::from(total_booking.paise());
    let discount = div_round(total * i128::from(discount_percent), 100 + GST_RATE_PERCENT as i128);
    let net_taxable = commission_base.paise() as i64 - discount;
    let gst = div_round(i128::from(net_taxable) * GST_RATE_PERCENT as i128, 100);

    CommissionBreakdown {
        discount,
        net_taxable,
        gst,
        final_receivable: net_taxable + gst,
    }
}
