//! Option form validation and fixed-point normalization

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// USDC precision, used for strike, premium and allowance amounts
pub const QUOTE_DECIMALS: u8 = 6;

/// Asset amounts are always scaled by 18 decimals; the asset's own
/// `decimals()` is not consulted.
pub const ASSET_DECIMALS: u8 = 18;

/// Raw form input as typed by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionForm {
    pub asset_address: String,
    pub amount: String,
    pub strike_price: String,
    pub premium_price: String,
    pub expiration_date: String,
}

/// Form values converted to the integers `createPutOpt` expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedParams {
    pub asset: Address,
    pub amount: U256,
    pub strike: U256,
    pub premium: U256,
    pub expiry: u64,
}

impl NormalizedParams {
    /// USDC allowance the option contract checks before accepting the option.
    ///
    /// The deployed contract only checks the strike, not strike × amount.
    pub fn required_allowance(&self) -> U256 {
        self.strike
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} is not a valid address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be a decimal number with at most {decimals} decimal places")]
    InvalidDecimal { field: &'static str, decimals: u8 },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is too large")]
    Overflow { field: &'static str },

    #[error("{field} could not be parsed as a date: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("{field} must be in the future")]
    ExpiryNotInFuture { field: &'static str },
}

/// Validate and normalize a form. Fields are checked in form order and the
/// first invalid one is reported.
pub fn normalize(form: &OptionForm, now: u64) -> Result<NormalizedParams, ValidationError> {
    let asset = parse_address("assetAddress", &form.asset_address)?;
    let amount = parse_positive_units("amount", &form.amount, ASSET_DECIMALS)?;
    let strike = parse_positive_units("strikePrice", &form.strike_price, QUOTE_DECIMALS)?;
    let premium = parse_positive_units("premiumPrice", &form.premium_price, QUOTE_DECIMALS)?;
    let expiry = parse_expiry("expirationDate", &form.expiration_date)?;

    if expiry <= now {
        return Err(ValidationError::ExpiryNotInFuture {
            field: "expirationDate",
        });
    }

    Ok(NormalizedParams {
        asset,
        amount,
        strike,
        premium,
        expiry,
    })
}

/// Allowance to request when approving: `required × 1.1`, rounded up.
/// Requirements too large to scale get an unlimited approval.
pub fn approval_amount(required: U256) -> U256 {
    let Some(scaled) = required.checked_mul(U256::from(11u8)) else {
        return U256::MAX;
    };
    let ten = U256::from(10u8);
    let quotient = scaled / ten;
    if (scaled % ten).is_zero() {
        quotient
    } else {
        quotient + U256::from(1u8)
    }
}

/// Parse a `0x`-prefixed 20-byte hex address. Case is not significant.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing { field });
    }

    let invalid = || ValidationError::InvalidAddress {
        field,
        value: value.to_string(),
    };

    let hex = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"));
    match hex {
        Some(digits) if digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            Address::from_str(digits).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

/// Convert a decimal string into an integer scaled by `10^decimals`.
///
/// Rejects signs, exponents and more fractional digits than `decimals`.
pub fn parse_units(
    field: &'static str,
    value: &str,
    decimals: u8,
) -> Result<U256, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing { field });
    }

    let invalid = || ValidationError::InvalidDecimal { field, decimals };

    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (value, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(invalid());
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    for _ in frac.len()..decimals as usize {
        digits.push('0');
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| ValidationError::Overflow { field })
}

fn parse_positive_units(
    field: &'static str,
    value: &str,
    decimals: u8,
) -> Result<U256, ValidationError> {
    let units = parse_units(field, value, decimals)?;
    if units.is_zero() {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(units)
}

/// Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339, or unix seconds.
pub fn parse_expiry(field: &'static str, value: &str) -> Result<u64, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing { field });
    }

    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    };

    if value.chars().all(|c| c.is_ascii_digit()) {
        return value.parse::<u64>().map_err(|_| invalid());
    }

    let timestamp = if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?
            .and_utc()
            .timestamp()
    } else {
        DateTime::parse_from_rfc3339(value)
            .map_err(|_| invalid())?
            .timestamp()
    };

    u64::try_from(timestamp).map_err(|_| invalid())
}

/// Render a fixed-point integer as a decimal string, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
