use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{BASE_UNIT_SCALE, BPS_DENOMINATOR, PROTOCOL_FEE_BPS, TOKEN_DECIMALS};

/// Errors from decimal-to-base-unit conversion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("amount for {field} must not be negative: {amount}")]
    Negative { field: String, amount: Decimal },

    #[error("amount for {field} does not fit in base units: {amount}")]
    Overflow { field: String, amount: Decimal },
}

/// Convert a decimal token amount to integer base units.
///
/// Fractional digits beyond the token's precision are truncated toward
/// zero. Negative amounts are rejected.
pub fn to_base_units(amount: Decimal, field: &str) -> Result<u128, UnitError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitError::Negative {
            field: field.to_string(),
            amount,
        });
    }

    let truncated = amount.trunc_with_scale(TOKEN_DECIMALS);
    let scaled = truncated
        .checked_mul(Decimal::from(BASE_UNIT_SCALE as u64))
        .ok_or_else(|| UnitError::Overflow {
            field: field.to_string(),
            amount,
        })?;

    scaled.trunc().to_u128().ok_or_else(|| UnitError::Overflow {
        field: field.to_string(),
        amount,
    })
}

/// Protocol fee on a gross base-unit amount, integer floor division.
pub fn compute_fee(gross: u128) -> u128 {
    gross * PROTOCOL_FEE_BPS / BPS_DENOMINATOR
}

/// Net amount reaching the fund after the protocol fee.
pub fn compute_net(gross: u128) -> u128 {
    gross - compute_fee(gross)
}

/// Format a base-unit amount back into a decimal token string.
///
/// Amounts beyond decimal mantissa range render as the raw base-unit
/// count; token-scale values never get there.
pub fn format_token_amount(base_units: u128) -> String {
    let Some(mut value) = Decimal::from_u128(base_units) else {
        return base_units.to_string();
    };
    if value.set_scale(TOKEN_DECIMALS).is_err() {
        return base_units.to_string();
    }
    value.normalize().to_string()
}
