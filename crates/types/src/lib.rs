pub mod plan;
pub mod units;

pub use plan::*;
pub use units::*;

/// Number of fractional digits in the fund token.
pub const TOKEN_DECIMALS: u32 = 6;

/// Multiplier from whole tokens to base units (10^TOKEN_DECIMALS).
pub const BASE_UNIT_SCALE: u128 = 1_000_000;

/// Protocol fee rate in basis points (5.00%).
pub const PROTOCOL_FEE_BPS: u128 = 500;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;
