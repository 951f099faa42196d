use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::{compute_fee, compute_net, to_base_units, UnitError};
use crate::BASE_UNIT_SCALE;

/// Maximum principal accepted by the protocol, in base units.
pub const MAX_PRINCIPAL_BASE_UNITS: u128 = 10_000_000 * BASE_UNIT_SCALE;

/// Minimum recurring monthly deposit, in base units.
pub const MIN_MONTHLY_DEPOSIT_BASE_UNITS: u128 = 10 * BASE_UNIT_SCALE;

pub const MIN_CURRENT_AGE: u32 = 18;
pub const MAX_CURRENT_AGE: u32 = 90;
pub const MIN_RETIREMENT_AGE: u32 = 50;
pub const MIN_YEARS_OF_PAYMENTS: u32 = 1;
pub const MAX_YEARS_OF_PAYMENTS: u32 = 40;
pub const MAX_INTEREST_RATE_BPS: i64 = 2_000;
pub const MIN_TIMELOCK_YEARS: u32 = 1;
pub const MAX_TIMELOCK_YEARS: u32 = 50;

/// Timelock substituted when the caller leaves it at zero.
pub const DEFAULT_TIMELOCK_YEARS: u32 = 10;

/// User-supplied savings plan, in human decimal units.
///
/// An immutable snapshot of form input. Derivation and validation never
/// mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementPlan {
    /// One-time opening deposit, whole tokens
    pub principal: Decimal,

    /// Recurring monthly deposit, whole tokens
    pub monthly_deposit: Decimal,

    /// Income the user wants to draw per month after retirement
    pub desired_monthly_income: Decimal,

    pub current_age: u32,
    pub retirement_age: u32,

    /// How many years the income should be paid out
    pub years_of_payments: u32,

    /// Annual interest rate, percent (e.g. 5 means 5.00%)
    pub interest_rate_pct: Decimal,

    /// Withdrawal lock, years; zero means "use the protocol default"
    pub timelock_years: u32,

    /// Optional override for the fund contract address
    pub target_protocol: Option<String>,
}

impl RetirementPlan {
    /// Interest rate as integer basis points, truncated.
    pub fn rate_bps(&self) -> i64 {
        (self.interest_rate_pct * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Timelock with the zero-means-default substitution applied.
    pub fn effective_timelock_years(&self) -> u32 {
        if self.timelock_years == 0 {
            DEFAULT_TIMELOCK_YEARS
        } else {
            self.timelock_years
        }
    }
}

/// Plan values derived into integer base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedPlan {
    /// Principal + first monthly deposit
    pub deposit_base_units: u128,

    /// Protocol fee on the deposit
    pub fee_base_units: u128,

    /// Amount reaching the fund after the fee
    pub net_base_units: u128,

    pub rate_bps: u32,
    pub years_to_retirement: u32,
}

/// Errors from plan derivation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error("interest rate out of range: {bps} bps")]
    RateOutOfRange { bps: i64 },
}

/// A single constraint violation found by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    #[error("principal exceeds the protocol maximum of {max} base units")]
    PrincipalExceedsMax { max: u128 },

    #[error("monthly deposit below the minimum of {min} base units")]
    MonthlyDepositBelowMin { min: u128 },

    #[error("initial deposit must be greater than zero")]
    EmptyInitialDeposit,

    #[error("current age {age} outside {min}..={max}", min = MIN_CURRENT_AGE, max = MAX_CURRENT_AGE)]
    CurrentAgeOutOfBounds { age: u32 },

    #[error("retirement age {age} below the minimum of {min}", min = MIN_RETIREMENT_AGE)]
    RetirementAgeBelowMin { age: u32 },

    #[error("retirement age {retirement} must be greater than current age {current}")]
    RetirementNotAfterCurrent { current: u32, retirement: u32 },

    #[error("desired monthly income must be greater than zero")]
    NonPositiveIncome,

    #[error("years of payments {years} outside {min}..={max}", min = MIN_YEARS_OF_PAYMENTS, max = MAX_YEARS_OF_PAYMENTS)]
    YearsOfPaymentsOutOfBounds { years: u32 },

    #[error("interest rate {bps} bps outside 0..={max}", max = MAX_INTEREST_RATE_BPS)]
    InterestRateOutOfBounds { bps: i64 },

    #[error("timelock {years} years outside {min}..={max}", min = MIN_TIMELOCK_YEARS, max = MAX_TIMELOCK_YEARS)]
    TimelockOutOfBounds { years: u32 },

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] UnitError),
}

/// Principal plus first monthly deposit, in base units.
pub fn derive_initial_deposit(plan: &RetirementPlan) -> Result<u128, UnitError> {
    let principal = to_base_units(plan.principal, "principal")?;
    let monthly = to_base_units(plan.monthly_deposit, "monthly_deposit")?;
    Ok(principal + monthly)
}

/// Allowance the fund contract needs: the deposit plus the protocol fee
/// charged on top of it.
pub fn required_approval(plan: &RetirementPlan) -> Result<u128, UnitError> {
    let deposit = derive_initial_deposit(plan)?;
    Ok(deposit + compute_fee(deposit))
}

/// Derive all base-unit plan values.
pub fn derive(plan: &RetirementPlan) -> Result<DerivedPlan, PlanError> {
    let deposit = derive_initial_deposit(plan)?;
    let bps = plan.rate_bps();
    if !(0..=MAX_INTEREST_RATE_BPS).contains(&bps) {
        return Err(PlanError::RateOutOfRange { bps });
    }

    Ok(DerivedPlan {
        deposit_base_units: deposit,
        fee_base_units: compute_fee(deposit),
        net_base_units: compute_net(deposit),
        rate_bps: bps as u32,
        years_to_retirement: plan.retirement_age.saturating_sub(plan.current_age),
    })
}

/// Check every plan constraint and return the full set of violations.
///
/// Not fail-fast: an empty result means the plan is valid, a non-empty
/// result lists everything the caller has to fix.
pub fn validate(plan: &RetirementPlan) -> Vec<PlanViolation> {
    let mut violations = Vec::new();

    let principal = match to_base_units(plan.principal, "principal") {
        Ok(v) => Some(v),
        Err(e) => {
            violations.push(PlanViolation::InvalidAmount(e));
            None
        }
    };
    let monthly = match to_base_units(plan.monthly_deposit, "monthly_deposit") {
        Ok(v) => Some(v),
        Err(e) => {
            violations.push(PlanViolation::InvalidAmount(e));
            None
        }
    };

    if let Some(principal) = principal {
        if principal > MAX_PRINCIPAL_BASE_UNITS {
            violations.push(PlanViolation::PrincipalExceedsMax {
                max: MAX_PRINCIPAL_BASE_UNITS,
            });
        }
    }

    if let Some(monthly) = monthly {
        if monthly < MIN_MONTHLY_DEPOSIT_BASE_UNITS {
            violations.push(PlanViolation::MonthlyDepositBelowMin {
                min: MIN_MONTHLY_DEPOSIT_BASE_UNITS,
            });
        }
    }

    if let (Some(principal), Some(monthly)) = (principal, monthly) {
        if principal + monthly == 0 {
            violations.push(PlanViolation::EmptyInitialDeposit);
        }
    }

    if !(MIN_CURRENT_AGE..=MAX_CURRENT_AGE).contains(&plan.current_age) {
        violations.push(PlanViolation::CurrentAgeOutOfBounds {
            age: plan.current_age,
        });
    }

    if plan.retirement_age < MIN_RETIREMENT_AGE {
        violations.push(PlanViolation::RetirementAgeBelowMin {
            age: plan.retirement_age,
        });
    }

    if plan.retirement_age <= plan.current_age {
        violations.push(PlanViolation::RetirementNotAfterCurrent {
            current: plan.current_age,
            retirement: plan.retirement_age,
        });
    }

    if plan.desired_monthly_income <= Decimal::ZERO {
        violations.push(PlanViolation::NonPositiveIncome);
    }

    if !(MIN_YEARS_OF_PAYMENTS..=MAX_YEARS_OF_PAYMENTS).contains(&plan.years_of_payments) {
        violations.push(PlanViolation::YearsOfPaymentsOutOfBounds {
            years: plan.years_of_payments,
        });
    }

    let bps = plan.rate_bps();
    if !(0..=MAX_INTEREST_RATE_BPS).contains(&bps) {
        violations.push(PlanViolation::InterestRateOutOfBounds { bps });
    }

    let timelock = plan.effective_timelock_years();
    if !(MIN_TIMELOCK_YEARS..=MAX_TIMELOCK_YEARS).contains(&timelock) {
        violations.push(PlanViolation::TimelockOutOfBounds { years: timelock });
    }

    violations
}
