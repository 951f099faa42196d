//! Client-side engine for on-chain retirement savings plans.
//!
//! The engine derives integer base-unit amounts from a user's plan,
//! checks balances and allowance against what the plan requires,
//! estimates per-chain transaction fees, and drives the approve/execute
//! sequence that creates the plan on chain.
//!
//! The member crates can be used directly; this facade re-exports the
//! surface most consumers need, plus the pure plan helpers.

pub use pension_engine_chain as chain;
pub use pension_engine_fees as fees;
pub use pension_engine_orchestrator as orchestrator;
pub use pension_engine_types as types;
pub use pension_engine_verifier as verifier;

pub use pension_engine_chain::{AccountProvider, Address, EvmClient};
pub use pension_engine_fees::{EstimateOptions, FeeEstimate, FeeEstimator};
pub use pension_engine_orchestrator::{OrchestratorError, PlanOrchestrator, TxState};
pub use pension_engine_types::{DerivedPlan, PlanError, PlanViolation, RetirementPlan};
pub use pension_engine_verifier::{BalanceSnapshot, BalanceVerifier};

use pension_engine_types::UnitError;

/// Derive all base-unit values for a plan.
pub fn derive_plan_values(plan: &RetirementPlan) -> Result<DerivedPlan, PlanError> {
    pension_engine_types::derive(plan)
}

/// Check every plan constraint; empty means valid.
pub fn validate_plan(plan: &RetirementPlan) -> Vec<PlanViolation> {
    pension_engine_types::validate(plan)
}

/// Allowance the fund contract needs for the plan's opening deposit.
pub fn required_approval_amount(plan: &RetirementPlan) -> Result<u128, UnitError> {
    pension_engine_types::required_approval(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_facade_helpers_agree_with_member_crates() {
        let plan = RetirementPlan {
            principal: dec!(1000),
            monthly_deposit: dec!(100),
            desired_monthly_income: dec!(2000),
            current_age: 30,
            retirement_age: 65,
            years_of_payments: 20,
            interest_rate_pct: dec!(5),
            timelock_years: 15,
            target_protocol: None,
        };

        assert!(validate_plan(&plan).is_empty());
        assert_eq!(required_approval_amount(&plan).unwrap(), 1_155_000_000);

        let derived = derive_plan_values(&plan).unwrap();
        assert_eq!(derived.deposit_base_units, 1_100_000_000);
        assert_eq!(derived.fee_base_units, 55_000_000);
    }
}
