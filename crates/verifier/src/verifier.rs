use futures::join;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use pension_engine_chain::{Address, ChainError, EvmClient};
use pension_engine_types::{required_approval, RetirementPlan, UnitError};

/// Native balance the account must hold on top of the deposit, wei.
/// Covers approval plus execution gas on every supported chain.
pub const MIN_GAS_RESERVE_WEI: u128 = 5_000_000_000_000_000;

/// Upper bound on how long the snapshot may stay in the loading state.
pub const READ_WATCHDOG: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    Plan(#[from] UnitError),
}

/// Point-in-time view of the three on-chain preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub token_balance: u128,
    pub native_balance: u128,
    pub allowance: u128,

    pub required_approval: u128,
    pub required_gas: u128,

    pub sufficient_balance: bool,
    pub sufficient_allowance: bool,
    pub sufficient_gas: bool,

    /// False when the watchdog forced an exit with reads still pending;
    /// unresolved values read as zero
    pub complete: bool,
}

impl BalanceSnapshot {
    /// The approval step is required exactly when the live allowance is
    /// below the required amount.
    pub fn needs_approval(&self) -> bool {
        !self.sufficient_allowance
    }

    pub fn all_sufficient(&self) -> bool {
        self.sufficient_balance && self.sufficient_allowance && self.sufficient_gas
    }
}

/// Reads token balance, allowance and gas balance for an account and
/// compares them against what a plan requires.
pub struct BalanceVerifier {
    client: Arc<dyn EvmClient>,
    token: Address,
    spender: Address,
    watchdog: Duration,
}

impl BalanceVerifier {
    pub fn new(client: Arc<dyn EvmClient>, token: Address, spender: Address) -> Self {
        Self {
            client,
            token,
            spender,
            watchdog: READ_WATCHDOG,
        }
    }

    /// The three reads are independent and run concurrently; allowance
    /// is always read live because it gates the approval step.
    pub async fn verify(
        &self,
        plan: &RetirementPlan,
        account: &Address,
    ) -> Result<BalanceSnapshot, VerifierError> {
        let required = required_approval(plan)?;

        let (token_balance, allowance, native_balance) = join!(
            self.bounded_read("token_balance", self.client.token_balance(&self.token, account)),
            self.bounded_read(
                "allowance",
                self.client.allowance(&self.token, account, &self.spender),
            ),
            self.bounded_read("native_balance", self.client.native_balance(account)),
        );

        let complete =
            token_balance.is_some() && allowance.is_some() && native_balance.is_some();
        if !complete {
            warn!("Balance snapshot incomplete, sufficiency computed on resolved reads");
        }

        let token_balance = token_balance.unwrap_or(0);
        let allowance = allowance.unwrap_or(0);
        let native_balance = native_balance.unwrap_or(0);

        let snapshot = BalanceSnapshot {
            token_balance,
            native_balance,
            allowance,
            required_approval: required,
            required_gas: MIN_GAS_RESERVE_WEI,
            sufficient_balance: token_balance >= required,
            sufficient_allowance: allowance >= required,
            sufficient_gas: native_balance >= MIN_GAS_RESERVE_WEI,
            complete,
        };

        info!(
            token_balance,
            allowance,
            native_balance,
            required,
            needs_approval = snapshot.needs_approval(),
            "Balance snapshot ready"
        );

        Ok(snapshot)
    }

    /// One read under the watchdog. Timeouts and network failures both
    /// degrade to `None` rather than failing the snapshot.
    async fn bounded_read<F>(&self, label: &str, read: F) -> Option<u128>
    where
        F: Future<Output = Result<u128, ChainError>>,
    {
        match tokio::time::timeout(self.watchdog, read).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(read = label, error = %e, "Chain read failed");
                None
            }
            Err(_) => {
                warn!(read = label, watchdog = ?self.watchdog, "Chain read hit watchdog");
                None
            }
        }
    }
}
