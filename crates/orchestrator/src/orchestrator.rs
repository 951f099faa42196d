//! Drives one plan-creation flow through approval, simulation,
//! submission and confirmation.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use pension_engine_chain::{AccountProvider, Address, CallRequest, EvmClient};
use pension_engine_fees::{EstimateOptions, FeeEstimator};
use pension_engine_types::{derive, to_base_units, validate, RetirementPlan};
use pension_engine_verifier::{BalanceSnapshot, BalanceVerifier, VerifierError};

use crate::abi;
use crate::error::OrchestratorError;
use crate::machine::{transition, TxEvent, TxState};

#[derive(Debug, Default)]
struct FlowState {
    state: TxState,
    history: Vec<TxState>,
    last_error: Option<OrchestratorError>,
    snapshot: Option<BalanceSnapshot>,
    approval_tx: Option<String>,
    execution_tx: Option<String>,
}

/// Stateful driver for the approve/execute sequence of a single plan.
///
/// One instance owns one flow. All lifecycle changes go through the
/// transition function in [`crate::machine`]; a submission entry point
/// invoked while the flow is already past `Idle` is a no-op.
pub struct PlanOrchestrator {
    client: Arc<dyn EvmClient>,
    accounts: Arc<dyn AccountProvider>,
    estimator: FeeEstimator,
    token: Address,
    spender: Address,
    flow: RwLock<FlowState>,
}

impl PlanOrchestrator {
    pub fn new(
        client: Arc<dyn EvmClient>,
        accounts: Arc<dyn AccountProvider>,
        token: Address,
        spender: Address,
    ) -> Self {
        Self {
            estimator: FeeEstimator::new(client.clone()),
            client,
            accounts,
            token,
            spender,
            flow: RwLock::new(FlowState::default()),
        }
    }

    pub async fn state(&self) -> TxState {
        self.flow.read().await.state
    }

    pub async fn progress(&self) -> u8 {
        self.flow.read().await.state.progress()
    }

    pub async fn last_error(&self) -> Option<OrchestratorError> {
        self.flow.read().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> Option<BalanceSnapshot> {
        self.flow.read().await.snapshot.clone()
    }

    /// States visited so far, in order.
    pub async fn history(&self) -> Vec<TxState> {
        self.flow.read().await.history.clone()
    }

    pub async fn approval_tx(&self) -> Option<String> {
        self.flow.read().await.approval_tx.clone()
    }

    pub async fn execution_tx(&self) -> Option<String> {
        self.flow.read().await.execution_tx.clone()
    }

    /// The only path back to `Idle` from a terminal state. Clears all
    /// flow-local data; nothing is cached across flows.
    pub async fn reset(&self) {
        let mut flow = self.flow.write().await;
        *flow = FlowState::default();
    }

    /// Submit the allowance-setting call and wait for its confirmation.
    ///
    /// No-op when the allowance already covers the required amount, or
    /// when the flow has already moved past `Idle`.
    pub async fn submit_approval(&self, plan: &RetirementPlan) -> Result<(), OrchestratorError> {
        validation_gate(plan)?;
        let spender = self.resolve_spender(plan)?;

        if self.state().await != TxState::Idle {
            debug!("Approval request ignored, flow already started");
            return Ok(());
        }

        let account = self.active_account().await?;
        let snapshot = self.refresh_snapshot(plan, &account, &spender).await?;
        if !snapshot.needs_approval() {
            info!(
                allowance = snapshot.allowance,
                required = snapshot.required_approval,
                "Allowance already sufficient, approval skipped"
            );
            return Ok(());
        }

        if !self.advance(TxEvent::ApprovalSubmitted).await {
            return Ok(());
        }

        let data = abi::encode_approve(&spender, snapshot.required_approval);
        let call = CallRequest::new(self.token.clone(), data).with_from(account);

        let tx_hash = match self.submit(call).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(e).await,
        };
        self.flow.write().await.approval_tx = Some(tx_hash.clone());
        info!(%tx_hash, "Approval submitted, awaiting receipt");

        if let Err(e) = self.confirm(&tx_hash).await {
            return self.fail(e).await;
        }
        self.advance(TxEvent::ApprovalConfirmed).await;
        info!(%tx_hash, "Approval confirmed");
        Ok(())
    }

    /// Simulate, submit and confirm the plan-creation call.
    ///
    /// Legal from `Approved`, or directly from `Idle` when no approval
    /// is needed. A simulation failure moves the flow to `Error`
    /// without broadcasting anything.
    pub async fn submit_execution(&self, plan: &RetirementPlan) -> Result<(), OrchestratorError> {
        validation_gate(plan)?;
        let spender = self.resolve_spender(plan)?;

        let entry_state = self.state().await;
        if entry_state.in_flight() || entry_state.is_terminal() {
            debug!(state = ?entry_state, "Execution request ignored, flow busy");
            return Ok(());
        }

        let account = self.active_account().await?;

        if entry_state == TxState::Idle {
            let snapshot = self.refresh_snapshot(plan, &account, &spender).await?;
            if snapshot.needs_approval() {
                return Err(OrchestratorError::Validation(
                    "allowance below the required amount; approval must confirm first"
                        .to_string(),
                ));
            }
        }

        if !self.advance(TxEvent::ExecutionStarted).await {
            return Ok(());
        }

        let derived = derive(plan)
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;
        let monthly = to_base_units(plan.monthly_deposit, "monthly_deposit")
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;

        let data = abi::encode_create_plan(
            derived.deposit_base_units,
            monthly,
            derived.rate_bps,
            plan.effective_timelock_years(),
        );
        let mut call = CallRequest::new(spender, data).with_from(account);

        let chain_id = self.accounts.active_chain_id().await;
        let estimate = match self
            .estimator
            .estimate(chain_id, &call, &EstimateOptions::default())
            .await
        {
            Ok(estimate) => estimate,
            Err(e) => return self.fail(e.into()).await,
        };
        estimate.apply(&mut call);

        if let Err(e) = self.client.simulate_call(&call).await {
            warn!(error = %e, "Simulation rejected the call, nothing broadcast");
            return self.fail(OrchestratorError::from_chain(&e)).await;
        }

        let tx_hash = match self.client.send_transaction(&call).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(OrchestratorError::from_chain(&e)).await,
        };
        self.advance(TxEvent::ExecutionSubmitted).await;
        self.flow.write().await.execution_tx = Some(tx_hash.clone());
        info!(%tx_hash, "Plan creation submitted, awaiting receipt");

        if let Err(e) = self.confirm(&tx_hash).await {
            return self.fail(e).await;
        }
        self.advance(TxEvent::Confirmed).await;
        info!(%tx_hash, "Plan created");
        Ok(())
    }

    /// Full sequence: approval when needed, then execution.
    pub async fn run_all(&self, plan: &RetirementPlan) -> Result<(), OrchestratorError> {
        self.submit_approval(plan).await?;
        self.submit_execution(plan).await
    }

    /// Estimate fees for a call and hand it to the signer.
    async fn submit(&self, mut call: CallRequest) -> Result<String, OrchestratorError> {
        let chain_id = self.accounts.active_chain_id().await;
        let estimate = self
            .estimator
            .estimate(chain_id, &call, &EstimateOptions::default())
            .await?;
        estimate.apply(&mut call);

        self.client
            .send_transaction(&call)
            .await
            .map_err(|e| OrchestratorError::from_chain(&e))
    }

    /// Wait for a receipt and require on-chain success.
    async fn confirm(&self, tx_hash: &str) -> Result<(), OrchestratorError> {
        let receipt = self
            .client
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|e| OrchestratorError::from_chain(&e))?;
        if !receipt.is_success() {
            return Err(OrchestratorError::Receipt {
                tx_hash: tx_hash.to_string(),
            });
        }
        Ok(())
    }

    /// Live balance check; the snapshot is stored for consumers.
    async fn refresh_snapshot(
        &self,
        plan: &RetirementPlan,
        account: &Address,
        spender: &Address,
    ) -> Result<BalanceSnapshot, OrchestratorError> {
        let verifier =
            BalanceVerifier::new(self.client.clone(), self.token.clone(), spender.clone());
        let snapshot = verifier
            .verify(plan, account)
            .await
            .map_err(|VerifierError::Plan(e)| OrchestratorError::Validation(e.to_string()))?;
        self.flow.write().await.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Apply one event; an illegal combination leaves the state alone.
    /// Guards in the entry points make that a lost race, not a bug.
    async fn advance(&self, event: TxEvent) -> bool {
        let mut flow = self.flow.write().await;
        match transition(flow.state, event) {
            Ok(next) => {
                debug!(from = ?flow.state, to = ?next, "State transition");
                flow.state = next;
                flow.history.push(next);
                true
            }
            Err(e) => {
                debug!(%e, "Transition skipped");
                false
            }
        }
    }

    /// Record a classified error and move the flow to `Error`.
    async fn fail(&self, err: OrchestratorError) -> Result<(), OrchestratorError> {
        {
            let mut flow = self.flow.write().await;
            if let Ok(next) = transition(flow.state, TxEvent::Failed) {
                flow.state = next;
                flow.history.push(next);
            }
            flow.last_error = Some(err.clone());
        }
        warn!(error = %err, "Flow moved to error state");
        Err(err)
    }

    fn resolve_spender(&self, plan: &RetirementPlan) -> Result<Address, OrchestratorError> {
        match &plan.target_protocol {
            Some(raw) => Address::parse(raw)
                .map_err(|e| OrchestratorError::Validation(e.to_string())),
            None => Ok(self.spender.clone()),
        }
    }

    async fn active_account(&self) -> Result<Address, OrchestratorError> {
        self.accounts.active_address().await.ok_or_else(|| {
            OrchestratorError::Validation("no active wallet account connected".to_string())
        })
    }
}

/// Reject malformed input before any network call.
fn validation_gate(plan: &RetirementPlan) -> Result<(), OrchestratorError> {
    let violations = validate(plan);
    if violations.is_empty() {
        return Ok(());
    }
    let message = violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(OrchestratorError::Validation(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationFailure;
    use futures::join;
    use pension_engine_chain::mock::ReadBehavior;
    use pension_engine_chain::{ChainError, MockAccountProvider, MockEvmClient};
    use pension_engine_verifier::MIN_GAS_RESERVE_WEI;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    const REQUIRED: u128 = 1_155_000_000;

    fn make_plan() -> RetirementPlan {
        RetirementPlan {
            principal: dec!(1000),
            monthly_deposit: dec!(100),
            desired_monthly_income: dec!(2000),
            current_age: 30,
            retirement_age: 65,
            years_of_payments: 20,
            interest_rate_pct: dec!(5),
            timelock_years: 15,
            target_protocol: None,
        }
    }

    fn addr(tail: u8) -> Address {
        Address::parse(&format!("0x{:040x}", tail)).unwrap()
    }

    fn funded_client(allowance: u128) -> MockEvmClient {
        MockEvmClient::new()
            .with_token_balance(ReadBehavior::Value(REQUIRED))
            .with_allowance(ReadBehavior::Value(allowance))
            .with_native_balance(ReadBehavior::Value(MIN_GAS_RESERVE_WEI))
    }

    fn orchestrator(client: MockEvmClient) -> (Arc<MockEvmClient>, PlanOrchestrator) {
        let client = Arc::new(client);
        let accounts = Arc::new(MockAccountProvider::new(Some(addr(0x11)), 1));
        let orch = PlanOrchestrator::new(
            client.clone(),
            accounts,
            addr(0xaa),
            addr(0xbb),
        );
        (client, orch)
    }

    #[tokio::test]
    async fn test_full_flow_with_approval() {
        let (client, orch) = orchestrator(funded_client(0));
        orch.run_all(&make_plan()).await.unwrap();

        assert_eq!(orch.state().await, TxState::Success);
        assert_eq!(orch.progress().await, 100);
        assert_eq!(
            orch.history().await,
            vec![
                TxState::Approving,
                TxState::Approved,
                TxState::Executing,
                TxState::Confirming,
                TxState::Success,
            ]
        );
        // one approval, one execution
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 2);
        assert!(orch.approval_tx().await.is_some());
        assert!(orch.execution_tx().await.is_some());
    }

    #[tokio::test]
    async fn test_progress_strictly_increases_along_success_path() {
        let (_client, orch) = orchestrator(funded_client(0));
        orch.run_all(&make_plan()).await.unwrap();

        let progress: Vec<u8> = orch
            .history()
            .await
            .iter()
            .map(|s| s.progress())
            .collect();
        assert_eq!(progress, vec![20, 40, 60, 80, 100]);
        assert!(progress.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test]
    async fn test_execution_proceeds_from_confirmed_approval() {
        let (client, orch) = orchestrator(funded_client(0));
        let plan = make_plan();

        orch.submit_approval(&plan).await.unwrap();
        assert_eq!(orch.state().await, TxState::Approved);

        // the confirmed approval must not block the execution step
        orch.submit_execution(&plan).await.unwrap();
        assert_eq!(orch.state().await, TxState::Success);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let (client, orch) = orchestrator(funded_client(REQUIRED));
        orch.run_all(&make_plan()).await.unwrap();

        assert_eq!(orch.state().await, TxState::Success);
        assert_eq!(
            orch.history().await,
            vec![TxState::Executing, TxState::Confirming, TxState::Success]
        );
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 1);
        assert!(orch.approval_tx().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_send_once() {
        let (client, orch) = orchestrator(funded_client(REQUIRED));
        let plan = make_plan();

        let (a, b) = join!(orch.submit_execution(&plan), orch.submit_execution(&plan));
        a.unwrap();
        b.unwrap();

        assert_eq!(client.send_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.state().await, TxState::Success);
    }

    #[tokio::test]
    async fn test_resubmission_after_success_is_noop() {
        let (client, orch) = orchestrator(funded_client(REQUIRED));
        let plan = make_plan();
        orch.run_all(&plan).await.unwrap();

        orch.submit_approval(&plan).await.unwrap();
        orch.submit_execution(&plan).await.unwrap();
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_simulation_failure_never_broadcasts() {
        let client = funded_client(REQUIRED).with_simulate_result(Err(
            ChainError::CallFailed("execution reverted: pool paused".to_string()),
        ));
        let (client, orch) = orchestrator(client);

        let err = orch.run_all(&make_plan()).await.unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::Simulation(SimulationFailure::ContractRevert {
                reason: "pool paused".to_string()
            })
        );
        assert_eq!(orch.state().await, TxState::Error);
        assert_eq!(orch.progress().await, 0);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.last_error().await, Some(err));
    }

    #[tokio::test]
    async fn test_signer_rejection_during_broadcast() {
        let client = funded_client(REQUIRED).with_send_result(Err(ChainError::Rejected(
            "MetaMask Tx Signature: User denied transaction signature.".to_string(),
        )));
        let (client, orch) = orchestrator(client);

        let err = orch.run_all(&make_plan()).await.unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::Simulation(SimulationFailure::UserRejected)
        );
        assert_eq!(orch.state().await, TxState::Error);
        assert_eq!(orch.last_error().await, Some(err));
        // simulation passed; the rejection happened at the signer
        assert_eq!(client.simulate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 1);
        assert!(orch.execution_tx().await.is_none());
    }

    #[tokio::test]
    async fn test_receipt_failure_moves_to_error() {
        let client = funded_client(REQUIRED).with_receipt_status(false);
        let (_client, orch) = orchestrator(client);

        let err = orch.run_all(&make_plan()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Receipt { .. }));
        assert_eq!(orch.state().await, TxState::Error);
    }

    #[tokio::test]
    async fn test_validation_gate_makes_zero_network_calls() {
        let (client, orch) = orchestrator(funded_client(0));
        let mut plan = make_plan();
        plan.current_age = 10;

        let err = orch.run_all(&plan).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert_eq!(orch.state().await, TxState::Idle);
        assert_eq!(client.allowance_reads.load(Ordering::SeqCst), 0);
        assert_eq!(client.simulate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_protocol_override_is_rejected_offline() {
        let (client, orch) = orchestrator(funded_client(0));
        let mut plan = make_plan();
        plan.target_protocol = Some("0x1234".to_string());

        let err = orch.run_all(&plan).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert_eq!(client.allowance_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execution_from_idle_requires_allowance() {
        let (client, orch) = orchestrator(funded_client(0));

        let err = orch.submit_execution(&make_plan()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert_eq!(orch.state().await, TxState::Idle);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_terminal_state() {
        let client = funded_client(REQUIRED)
            .with_simulate_result(Err(ChainError::CallFailed("reverted".to_string())));
        let (_client, orch) = orchestrator(client);

        let _ = orch.run_all(&make_plan()).await;
        assert_eq!(orch.state().await, TxState::Error);

        orch.reset().await;
        assert_eq!(orch.state().await, TxState::Idle);
        assert!(orch.last_error().await.is_none());
        assert!(orch.history().await.is_empty());
        assert!(orch.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_account_is_validation_error() {
        let client = Arc::new(funded_client(0));
        let accounts = Arc::new(MockAccountProvider::new(None, 1));
        let orch = PlanOrchestrator::new(client, accounts, addr(0xaa), addr(0xbb));

        let err = orch.run_all(&make_plan()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_snapshot_exposed_after_run() {
        let (_client, orch) = orchestrator(funded_client(REQUIRED));
        orch.run_all(&make_plan()).await.unwrap();

        let snapshot = orch.snapshot().await.unwrap();
        assert_eq!(snapshot.required_approval, REQUIRED);
        assert!(!snapshot.needs_approval());
    }
}
