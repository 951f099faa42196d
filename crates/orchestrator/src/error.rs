use thiserror::Error;

use pension_engine_chain::ChainError;
use pension_engine_fees::FeeError;

/// Classified reason a simulated call would fail.
///
/// Raw provider error text is matched here once and never shown to the
/// caller; the `Display` strings are the user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationFailure {
    #[error("not enough native balance to cover gas for this transaction")]
    InsufficientGasFunds,

    #[error("the signing request was rejected in the wallet")]
    UserRejected,

    #[error("the contract rejected the transaction: {reason}")]
    ContractRevert { reason: String },

    #[error("the transaction would fail; no funds were moved")]
    Unknown,
}

impl SimulationFailure {
    /// Map raw provider text onto a classified failure.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_lowercase();

        if lowered.contains("insufficient funds") || lowered.contains("insufficient balance") {
            return SimulationFailure::InsufficientGasFunds;
        }
        if lowered.contains("user rejected")
            || lowered.contains("user denied")
            || lowered.contains("rejected the request")
        {
            return SimulationFailure::UserRejected;
        }
        if lowered.contains("revert") {
            return SimulationFailure::ContractRevert {
                reason: extract_revert_reason(raw),
            };
        }

        SimulationFailure::Unknown
    }
}

/// Pull the human-readable reason out of the common revert formats.
fn extract_revert_reason(raw: &str) -> String {
    // "execution reverted: <reason>"
    if let Some(idx) = raw.find("reverted:") {
        let reason = raw[idx + "reverted:".len()..].trim();
        if !reason.is_empty() {
            return reason.trim_matches(['\'', '"']).to_string();
        }
    }
    // "reverted with reason string '<reason>'"
    if let Some(idx) = raw.find("reason string '") {
        let tail = &raw[idx + "reason string '".len()..];
        if let Some(end) = tail.find('\'') {
            return tail[..end].to_string();
        }
    }
    "unspecified".to_string()
}

/// Errors surfaced by the orchestrator. Terminal variants move the
/// state machine to `Error` until reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Bad input caught before any network call
    #[error("invalid plan: {0}")]
    Validation(String),

    #[error(transparent)]
    Simulation(SimulationFailure),

    #[error("network error: the node could not be reached")]
    Network,

    /// Mined but reverted on-chain
    #[error("transaction {tx_hash} was mined but failed")]
    Receipt { tx_hash: String },
}

impl OrchestratorError {
    /// A chain error during submission or simulation: connectivity
    /// failures stay network errors, everything else gets classified.
    pub fn from_chain(err: &ChainError) -> Self {
        match err {
            ChainError::Network(_) | ChainError::Timeout(_) => OrchestratorError::Network,
            ChainError::Rejected(raw) | ChainError::CallFailed(raw) => {
                OrchestratorError::Simulation(SimulationFailure::classify(raw))
            }
        }
    }
}

impl From<FeeError> for OrchestratorError {
    fn from(_: FeeError) -> Self {
        OrchestratorError::Network
    }
}
