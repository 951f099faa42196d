//! Approve/execute lifecycle as an explicit state machine.
//!
//! Every lifecycle change goes through [`transition`]; illegal
//! combinations are rejected there instead of being scattered through
//! the driver code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of one plan-creation flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    #[default]
    Idle,
    Approving,
    Approved,
    Executing,
    Confirming,
    Success,
    Error,
}

impl TxState {
    /// Fixed progress percentage for display. Strictly increasing along
    /// the success path.
    pub fn progress(&self) -> u8 {
        match self {
            TxState::Idle => 0,
            TxState::Approving => 20,
            TxState::Approved => 40,
            TxState::Executing => 60,
            TxState::Confirming => 80,
            TxState::Success => 100,
            TxState::Error => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Success | TxState::Error)
    }

    /// A submission is in flight while a step is actively running.
    /// `Approved` is a resting state: the approval confirmed and the
    /// flow is waiting for the execution step to start.
    pub fn in_flight(&self) -> bool {
        matches!(
            self,
            TxState::Approving | TxState::Executing | TxState::Confirming
        )
    }
}

/// Events that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    ApprovalSubmitted,
    ApprovalConfirmed,
    ExecutionStarted,
    ExecutionSubmitted,
    Confirmed,
    Failed,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition: {event:?} in state {from:?}")]
pub struct IllegalTransition {
    pub from: TxState,
    pub event: TxEvent,
}

/// Total transition function.
///
/// `Failed` is accepted from every non-terminal state, `Reset` from
/// every state. Everything else is enumerated explicitly.
pub fn transition(from: TxState, event: TxEvent) -> Result<TxState, IllegalTransition> {
    use TxEvent::*;
    use TxState::*;

    let next = match (from, event) {
        (_, Reset) => Idle,
        (s, Failed) if !s.is_terminal() => Error,

        (Idle, ApprovalSubmitted) => Approving,
        (Approving, ApprovalConfirmed) => Approved,

        // execution may start directly from idle when no approval is
        // needed
        (Idle, ExecutionStarted) | (Approved, ExecutionStarted) => Executing,
        (Executing, ExecutionSubmitted) => Confirming,
        (Confirming, Confirmed) => Success,

        (from, event) => return Err(IllegalTransition { from, event }),
    };

    Ok(next)
}
