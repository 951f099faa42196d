pub mod abi;
pub mod error;
pub mod machine;
pub mod orchestrator;

pub use error::{OrchestratorError, SimulationFailure};
pub use machine::{transition, IllegalTransition, TxEvent, TxState};
pub use orchestrator::PlanOrchestrator;
