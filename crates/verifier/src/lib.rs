pub mod verifier;

pub use verifier::{
    BalanceSnapshot, BalanceVerifier, VerifierError, MIN_GAS_RESERVE_WEI, READ_WATCHDOG,
};
