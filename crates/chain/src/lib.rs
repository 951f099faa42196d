pub mod client;
pub mod clock;
pub mod mock;

pub use client::{
    AccountProvider, Address, AddressError, BlockHeader, CallRequest, ChainError, EvmClient,
    FeeHistory, TxReceipt,
};
pub use clock::{Clock, SystemClock};
pub use mock::{MockAccountProvider, MockEvmClient, TestClock};
