use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Chain access error types
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("signer rejected the request: {0}")]
    Rejected(String),

    #[error("call failed: {0}")]
    CallFailed(String),
}

/// Address parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be 0x-prefixed and 40 hex digits: {0}")]
    Malformed(String),

    #[error("zero address is not a valid target")]
    Zero,
}

/// Checksummed-agnostic EVM address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address string. The zero address is
    /// rejected; it is never a meaningful spender or token here.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let Some(digits) = s.strip_prefix("0x") else {
            return Err(AddressError::Malformed(s.to_string()));
        };
        if digits.len() != 40 {
            return Err(AddressError::Malformed(s.to_string()));
        }
        let bytes =
            hex::decode(digits).map_err(|_| AddressError::Malformed(s.to_string()))?;
        if bytes.iter().all(|b| *b == 0) {
            return Err(AddressError::Zero);
        }
        Ok(Self(format!("0x{}", digits.to_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20-byte form, for calldata encoding.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Construction guarantees 40 valid hex digits
        let decoded = hex::decode(&self.0[2..]).expect("address holds valid hex");
        out.copy_from_slice(&decoded);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contract call to simulate, estimate or submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: u128,

    /// Fee fields filled in by the estimator before submission
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to,
            data,
            value: 0,
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// The block fields the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,

    /// Absent on legacy-fee-market chains
    pub base_fee_per_gas: Option<u128>,
}

/// Reward samples from `eth_feeHistory`: one row per block, one entry
/// per requested percentile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeHistory {
    pub rewards: Vec<Vec<u128>>,
}

/// Mined transaction receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub status: bool,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status
    }
}

/// Node access used by the engine. One implementation wraps the live
/// RPC provider; tests inject [`crate::mock::MockEvmClient`].
#[async_trait]
pub trait EvmClient: Send + Sync {
    /// ERC-20 `balanceOf(owner)` on `token`
    async fn token_balance(&self, token: &Address, owner: &Address) -> Result<u128, ChainError>;

    /// ERC-20 `allowance(owner, spender)` on `token`
    async fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128, ChainError>;

    /// Native gas-token balance of `owner`
    async fn native_balance(&self, owner: &Address) -> Result<u128, ChainError>;

    /// Simulate the call to estimate its gas use
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, ChainError>;

    async fn latest_block(&self) -> Result<BlockHeader, ChainError>;

    /// Single node-quoted legacy gas price, wei
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Miner reward percentiles over the last `block_count` blocks
    async fn fee_history(
        &self,
        block_count: u64,
        percentiles: &[f64],
    ) -> Result<FeeHistory, ChainError>;

    /// Dry-run the call without broadcasting
    async fn simulate_call(&self, call: &CallRequest) -> Result<(), ChainError>;

    /// Hand the call to the signer and broadcast; returns the tx hash
    async fn send_transaction(&self, call: &CallRequest) -> Result<String, ChainError>;

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ChainError>;
}

/// Active wallet account and network.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    async fn active_address(&self) -> Option<Address>;
    async fn active_chain_id(&self) -> u64;
}
