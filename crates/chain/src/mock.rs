//! Configurable in-memory chain doubles for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{
    AccountProvider, Address, BlockHeader, CallRequest, ChainError, EvmClient, FeeHistory,
    TxReceipt,
};
use crate::clock::Clock;

/// How a mocked read behaves.
#[derive(Debug, Clone)]
pub enum ReadBehavior {
    Value(u128),
    Fail(String),
    /// Never resolves; exercises watchdog paths
    Hang,
}

impl ReadBehavior {
    async fn resolve(&self) -> Result<u128, ChainError> {
        match self {
            ReadBehavior::Value(v) => Ok(*v),
            ReadBehavior::Fail(msg) => Err(ChainError::Network(msg.clone())),
            ReadBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Scriptable [`EvmClient`] double.
pub struct MockEvmClient {
    token_balance: ReadBehavior,
    allowance: ReadBehavior,
    native_balance: ReadBehavior,
    estimate_gas: Result<u64, String>,
    base_fee_per_gas: Option<u128>,
    block_read_fails: bool,
    gas_prices: Mutex<VecDeque<u128>>,
    fallback_gas_price: u128,
    reward_history: Vec<Vec<u128>>,
    simulate_result: Result<(), ChainError>,
    send_result: Result<(), ChainError>,
    receipt_status: bool,

    pub simulate_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub allowance_reads: AtomicUsize,
}

impl Default for MockEvmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvmClient {
    pub fn new() -> Self {
        Self {
            token_balance: ReadBehavior::Value(0),
            allowance: ReadBehavior::Value(0),
            native_balance: ReadBehavior::Value(0),
            estimate_gas: Ok(100_000),
            base_fee_per_gas: Some(20_000_000_000),
            block_read_fails: false,
            gas_prices: Mutex::new(VecDeque::new()),
            fallback_gas_price: 25_000_000_000,
            reward_history: vec![vec![2_000_000_000]; 4],
            simulate_result: Ok(()),
            send_result: Ok(()),
            receipt_status: true,
            simulate_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            allowance_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_token_balance(mut self, behavior: ReadBehavior) -> Self {
        self.token_balance = behavior;
        self
    }

    pub fn with_allowance(mut self, behavior: ReadBehavior) -> Self {
        self.allowance = behavior;
        self
    }

    pub fn with_native_balance(mut self, behavior: ReadBehavior) -> Self {
        self.native_balance = behavior;
        self
    }

    pub fn with_estimate_gas(mut self, result: Result<u64, &str>) -> Self {
        self.estimate_gas = result.map_err(|e| e.to_string());
        self
    }

    pub fn with_base_fee(mut self, base_fee: Option<u128>) -> Self {
        self.base_fee_per_gas = base_fee;
        self
    }

    pub fn with_failing_block_read(mut self) -> Self {
        self.block_read_fails = true;
        self
    }

    /// Queue gas prices returned in order; the fallback price repeats
    /// once the queue drains.
    pub fn with_gas_prices(mut self, prices: &[u128], fallback: u128) -> Self {
        self.gas_prices = Mutex::new(prices.iter().copied().collect());
        self.fallback_gas_price = fallback;
        self
    }

    pub fn with_gas_price(self, price: u128) -> Self {
        self.with_gas_prices(&[], price)
    }

    pub fn with_reward_history(mut self, rewards: Vec<Vec<u128>>) -> Self {
        self.reward_history = rewards;
        self
    }

    pub fn with_simulate_result(mut self, result: Result<(), ChainError>) -> Self {
        self.simulate_result = result;
        self
    }

    pub fn with_send_result(mut self, result: Result<(), ChainError>) -> Self {
        self.send_result = result;
        self
    }

    pub fn with_receipt_status(mut self, status: bool) -> Self {
        self.receipt_status = status;
        self
    }
}

#[async_trait]
impl EvmClient for MockEvmClient {
    async fn token_balance(&self, _token: &Address, _owner: &Address) -> Result<u128, ChainError> {
        self.token_balance.resolve().await
    }

    async fn allowance(
        &self,
        _token: &Address,
        _owner: &Address,
        _spender: &Address,
    ) -> Result<u128, ChainError> {
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        self.allowance.resolve().await
    }

    async fn native_balance(&self, _owner: &Address) -> Result<u128, ChainError> {
        self.native_balance.resolve().await
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> Result<u64, ChainError> {
        self.estimate_gas
            .clone()
            .map_err(ChainError::CallFailed)
    }

    async fn latest_block(&self) -> Result<BlockHeader, ChainError> {
        if self.block_read_fails {
            return Err(ChainError::Network("block fetch failed".to_string()));
        }
        Ok(BlockHeader {
            number: 1_000,
            base_fee_per_gas: self.base_fee_per_gas,
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let mut queue = self.gas_prices.lock().expect("gas price lock");
        Ok(queue.pop_front().unwrap_or(self.fallback_gas_price))
    }

    async fn fee_history(
        &self,
        block_count: u64,
        _percentiles: &[f64],
    ) -> Result<FeeHistory, ChainError> {
        let take = block_count as usize;
        Ok(FeeHistory {
            rewards: self
                .reward_history
                .iter()
                .rev()
                .take(take)
                .rev()
                .cloned()
                .collect(),
        })
    }

    async fn simulate_call(&self, _call: &CallRequest) -> Result<(), ChainError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_result.clone()
    }

    async fn send_transaction(&self, _call: &CallRequest) -> Result<String, ChainError> {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.send_result.clone()?;
        Ok(format!("0xmock{:04}", n))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ChainError> {
        Ok(TxReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: 1_001,
            gas_used: 90_000,
            status: self.receipt_status,
        })
    }
}

/// Fixed account/chain provider for tests.
pub struct MockAccountProvider {
    address: Option<Address>,
    chain_id: u64,
}

impl MockAccountProvider {
    pub fn new(address: Option<Address>, chain_id: u64) -> Self {
        Self { address, chain_id }
    }
}

#[async_trait]
impl AccountProvider for MockAccountProvider {
    async fn active_address(&self) -> Option<Address> {
        self.address.clone()
    }

    async fn active_chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Deterministic clock: `sleep` advances the reading instantly.
pub struct TestClock {
    now: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.now
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tail: u8) -> Address {
        Address::parse(&format!("0x{:040x}", tail)).expect("valid test address")
    }

    #[tokio::test]
    async fn test_gas_price_queue_then_fallback() {
        let client = MockEvmClient::new().with_gas_prices(&[5, 6], 9);
        assert_eq!(client.gas_price().await.unwrap(), 5);
        assert_eq!(client.gas_price().await.unwrap(), 6);
        assert_eq!(client.gas_price().await.unwrap(), 9);
        assert_eq!(client.gas_price().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_send_counter_and_hash() {
        let client = MockEvmClient::new();
        let call = CallRequest::new(addr(1), vec![]);
        let h0 = client.send_transaction(&call).await.unwrap();
        let h1 = client.send_transaction(&call).await.unwrap();
        assert_ne!(h0, h1);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_read() {
        let client =
            MockEvmClient::new().with_token_balance(ReadBehavior::Fail("boom".to_string()));
        let err = client.token_balance(&addr(1), &addr(2)).await.unwrap_err();
        assert!(matches!(err, ChainError::Network(_)));
    }

    #[tokio::test]
    async fn test_test_clock_advances_on_sleep() {
        let clock = TestClock::new();
        assert_eq!(clock.now_millis(), 0);
        clock.sleep(Duration::from_millis(250)).await;
        assert_eq!(clock.now_millis(), 250);
    }
}
