use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use pension_engine_chain::{CallRequest, ChainError, EvmClient};

use crate::profiles::{ChainFeeProfile, ProfileTable};

/// Protocol-wide floor for the priority fee, wei (1 gwei).
pub const MIN_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

/// Blocks sampled from `eth_feeHistory` on priority-fee markets.
pub const FEE_HISTORY_BLOCKS: u64 = 4;

/// Reward percentile sampled per block.
pub const REWARD_PERCENTILE: f64 = 50.0;

/// Fee estimation errors. Gas-estimation failure is handled internally
/// and never produces one of these.
#[derive(Debug, Clone, Error)]
pub enum FeeError {
    #[error("network error while reading fee data: {0}")]
    Network(String),

    #[error("gas price stayed above {ceiling_wei} wei for {waited_ms} ms")]
    WaitTimeout { ceiling_wei: u128, waited_ms: u64 },
}

impl From<ChainError> for FeeError {
    fn from(err: ChainError) -> Self {
        FeeError::Network(err.to_string())
    }
}

/// Tunables for a single estimate.
#[derive(Debug, Clone)]
pub struct EstimateOptions {
    /// Caller-supplied gas limit; skips simulation entirely
    pub gas_limit: Option<u64>,

    /// Percentage added on top of the simulated gas use
    pub gas_buffer_pct: u64,

    /// Percentage added on top of base/priority/legacy prices
    pub fee_buffer_pct: u64,

    /// Ignore the base-fee field and price like a legacy chain
    pub force_legacy: bool,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            gas_limit: None,
            gas_buffer_pct: 20,
            fee_buffer_pct: 20,
            force_legacy: false,
        }
    }
}

/// Complete fee estimate for one pending call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub total_cost_wei: u128,

    /// Display strings, pre-formatted for the UI
    pub max_fee_gwei: String,
    pub total_cost_native: String,
}

impl FeeEstimate {
    /// Copy the estimate into a call before submission.
    pub fn apply(&self, call: &mut CallRequest) {
        call.gas_limit = Some(self.gas_limit);
        call.max_fee_per_gas = Some(self.max_fee_per_gas);
        call.max_priority_fee_per_gas = Some(self.max_priority_fee_per_gas);
    }
}

/// Chain-aware fee estimator.
pub struct FeeEstimator {
    client: Arc<dyn EvmClient>,
    profiles: ProfileTable,
}

impl FeeEstimator {
    pub fn new(client: Arc<dyn EvmClient>) -> Self {
        Self {
            client,
            profiles: ProfileTable::new(),
        }
    }

    pub fn with_profiles(client: Arc<dyn EvmClient>, profiles: ProfileTable) -> Self {
        Self { client, profiles }
    }

    pub fn profile(&self, chain_id: u64) -> &ChainFeeProfile {
        self.profiles.profile(chain_id)
    }

    /// Estimate fees for `call` on `chain_id`.
    ///
    /// Never fails because gas estimation failed; that path degrades to
    /// the profile default. Does fail when block data or the gas price
    /// cannot be read, and does not retry: retry policy belongs to the
    /// caller.
    pub async fn estimate(
        &self,
        chain_id: u64,
        call: &CallRequest,
        options: &EstimateOptions,
    ) -> Result<FeeEstimate, FeeError> {
        let profile = self.profiles.profile(chain_id);

        let gas_limit = self.resolve_gas_limit(call, options, profile).await;

        let base_fee = if options.force_legacy {
            None
        } else if profile.surcharge_market {
            // Surcharge chains price off the quoted gas price even when
            // they expose a base-fee field
            None
        } else {
            self.client.latest_block().await?.base_fee_per_gas
        };

        let (mut max_fee, mut priority_fee) = match base_fee {
            Some(base) => self.priority_market_fees(base, options).await?,
            None => self.gas_price_fees(options).await?,
        };

        // Clamp into the profile bounds; a downward clamp also reins in
        // the priority fee so it stays a fraction of the max
        if max_fee < profile.min_fee_per_gas {
            max_fee = profile.min_fee_per_gas;
        } else if max_fee > profile.max_fee_per_gas {
            max_fee = profile.max_fee_per_gas;
            priority_fee = priority_fee.min(max_fee / 10);
        }
        priority_fee = priority_fee.min(max_fee);

        let total_cost_wei = gas_limit as u128 * max_fee;

        debug!(
            chain = %profile.name,
            gas_limit,
            max_fee_per_gas = max_fee,
            max_priority_fee_per_gas = priority_fee,
            "Fee estimate ready"
        );

        Ok(FeeEstimate {
            gas_limit,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
            total_cost_wei,
            max_fee_gwei: format_gwei(max_fee),
            total_cost_native: format_native(total_cost_wei),
        })
    }

    /// Explicit limit, else simulated estimate plus buffer, else the
    /// profile default when simulation fails (degraded mode, not an
    /// error).
    async fn resolve_gas_limit(
        &self,
        call: &CallRequest,
        options: &EstimateOptions,
        profile: &ChainFeeProfile,
    ) -> u64 {
        if let Some(limit) = options.gas_limit {
            return limit;
        }

        match self.client.estimate_gas(call).await {
            Ok(estimated) => u64::try_from(buffered(estimated as u128, options.gas_buffer_pct))
                .unwrap_or(profile.default_gas_limit),
            Err(e) => {
                warn!(
                    chain = %profile.name,
                    error = %e,
                    default_gas_limit = profile.default_gas_limit,
                    "Gas estimation failed, using profile default"
                );
                profile.default_gas_limit
            }
        }
    }

    /// Standard priority-fee market: sample recent percentile rewards,
    /// floor at the protocol minimum, and absorb one base-fee doubling.
    async fn priority_market_fees(
        &self,
        base_fee: u128,
        options: &EstimateOptions,
    ) -> Result<(u128, u128), FeeError> {
        let history = self
            .client
            .fee_history(FEE_HISTORY_BLOCKS, &[REWARD_PERCENTILE])
            .await?;

        let samples: Vec<u128> = history
            .rewards
            .iter()
            .filter_map(|row| row.first().copied())
            .collect();

        let average = if samples.is_empty() {
            0
        } else {
            samples.iter().sum::<u128>() / samples.len() as u128
        };

        let floored = average.max(MIN_PRIORITY_FEE_WEI);
        let priority = buffered(floored, options.fee_buffer_pct);
        let buffered_base = buffered(base_fee, options.fee_buffer_pct);

        // 2x absorbs up to one base-fee doubling in the next block
        Ok((2 * buffered_base + priority, priority))
    }

    /// Legacy and surcharge-market pricing off the single quoted price.
    async fn gas_price_fees(&self, options: &EstimateOptions) -> Result<(u128, u128), FeeError> {
        let gas_price = self.client.gas_price().await?;
        let max_fee = buffered(gas_price, options.fee_buffer_pct);
        let priority = gas_price / 10;
        Ok((max_fee, priority))
    }
}

/// Integer percentage buffer; no floating point on wei values.
fn buffered(value: u128, pct: u64) -> u128 {
    value * (100 + pct as u128) / 100
}

/// Wei to a decimal gwei string.
pub fn format_gwei(wei: u128) -> String {
    scaled_string(wei, 9)
}

/// Wei to a decimal native-unit string.
pub fn format_native(wei: u128) -> String {
    scaled_string(wei, 18)
}

fn scaled_string(wei: u128, scale: u32) -> String {
    let Some(mut value) = Decimal::from_u128(wei) else {
        return wei.to_string();
    };
    if value.set_scale(scale).is_err() {
        return wei.to_string();
    }
    value.normalize().to_string()
}
