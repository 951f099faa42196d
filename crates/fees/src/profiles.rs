use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const GWEI: u128 = 1_000_000_000;

/// Fee-market parameters for one network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainFeeProfile {
    pub name: String,

    /// The quoted gas price already embeds a data surcharge and the
    /// chain has no meaningful priority auction
    pub surcharge_market: bool,

    /// Used when gas estimation degrades
    pub default_gas_limit: u64,

    /// Lower clamp bound for max fee per gas, wei
    pub min_fee_per_gas: u128,

    /// Upper clamp bound for max fee per gas, wei
    pub max_fee_per_gas: u128,
}

/// Chain-id keyed profile table with a mandatory fallback.
#[derive(Clone, Debug)]
pub struct ProfileTable {
    profiles: HashMap<u64, ChainFeeProfile>,
    fallback: ChainFeeProfile,
}

impl ProfileTable {
    pub fn new() -> Self {
        let mut profiles = HashMap::new();

        // Ethereum mainnet
        profiles.insert(
            1,
            ChainFeeProfile {
                name: "ethereum".to_string(),
                surcharge_market: false,
                default_gas_limit: 450_000,
                min_fee_per_gas: GWEI / 10,
                max_fee_per_gas: 500 * GWEI,
            },
        );

        // Optimism
        profiles.insert(
            10,
            ChainFeeProfile {
                name: "optimism".to_string(),
                surcharge_market: true,
                default_gas_limit: 600_000,
                min_fee_per_gas: GWEI / 1_000,
                max_fee_per_gas: 10 * GWEI,
            },
        );

        // Polygon PoS
        profiles.insert(
            137,
            ChainFeeProfile {
                name: "polygon".to_string(),
                surcharge_market: false,
                default_gas_limit: 500_000,
                min_fee_per_gas: 25 * GWEI,
                max_fee_per_gas: 1_000 * GWEI,
            },
        );

        // Base
        profiles.insert(
            8453,
            ChainFeeProfile {
                name: "base".to_string(),
                surcharge_market: true,
                default_gas_limit: 600_000,
                min_fee_per_gas: GWEI / 1_000,
                max_fee_per_gas: 10 * GWEI,
            },
        );

        // Arbitrum One: fixed-ish price, no priority auction
        profiles.insert(
            42161,
            ChainFeeProfile {
                name: "arbitrum".to_string(),
                surcharge_market: true,
                default_gas_limit: 1_200_000,
                min_fee_per_gas: GWEI / 100,
                max_fee_per_gas: 20 * GWEI,
            },
        );

        Self {
            profiles,
            fallback: ChainFeeProfile {
                name: "fallback".to_string(),
                surcharge_market: false,
                default_gas_limit: 500_000,
                min_fee_per_gas: GWEI / 10,
                max_fee_per_gas: 300 * GWEI,
            },
        }
    }

    /// Profile for a chain id; unrecognized ids get the fallback,
    /// never an error.
    pub fn profile(&self, chain_id: u64) -> &ChainFeeProfile {
        self.profiles.get(&chain_id).unwrap_or(&self.fallback)
    }

    /// Override or add a profile.
    pub fn insert(&mut self, chain_id: u64, profile: ChainFeeProfile) {
        self.profiles.insert(chain_id, profile);
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chains_configured() {
        let table = ProfileTable::new();
        assert_eq!(table.profile(1).name, "ethereum");
        assert_eq!(table.profile(10).name, "optimism");
        assert_eq!(table.profile(8453).name, "base");
        assert!(table.profile(10).surcharge_market);
        assert!(!table.profile(1).surcharge_market);
    }

    #[test]
    fn test_unknown_chain_gets_fallback() {
        let table = ProfileTable::new();
        let profile = table.profile(999_999);
        assert_eq!(profile.name, "fallback");
        assert!(profile.default_gas_limit > 0);
    }

    #[test]
    fn test_profile_bounds_ordered() {
        let table = ProfileTable::new();
        for id in [1u64, 10, 137, 8453, 42161, 5555] {
            let p = table.profile(id);
            assert!(p.min_fee_per_gas < p.max_fee_per_gas, "{}", p.name);
        }
    }

    #[test]
    fn test_insert_override() {
        let mut table = ProfileTable::new();
        table.insert(
            1,
            ChainFeeProfile {
                name: "custom".to_string(),
                surcharge_market: true,
                default_gas_limit: 1,
                min_fee_per_gas: 1,
                max_fee_per_gas: 2,
            },
        );
        assert_eq!(table.profile(1).name, "custom");
    }
}
