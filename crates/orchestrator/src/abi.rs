//! Minimal calldata encoding for the two calls the engine submits.
//!
//! Arguments are the standard 32-byte big-endian words; nothing here
//! needs dynamic types.

use pension_engine_chain::Address;

/// `approve(address,uint256)`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// `createPlan(uint256,uint256,uint256,uint256)` on the fund contract:
/// deposit, monthly deposit, rate in bps, timelock in years
pub const CREATE_PLAN_SELECTOR: [u8; 4] = [0x8f, 0x1e, 0x94, 0x47];

fn push_word_u128(out: &mut Vec<u8>, value: u128) {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    out.extend_from_slice(&word);
}

fn push_word_address(out: &mut Vec<u8>, address: &Address) {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.to_bytes());
    out.extend_from_slice(&word);
}

/// ERC-20 approval granting `spender` exactly `amount`.
pub fn encode_approve(spender: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&APPROVE_SELECTOR);
    push_word_address(&mut data, spender);
    push_word_u128(&mut data, amount);
    data
}

/// Plan-creation call; the contract pulls the approved deposit itself.
pub fn encode_create_plan(
    deposit_base_units: u128,
    monthly_base_units: u128,
    rate_bps: u32,
    timelock_years: u32,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 128);
    data.extend_from_slice(&CREATE_PLAN_SELECTOR);
    push_word_u128(&mut data, deposit_base_units);
    push_word_u128(&mut data, monthly_base_units);
    push_word_u128(&mut data, rate_bps as u128);
    push_word_u128(&mut data, timelock_years as u128);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tail: u8) -> Address {
        Address::parse(&format!("0x{:040x}", tail)).unwrap()
    }

    #[test]
    fn test_approve_layout() {
        let data = encode_approve(&addr(0xee), 1_155_000_000);

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &APPROVE_SELECTOR);
        // address word: 12 zero bytes then the 20-byte address
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert_eq!(data[35], 0xee);
        // amount word, big-endian
        assert_eq!(&data[52..68], &1_155_000_000u128.to_be_bytes());
    }

    #[test]
    fn test_create_plan_layout() {
        let data = encode_create_plan(1_100_000_000, 100_000_000, 500, 15);

        assert_eq!(data.len(), 4 + 128);
        assert_eq!(&data[..4], &CREATE_PLAN_SELECTOR);
        assert_eq!(&data[20..36], &1_100_000_000u128.to_be_bytes());
        assert_eq!(&data[52..68], &100_000_000u128.to_be_bytes());
        assert_eq!(&data[84..100], &500u128.to_be_bytes());
        assert_eq!(&data[116..132], &15u128.to_be_bytes());
    }

    #[test]
    fn test_zero_amount_encodes_to_zero_word() {
        let data = encode_approve(&addr(1), 0);
        assert!(data[36..68].iter().all(|b| *b == 0));
    }
}
