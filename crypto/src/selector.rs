//! Function selectors used by the read-only solved checks.

use alloy_primitives::keccak256;

/// First four bytes of `keccak256(signature)`, e.g. `isSolved()`.
pub fn evm_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Starknet entry point selector: `keccak256(name)` truncated to 250 bits,
/// rendered as a `0x`-prefixed felt without leading zeros.
pub fn starknet_selector(name: &str) -> String {
    let mut hash = keccak256(name.as_bytes()).0;
    hash[0] &= 0x03;
    let encoded = hex::encode(hash);
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}
