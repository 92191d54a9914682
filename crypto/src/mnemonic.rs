//! BIP39 seed phrase generation.
//!
//! EVM instances are started with a fresh 12-word phrase (128-bit entropy);
//! the node derives its pre-funded accounts from it and the orchestrator
//! re-derives the same accounts to hand out credentials.

use bip39::Mnemonic;

use crate::{random_bytes, CryptoError};

/// Generate a new 12-word English BIP39 mnemonic.
pub fn generate_mnemonic() -> Result<String, CryptoError> {
    let entropy = random_bytes::<16>()?;
    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Validate that a phrase is a well-formed BIP39 mnemonic.
pub fn validate_mnemonic(mnemonic: &str) -> bool {
    Mnemonic::parse_normalized(mnemonic).is_ok()
}
