//! EVM account derivation from a seed phrase.
//!
//! Uses the standard Ethereum BIP44 path `m/44'/60'/0'/0/{index}`, the same
//! path anvil uses for its pre-funded accounts, so the derived keys control
//! the balances the node allocated at startup.

use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner};
use sandbox_types::AccountInfo;

use crate::CryptoError;

fn signer_at(mnemonic: &str, index: u32) -> Result<PrivateKeySigner, CryptoError> {
    MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?
        .build()
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))
}

/// Derive the account at `index`.
///
/// The public key slot carries the checksummed address, which is how EVM
/// tooling identifies an account.
pub fn derive_evm_account(mnemonic: &str, index: u32) -> Result<AccountInfo, CryptoError> {
    let signer = signer_at(mnemonic, index)?;
    let address = signer.address().to_checksum(None);
    let private_key = format!("0x{}", hex::encode(signer.credential().to_bytes()));
    Ok(AccountInfo::new(address.clone(), private_key, address))
}

/// Derive the first `count` accounts.
pub fn derive_evm_accounts(mnemonic: &str, count: u32) -> Result<Vec<AccountInfo>, CryptoError> {
    (0..count).map(|i| derive_evm_account(mnemonic, i)).collect()
}
