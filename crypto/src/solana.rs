//! Solana keypairs.
//!
//! A Solana keypair is an Ed25519 signing key. The CLI and SDKs exchange it
//! as the 64-byte `secret || public` concatenation, either base58 encoded
//! or as a JSON array of bytes (the keyfile format).

use ed25519_dalek::SigningKey;
use sandbox_types::AccountInfo;

use crate::{random_bytes, CryptoError};

pub struct SolanaKeypair {
    signing_key: SigningKey,
}

impl SolanaKeypair {
    /// Generate a keypair from the OS random source.
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = random_bytes::<32>()?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Parse the base58 encoding of the 64-byte keypair.
    pub fn from_base58(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::InvalidKeypair(e.to_string()))?;
        let bytes: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeypair(format!("expected 64 bytes, got {}", bytes.len())))?;
        let signing_key = SigningKey::from_keypair_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKeypair(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Base58 of the 64-byte keypair, as accepted by `Keypair.from_base58_string`.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.signing_key.to_keypair_bytes()).into_string()
    }

    /// Base58 public key, which is also the account address.
    pub fn pubkey(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
    }

    /// Keyfile contents understood by the Solana CLI (`--keypair <file>`).
    pub fn to_keyfile_json(&self) -> String {
        serde_json::Value::from(self.signing_key.to_keypair_bytes().to_vec()).to_string()
    }

    pub fn to_account_info(&self) -> AccountInfo {
        let pubkey = self.pubkey();
        AccountInfo::new(pubkey.clone(), self.to_base58(), pubkey)
    }
}
