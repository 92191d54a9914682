//! A single minted chain account.

use serde::{Deserialize, Serialize};

/// One account minted for an instance.
///
/// The encoding of each field is backend specific: hex for EVM and
/// Starknet, base58 for Solana (where `private_key` is the 64-byte keypair).
/// Accounts are never shared between instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    pub private_key: String,
    pub public_key: String,
}

impl AccountInfo {
    pub fn new(
        address: impl Into<String>,
        private_key: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }
}
