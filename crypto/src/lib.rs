//! Account minting primitives for sandbox instances.
//!
//! - **EVM**: BIP39 seed phrases and BIP44 (`m/44'/60'/0'/0/i`) secp256k1 accounts
//! - **Solana**: Ed25519 keypairs in the base58 / JSON keyfile encodings the CLI uses
//! - **Selectors**: EVM 4-byte selectors and Starknet entry point selectors

pub mod error;
pub mod evm;
pub mod mnemonic;
pub mod random;
pub mod selector;
pub mod solana;

pub use error::CryptoError;
pub use evm::{derive_evm_account, derive_evm_accounts};
pub use mnemonic::{generate_mnemonic, validate_mnemonic};
pub use random::random_bytes;
pub use selector::{evm_selector, starknet_selector};
pub use solana::SolanaKeypair;
