//! Backend family identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// The chain technology a sandbox instance runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Anvil-style EVM devnode, one process per team.
    Evm,
    /// Starknet devnet, one process per team.
    Starknet,
    /// Solana test validator shared by every team.
    Solana,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Evm, Self::Starknet, Self::Solana];

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Starknet => "starknet",
            Self::Solana => "solana",
        }
    }

    /// Number of accounts minted per instance.
    ///
    /// EVM and Starknet mint a deployer and a player; Solana also mints a
    /// context account for the deployed program's state.
    pub fn account_arity(&self) -> usize {
        match self {
            Self::Evm | Self::Starknet => 2,
            Self::Solana => 3,
        }
    }

    /// Node executable spawned when no override is configured.
    pub fn default_binary(&self) -> &'static str {
        match self {
            Self::Evm => "anvil",
            Self::Starknet => "starknet-devnet",
            Self::Solana => "solana-test-validator",
        }
    }

    /// Whether all instances of this family share a single node process.
    pub fn uses_shared_validator(&self) -> bool {
        matches!(self, Self::Solana)
    }

    /// Position of the deploying account in the minted layout.
    pub fn deployer_index(&self) -> usize {
        match self {
            // devnet emits the player first
            Self::Starknet => 1,
            Self::Evm | Self::Solana => 0,
        }
    }

    /// Position of the account handed to the player.
    pub fn player_index(&self) -> usize {
        match self {
            Self::Starknet => 0,
            Self::Evm | Self::Solana => 1,
        }
    }

    /// Position of the program state account, Solana only.
    pub fn context_index(&self) -> Option<usize> {
        match self {
            Self::Solana => Some(2),
            Self::Evm | Self::Starknet => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "evm" | "eth" => Ok(Self::Evm),
            "starknet" | "cairo" => Ok(Self::Starknet),
            "solana" => Ok(Self::Solana),
            other => Err(TypesError::UnknownBackend(other.to_string())),
        }
    }
}
