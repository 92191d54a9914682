//! Launched node records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{AccountInfo, BackendKind, TeamId, TypesError};

/// Globally unique identifier of one launched instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Generate a fresh random (v4) identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for InstanceId {
    type Err = TypesError;

    /// Only the canonical hyphenated form is accepted, matching the paths
    /// handed out to players.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 36 {
            return Err(TypesError::InvalidInstanceId(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypesError::InvalidInstanceId(s.to_string()))
    }
}

/// A launched node, its minted accounts and (once deployed) the address of
/// the challenge artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub backend: BackendKind,
    pub port: u16,
    pub accounts: Vec<AccountInfo>,
    /// Owning OS process. For the shared validator family this is the
    /// validator's pid, common to every instance.
    pub process_id: u32,
    pub uuid: InstanceId,
    pub team_id: TeamId,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub contract_addr: Option<String>,
}

impl NodeInfo {
    /// Local JSON-RPC endpoint of the node.
    pub fn rpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Record the deployed artifact address. Only the first call succeeds.
    pub fn attach_contract(&mut self, addr: impl Into<String>) -> Result<(), TypesError> {
        if self.contract_addr.is_some() {
            return Err(TypesError::ContractAlreadyAttached {
                uuid: self.uuid.to_string(),
            });
        }
        self.contract_addr = Some(addr.into());
        Ok(())
    }

    /// Whether the account layout matches the family's fixed arity.
    pub fn has_expected_accounts(&self) -> bool {
        self.accounts.len() == self.backend.account_arity()
    }

    /// The account handed to the player.
    pub fn player(&self) -> Option<&AccountInfo> {
        self.accounts.get(self.backend.player_index())
    }

    /// The account that deploys the challenge artifact.
    pub fn deployer(&self) -> Option<&AccountInfo> {
        self.accounts.get(self.backend.deployer_index())
    }

    /// The Solana context account holding program state.
    pub fn context(&self) -> Option<&AccountInfo> {
        self.backend.context_index().and_then(|i| self.accounts.get(i))
    }
}
