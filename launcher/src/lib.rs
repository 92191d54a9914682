//! Node launchers for the three sandbox families.
//!
//! - [`EvmLauncher`] — one `anvil` per team, accounts derived from a fresh mnemonic
//! - [`StarknetLauncher`] — one `starknet-devnet` per team, accounts scraped from its banner
//! - [`SolanaLauncher`] — a single shared `solana-test-validator`, fresh keypairs per team
//!
//! Every launcher returns a live node: the call only completes once the
//! node answers a read-only JSON-RPC probe.

pub mod banner;
pub mod config;
pub mod error;
pub mod evm;
pub mod probe;
pub mod process;
pub mod rpc_client;
pub mod solana;
pub mod starknet;
pub mod validator;

use async_trait::async_trait;
use std::sync::Arc;

use sandbox_types::{BackendKind, NodeInfo, TeamId};

pub use banner::{parse_banner, BannerError, BannerParser, DevnetBanner};
pub use config::LauncherConfig;
pub use error::LaunchError;
pub use evm::EvmLauncher;
pub use probe::{LivenessProbe, ProbeFailure, ProbePolicy};
pub use process::{pick_free_port, process_alive, ProcessSignaler, SigtermSignaler};
pub use rpc_client::{JsonRpcClient, RpcCallError};
pub use solana::SolanaLauncher;
pub use starknet::StarknetLauncher;
pub use validator::{SharedValidator, TestValidatorBackend, ValidatorBackend};

/// Starts nodes of one family.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Start (or attach to) a node for `team` and wait until it is live.
    async fn launch(&self, team: &TeamId) -> Result<NodeInfo, LaunchError>;

    /// Base58 keypair allowed to fund accounts on the node, for families
    /// whose accounts start empty.
    async fn funder(&self) -> Result<Option<String>, LaunchError> {
        Ok(None)
    }

    /// Whether each instance owns its `process_id` and must signal it on
    /// teardown. `false` for the shared validator.
    fn owns_process(&self) -> bool {
        true
    }

    /// Release family-wide resources at orchestrator shutdown.
    async fn shutdown(&self, _signaler: &dyn ProcessSignaler) -> Result<(), LaunchError> {
        Ok(())
    }
}

/// The launcher for `kind`.
pub fn build_launcher(kind: BackendKind, config: LauncherConfig) -> Arc<dyn BackendLauncher> {
    match kind {
        BackendKind::Evm => Arc::new(EvmLauncher::new(config)),
        BackendKind::Starknet => Arc::new(StarknetLauncher::new(config)),
        BackendKind::Solana => Arc::new(SolanaLauncher::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_matching_family() {
        for kind in BackendKind::ALL {
            let launcher = build_launcher(kind, LauncherConfig::default());
            assert_eq!(launcher.backend(), kind);
            assert_eq!(launcher.owns_process(), !kind.uses_shared_validator());
        }
    }
}
