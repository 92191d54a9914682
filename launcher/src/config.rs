//! Launcher settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::probe::ProbePolicy;

#[derive(Clone, Debug)]
pub struct LauncherConfig {
    /// Node executable; falls back to the family default when `None`.
    pub node_binary: Option<PathBuf>,
    /// Half-open range instance ports are drawn from.
    pub port_low: u16,
    pub port_high: u16,
    pub probe: ProbePolicy,
    /// Budget for the Starknet devnet to print its account banner.
    pub banner_timeout: Duration,
    /// Ether pre-funded to each EVM account.
    pub evm_balance: u64,
    /// Canonical RPC port of the shared Solana validator.
    pub solana_rpc_port: u16,
    /// Where ledgers, the validator record and its lock live.
    pub data_dir: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            node_binary: None,
            port_low: 30000,
            port_high: 60000,
            probe: ProbePolicy::default(),
            banner_timeout: Duration::from_secs(60),
            evm_balance: 5000,
            solana_rpc_port: 3001,
            data_dir: PathBuf::from("/tmp/sandbox"),
        }
    }
}
