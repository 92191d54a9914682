//! EVM family launcher (anvil).

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use sandbox_crypto::{derive_evm_accounts, generate_mnemonic};
use sandbox_types::{BackendKind, InstanceId, NodeInfo, TeamId};

use crate::probe::{LivenessProbe, ProbeFailure};
use crate::process::pick_free_port;
use crate::{BackendLauncher, LaunchError, LauncherConfig};

const ACCOUNTS: u32 = 2;

/// One anvil process per team, pre-funding a deployer and a player derived
/// from a fresh seed phrase.
pub struct EvmLauncher {
    config: LauncherConfig,
}

impl EvmLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    fn command(&self, mnemonic: &str, port: u16) -> Command {
        let binary = self
            .config
            .node_binary
            .clone()
            .unwrap_or_else(|| BackendKind::Evm.default_binary().into());
        let mut command = Command::new(binary);
        command
            .arg("--accounts")
            .arg(ACCOUNTS.to_string())
            .arg("--balance")
            .arg(self.config.evm_balance.to_string())
            .arg("--mnemonic")
            .arg(mnemonic)
            .arg("--port")
            .arg(port.to_string())
            .arg("--block-base-fee-per-gas")
            .arg("0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

#[async_trait]
impl BackendLauncher for EvmLauncher {
    fn backend(&self) -> BackendKind {
        BackendKind::Evm
    }

    async fn launch(&self, team: &TeamId) -> Result<NodeInfo, LaunchError> {
        let backend = BackendKind::Evm;
        let port = pick_free_port(backend, self.config.port_low, self.config.port_high)?;
        let mnemonic = generate_mnemonic()?;
        let accounts = derive_evm_accounts(&mnemonic, ACCOUNTS)?;

        let mut child = self
            .command(&mnemonic, port)
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                backend,
                reason: e.to_string(),
            })?;
        let pid = child.id().ok_or_else(|| LaunchError::Spawn {
            backend,
            reason: "process exited immediately".into(),
        })?;
        tracing::info!(team = %team, port, pid, "anvil spawned");

        let probe = LivenessProbe::evm(format!("http://127.0.0.1:{port}"));
        match probe.wait_until_live(&self.config.probe, Some(&mut child)).await {
            Ok(attempts) => tracing::debug!(team = %team, attempts, "anvil live"),
            Err(ProbeFailure::Exited(status)) => {
                return Err(LaunchError::ExitedEarly {
                    backend,
                    status: status.to_string(),
                })
            }
            Err(ProbeFailure::Exhausted { attempts }) => {
                let _ = child.start_kill();
                return Err(LaunchError::NotLive { backend, attempts });
            }
        }

        Ok(NodeInfo {
            backend,
            port,
            accounts,
            process_id: pid,
            uuid: InstanceId::random(),
            team_id: team.clone(),
            seed: Some(mnemonic),
            contract_addr: None,
        })
    }
}
