//! Solana family launcher (shared solana-test-validator).

use async_trait::async_trait;

use sandbox_crypto::SolanaKeypair;
use sandbox_types::{BackendKind, InstanceId, NodeInfo, TeamId};

use crate::process::ProcessSignaler;
use crate::validator::{SharedValidator, TestValidatorBackend, ValidatorBackend};
use crate::{BackendLauncher, LaunchError, LauncherConfig};

/// Every team shares one validator; an instance is a fresh trio of
/// system, player and context keypairs on it.
pub struct SolanaLauncher {
    validator: SharedValidator,
}

impl SolanaLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        let backend = TestValidatorBackend::new(config.node_binary.clone(), &config.data_dir);
        Self::with_backend(config, Box::new(backend))
    }

    pub fn with_backend(config: LauncherConfig, backend: Box<dyn ValidatorBackend>) -> Self {
        Self {
            validator: SharedValidator::new(
                backend,
                &config.data_dir,
                config.solana_rpc_port,
                config.probe,
            ),
        }
    }

    pub fn validator(&self) -> &SharedValidator {
        &self.validator
    }
}

#[async_trait]
impl BackendLauncher for SolanaLauncher {
    fn backend(&self) -> BackendKind {
        BackendKind::Solana
    }

    async fn launch(&self, team: &TeamId) -> Result<NodeInfo, LaunchError> {
        let state = self.validator.ensure_initialized().await?;

        let accounts = (0..BackendKind::Solana.account_arity())
            .map(|_| SolanaKeypair::generate().map(|kp| kp.to_account_info()))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(team = %team, pid = state.process_id, "minted solana instance keypairs");

        Ok(NodeInfo {
            backend: BackendKind::Solana,
            port: state.rpc_port,
            accounts,
            process_id: state.process_id,
            uuid: InstanceId::random(),
            team_id: team.clone(),
            seed: None,
            contract_addr: None,
        })
    }

    async fn funder(&self) -> Result<Option<String>, LaunchError> {
        Ok(Some(self.validator.ensure_initialized().await?.keypair))
    }

    async fn shutdown(&self, signaler: &dyn ProcessSignaler) -> Result<(), LaunchError> {
        self.validator.shutdown(signaler).await
    }

    fn owns_process(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::probe::ProbePolicy;

    #[derive(Default)]
    struct CountingBackend {
        spawns: AtomicU32,
    }

    #[async_trait]
    impl ValidatorBackend for Arc<CountingBackend> {
        async fn spawn(&self, _rpc_port: u16, _mint: &str) -> Result<u32, LaunchError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(7_000 + self.spawns.fetch_add(1, Ordering::SeqCst))
        }

        async fn is_live(&self, _rpc_port: u16) -> bool {
            true
        }

        fn is_running(&self, pid: u32) -> bool {
            pid >= 7_000
        }
    }

    fn launcher(dir: &std::path::Path, backend: Arc<CountingBackend>) -> SolanaLauncher {
        let config = LauncherConfig {
            data_dir: dir.to_path_buf(),
            probe: ProbePolicy {
                interval: Duration::from_millis(1),
                max_attempts: 3,
            },
            ..LauncherConfig::default()
        };
        SolanaLauncher::with_backend(config, Box::new(backend))
    }

    #[tokio::test]
    async fn concurrent_cold_launches_share_one_validator() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(CountingBackend::default());
        let a = launcher(dir.path(), backend.clone());
        let b = launcher(dir.path(), backend.clone());
        let team_a = TeamId::new("alpha").unwrap();
        let team_b = TeamId::new("beta").unwrap();

        let (na, nb) = tokio::join!(a.launch(&team_a), b.launch(&team_b));
        let (na, nb) = (na.unwrap(), nb.unwrap());

        assert_eq!(backend.spawns.load(Ordering::SeqCst), 1);
        assert_eq!(na.process_id, nb.process_id);
        assert_eq!(na.port, 3001);
        assert_eq!(nb.port, 3001);
        assert_ne!(na.uuid, nb.uuid);
    }

    #[tokio::test]
    async fn instance_gets_three_distinct_keypairs() {
        let dir = tempfile::tempdir().unwrap();
        let node = launcher(dir.path(), Arc::new(CountingBackend::default()))
            .launch(&TeamId::new("gamma").unwrap())
            .await
            .unwrap();

        assert!(node.has_expected_accounts());
        let player = node.player().unwrap();
        let deployer = node.deployer().unwrap();
        let context = node.context().unwrap();
        assert_ne!(player.address, deployer.address);
        assert_ne!(player.address, context.address);
        assert!(SolanaKeypair::from_base58(&player.private_key).is_ok());
        assert!(node.seed.is_none());
    }

    #[tokio::test]
    async fn funder_is_the_validator_authority() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), Arc::new(CountingBackend::default()));
        let funder = launcher.funder().await.unwrap().unwrap();
        assert_eq!(
            launcher.validator().current().unwrap().keypair,
            funder
        );
    }
}
