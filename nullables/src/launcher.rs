//! Nullable launcher — instances without node processes.

use async_trait::async_trait;
use sandbox_launcher::{BackendLauncher, LaunchError, ProcessSignaler};
use sandbox_types::{AccountInfo, BackendKind, InstanceId, NodeInfo, TeamId};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// pid reported by every instance of a shared-validator family.
pub const SHARED_PID: u32 = 3001;
pub const NULL_FUNDER: &str = "null-funder-keypair";

/// Mints deterministic instances. Per-instance families get a fresh pid per
/// launch; shared-validator families all report [`SHARED_PID`].
pub struct NullLauncher {
    backend: BackendKind,
    next_pid: AtomicU32,
    next_port: AtomicU32,
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Duration,
}

impl NullLauncher {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            next_pid: AtomicU32::new(10_000),
            next_port: AtomicU32::new(40_000),
            launches: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Duration::ZERO,
        }
    }

    /// Make every launch take `delay`, widening race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every following launch with `reason` until [`Self::succeed`].
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(reason.into());
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Launch attempts so far, including failed ones.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendLauncher for NullLauncher {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn launch(&self, team: &TeamId) -> Result<NodeInfo, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(LaunchError::Other(reason));
        }

        let shared = self.backend.uses_shared_validator();
        let (process_id, port) = if shared {
            (SHARED_PID, 3001)
        } else {
            (
                self.next_pid.fetch_add(1, Ordering::SeqCst),
                self.next_port.fetch_add(1, Ordering::SeqCst) as u16,
            )
        };
        let uuid = InstanceId::random();
        let accounts = (0..self.backend.account_arity())
            .map(|i| {
                AccountInfo::new(
                    format!("addr-{uuid}-{i}"),
                    format!("key-{uuid}-{i}"),
                    format!("pub-{uuid}-{i}"),
                )
            })
            .collect();

        Ok(NodeInfo {
            backend: self.backend,
            port,
            accounts,
            process_id,
            uuid,
            team_id: team.clone(),
            seed: (!shared).then(|| format!("seed-{team}")),
            contract_addr: None,
        })
    }

    async fn funder(&self) -> Result<Option<String>, LaunchError> {
        Ok(self
            .backend
            .uses_shared_validator()
            .then(|| NULL_FUNDER.to_string()))
    }

    fn owns_process(&self) -> bool {
        !self.backend.uses_shared_validator()
    }

    async fn shutdown(&self, signaler: &dyn ProcessSignaler) -> Result<(), LaunchError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.backend.uses_shared_validator() {
            signaler.terminate(SHARED_PID)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn per_instance_family_gets_fresh_pids() {
        let launcher = NullLauncher::new(BackendKind::Evm);
        let team = TeamId::new("t").unwrap();
        let a = launcher.launch(&team).await.unwrap();
        let b = launcher.launch(&team).await.unwrap();
        assert_ne!(a.process_id, b.process_id);
        assert_ne!(a.uuid, b.uuid);
        assert!(a.has_expected_accounts());
    }

    #[tokio::test]
    async fn shared_family_reports_one_pid() {
        let launcher = NullLauncher::new(BackendKind::Solana);
        let a = launcher.launch(&TeamId::new("a").unwrap()).await.unwrap();
        let b = launcher.launch(&TeamId::new("b").unwrap()).await.unwrap();
        assert_eq!(a.process_id, SHARED_PID);
        assert_eq!(b.process_id, SHARED_PID);
        assert_eq!(a.accounts.len(), 3);
        assert!(!launcher.owns_process());
    }

    #[tokio::test]
    async fn failure_mode_is_sticky_until_cleared() {
        let launcher = NullLauncher::new(BackendKind::Starknet);
        let team = TeamId::new("t").unwrap();
        launcher.fail_with("devnet crashed");
        assert!(launcher.launch(&team).await.is_err());
        launcher.succeed();
        assert!(launcher.launch(&team).await.is_ok());
        assert_eq!(launcher.launches(), 2);
    }
}
