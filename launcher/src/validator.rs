//! Shared validator provider.
//!
//! The Solana family runs one `solana-test-validator` for every team: it is
//! slow to start and only one can bind the canonical port. The first launch
//! on a machine starts it under an exclusive file lock, persists its pid and
//! authority keypair, and holds the lock until the validator answers. Every
//! later launch, in this process or another, reads the persisted record
//! without locking.
//!
//! A persisted pid that no longer names a live process (machine reboot,
//! validator crash) is treated as absent and the validator is started again.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::RwLock;

use sandbox_crypto::SolanaKeypair;
use sandbox_store::{FileLock, PersistentStore};
use sandbox_types::{BackendKind, InstanceId, SharedValidatorState};

use crate::probe::{LivenessProbe, ProbePolicy};
use crate::process::{process_alive, ProcessSignaler, SigtermSignaler};
use crate::LaunchError;

const STATE_KEY: &str = "solana_state";
pub const STATE_FILE: &str = "validator.json";
pub const LOCK_FILE: &str = "validator.lock";

/// Starts and observes the validator process.
#[async_trait]
pub trait ValidatorBackend: Send + Sync {
    /// Spawn the validator with `mint` as its genesis authority. Returns its pid.
    async fn spawn(&self, rpc_port: u16, mint: &str) -> Result<u32, LaunchError>;

    /// Whether the validator at `rpc_port` serves requests.
    async fn is_live(&self, rpc_port: u16) -> bool;

    /// Whether `pid` is still running.
    fn is_running(&self, pid: u32) -> bool {
        process_alive(pid)
    }

    /// Stop a validator that never became usable.
    fn stop(&self, pid: u32) -> io::Result<bool> {
        SigtermSignaler.terminate(pid)
    }
}

/// The real `solana-test-validator` binary.
pub struct TestValidatorBackend {
    binary: PathBuf,
    ledger_root: PathBuf,
}

impl TestValidatorBackend {
    pub fn new(binary: Option<PathBuf>, ledger_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| BackendKind::Solana.default_binary().into()),
            ledger_root: ledger_root.into(),
        }
    }
}

#[async_trait]
impl ValidatorBackend for TestValidatorBackend {
    async fn spawn(&self, rpc_port: u16, mint: &str) -> Result<u32, LaunchError> {
        let ledger = self.ledger_root.join(format!("ledger-{}", InstanceId::random()));
        let child = Command::new(&self.binary)
            .arg("--rpc-port")
            .arg(rpc_port.to_string())
            .arg("--ledger")
            .arg(&ledger)
            .arg("--mint")
            .arg(mint)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                backend: BackendKind::Solana,
                reason: e.to_string(),
            })?;
        child.id().ok_or_else(|| LaunchError::Spawn {
            backend: BackendKind::Solana,
            reason: "process exited immediately".into(),
        })
    }

    async fn is_live(&self, rpc_port: u16) -> bool {
        LivenessProbe::solana(format!("http://127.0.0.1:{rpc_port}"))
            .check()
            .await
    }
}

pub struct SharedValidator {
    backend: Box<dyn ValidatorBackend>,
    store: PersistentStore,
    lock_path: PathBuf,
    rpc_port: u16,
    probe: ProbePolicy,
    cached: RwLock<Option<SharedValidatorState>>,
}

impl SharedValidator {
    pub fn new(
        backend: Box<dyn ValidatorBackend>,
        state_dir: impl Into<PathBuf>,
        rpc_port: u16,
        probe: ProbePolicy,
    ) -> Self {
        let state_dir = state_dir.into();
        Self {
            backend,
            store: PersistentStore::new(state_dir.join(STATE_FILE)),
            lock_path: state_dir.join(LOCK_FILE),
            rpc_port,
            probe,
            cached: RwLock::new(None),
        }
    }

    fn persisted_live_state(&self) -> Option<SharedValidatorState> {
        self.store
            .get::<SharedValidatorState>(STATE_KEY)
            .filter(|s| self.backend.is_running(s.process_id))
    }

    /// Return the running validator, starting it if this is the first use on
    /// the machine. Idempotent; at most one caller spawns.
    pub async fn ensure_initialized(&self) -> Result<SharedValidatorState, LaunchError> {
        if let Some(state) = self.cached.read().await.as_ref() {
            if self.backend.is_running(state.process_id) {
                return Ok(state.clone());
            }
        }
        if let Some(state) = self.persisted_live_state() {
            *self.cached.write().await = Some(state.clone());
            return Ok(state);
        }

        let lock_path = self.lock_path.clone();
        let _lock = tokio::task::spawn_blocking(move || FileLock::acquire(lock_path))
            .await
            .map_err(|e| LaunchError::Other(format!("lock task failed: {e}")))??;

        // another worker may have finished while we waited
        if let Some(state) = self.persisted_live_state() {
            *self.cached.write().await = Some(state.clone());
            return Ok(state);
        }

        let authority = SolanaKeypair::generate()?;
        tracing::info!(rpc_port = self.rpc_port, "starting shared solana validator");
        let pid = self.backend.spawn(self.rpc_port, &authority.pubkey()).await?;
        let state = SharedValidatorState {
            process_id: pid,
            keypair: authority.to_base58(),
            rpc_port: self.rpc_port,
        };
        self.store.set(STATE_KEY, &state)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            if self.backend.is_live(self.rpc_port).await {
                break;
            }
            if !self.backend.is_running(pid) {
                self.store.remove(STATE_KEY)?;
                return Err(LaunchError::ExitedEarly {
                    backend: BackendKind::Solana,
                    status: format!("validator pid {pid} is gone"),
                });
            }
            if attempts >= self.probe.max_attempts {
                // a stray validator would keep the port and fail every retry
                match self.backend.stop(pid) {
                    Ok(_) => tracing::warn!(pid, attempts, "validator never answered, stopped it"),
                    Err(e) => tracing::warn!(pid, "failed to stop unresponsive validator: {e}"),
                }
                self.store.remove(STATE_KEY)?;
                return Err(LaunchError::NotLive {
                    backend: BackendKind::Solana,
                    attempts,
                });
            }
            tokio::time::sleep(self.probe.interval).await;
        }
        tracing::info!(pid, attempts, "shared solana validator is ready");

        *self.cached.write().await = Some(state.clone());
        Ok(state)
    }

    /// The persisted handle, if any, without initialising.
    pub fn current(&self) -> Option<SharedValidatorState> {
        self.store.get(STATE_KEY)
    }

    /// Stop the validator and forget it. Used only at orchestrator shutdown,
    /// since every team's instance depends on it.
    pub async fn shutdown(&self, signaler: &dyn ProcessSignaler) -> Result<(), LaunchError> {
        let lock_path = self.lock_path.clone();
        let _lock = tokio::task::spawn_blocking(move || FileLock::acquire(lock_path))
            .await
            .map_err(|e| LaunchError::Other(format!("lock task failed: {e}")))??;

        if let Some(state) = self.store.get::<SharedValidatorState>(STATE_KEY) {
            match signaler.terminate(state.process_id) {
                Ok(_) => tracing::info!(pid = state.process_id, "shared validator stopped"),
                Err(e) => tracing::warn!(pid = state.process_id, "failed to stop validator: {e}"),
            }
            self.store.remove(STATE_KEY)?;
        }
        *self.cached.write().await = None;
        Ok(())
    }
}
