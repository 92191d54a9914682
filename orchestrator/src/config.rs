//! Sandbox configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sandbox_launcher::{LauncherConfig, ProbePolicy};
use sandbox_types::BackendKind;
use sandbox_utils::LogFormat;

use crate::OrchestratorError;

/// Configuration for one sandbox gateway.
///
/// Can be loaded from a TOML file via [`SandboxConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Chain family served by this gateway.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Root of the registry, claims, validator record and ledgers.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Gateway HTTP port.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Seconds an instance lives before the reaper tears it down.
    #[serde(default = "default_instance_ttl_secs")]
    pub instance_ttl_secs: u64,

    /// Lower bound (inclusive) of the per-instance port range.
    #[serde(default = "default_port_low")]
    pub port_low: u16,

    /// Upper bound (exclusive) of the per-instance port range.
    #[serde(default = "default_port_high")]
    pub port_high: u16,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    #[serde(default = "default_probe_max_attempts")]
    pub probe_max_attempts: u32,

    /// Seconds to wait for the Starknet devnet account banner.
    #[serde(default = "default_banner_timeout_secs")]
    pub banner_timeout_secs: u64,

    /// Canonical port of the shared Solana validator.
    #[serde(default = "default_solana_rpc_port")]
    pub solana_rpc_port: u16,

    /// Node executable; the family default when unset.
    #[serde(default)]
    pub node_binary: Option<PathBuf>,

    /// Ether pre-funded to each EVM account.
    #[serde(default = "default_evm_balance")]
    pub evm_balance: u64,

    /// Program that deploys the challenge onto a fresh instance.
    #[serde(default)]
    pub deploy_command: Option<PathBuf>,

    /// Program that decides whether an instance is solved.
    #[serde(default)]
    pub solved_command: Option<PathBuf>,

    /// Token released to teams that solved their instance.
    #[serde(default = "default_flag")]
    pub flag: String,

    /// Dev mode: accept requests without a ticket.
    #[serde(default)]
    pub disable_ticket: bool,

    /// Tear down every instance and the shared validator on exit.
    #[serde(default = "default_true")]
    pub reap_on_shutdown: bool,

    /// Requests each gateway route accepts per minute; 0 disables limiting.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_backend() -> BackendKind {
    BackendKind::Evm
}

fn default_rate_limit_per_minute() -> u64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/tmp/sandbox")
}

fn default_listen_port() -> u16 {
    8545
}

fn default_instance_ttl_secs() -> u64 {
    30 * 60
}

fn default_port_low() -> u16 {
    30000
}

fn default_port_high() -> u16 {
    60000
}

fn default_probe_interval_ms() -> u64 {
    100
}

fn default_probe_max_attempts() -> u32 {
    300
}

fn default_banner_timeout_secs() -> u64 {
    60
}

fn default_solana_rpc_port() -> u16 {
    3001
}

fn default_evm_balance() -> u64 {
    5000
}

fn default_flag() -> String {
    "PCTF{placeholder}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SandboxConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OrchestratorError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, OrchestratorError> {
        let config: Self = toml::from_str(s).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, OrchestratorError> {
        toml::to_string_pretty(self).map_err(|e| OrchestratorError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.port_high <= self.port_low {
            return Err(OrchestratorError::Config(format!(
                "empty port range {}..{}",
                self.port_low, self.port_high
            )));
        }
        if self.instance_ttl_secs == 0 {
            return Err(OrchestratorError::Config("instance_ttl_secs must be positive".into()));
        }
        if self.probe_max_attempts == 0 {
            return Err(OrchestratorError::Config("probe_max_attempts must be positive".into()));
        }
        Ok(())
    }

    pub fn instance_ttl(&self) -> Duration {
        Duration::from_secs(self.instance_ttl_secs)
    }

    /// Directory holding the instance indexes and claims.
    pub fn registry_dir(&self) -> PathBuf {
        self.data_dir.join("registry")
    }

    pub fn launcher_config(&self) -> LauncherConfig {
        LauncherConfig {
            node_binary: self.node_binary.clone(),
            port_low: self.port_low,
            port_high: self.port_high,
            probe: ProbePolicy {
                interval: Duration::from_millis(self.probe_interval_ms),
                max_attempts: self.probe_max_attempts,
            },
            banner_timeout: Duration::from_secs(self.banner_timeout_secs),
            evm_balance: self.evm_balance,
            solana_rpc_port: self.solana_rpc_port,
            data_dir: self.data_dir.clone(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            listen_port: default_listen_port(),
            instance_ttl_secs: default_instance_ttl_secs(),
            port_low: default_port_low(),
            port_high: default_port_high(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_max_attempts: default_probe_max_attempts(),
            banner_timeout_secs: default_banner_timeout_secs(),
            solana_rpc_port: default_solana_rpc_port(),
            node_binary: None,
            evm_balance: default_evm_balance(),
            deploy_command: None,
            solved_command: None,
            flag: default_flag(),
            disable_ticket: false,
            reap_on_shutdown: default_true(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            log_format: LogFormat::Human,
            log_level: default_log_level(),
        }
    }
}
