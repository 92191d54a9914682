//! Node liveness polling.
//!
//! A freshly spawned node is polled with a cheap read-only JSON-RPC call at
//! a fixed interval until it answers or the attempt ceiling is reached.
//! When the child handle is available, an early exit aborts the wait.

use serde_json::Value;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

use crate::rpc_client::JsonRpcClient;

#[derive(Clone, Copy, Debug)]
pub struct ProbePolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 300,
        }
    }
}

/// Outcome of a failed wait.
#[derive(Debug)]
pub enum ProbeFailure {
    Exited(ExitStatus),
    Exhausted { attempts: u32 },
}

/// A read-only call that succeeds once the node serves requests.
pub struct LivenessProbe {
    client: JsonRpcClient,
    method: &'static str,
    params: Value,
}

impl LivenessProbe {
    pub fn new(url: impl Into<String>, method: &'static str, params: Value) -> Self {
        Self {
            client: JsonRpcClient::with_timeout(url, Duration::from_secs(5)),
            method,
            params,
        }
    }

    /// `web3_clientVersion`, the call web3 clients use to test connectivity.
    pub fn evm(url: impl Into<String>) -> Self {
        Self::new(url, "web3_clientVersion", Value::Array(vec![]))
    }

    /// Fetch the latest block.
    pub fn starknet(url: impl Into<String>) -> Self {
        Self::new(
            url,
            "starknet_getBlockWithTxHashes",
            serde_json::json!({ "block_id": "latest" }),
        )
    }

    /// Fetch the cluster version.
    pub fn solana(url: impl Into<String>) -> Self {
        Self::new(url, "getVersion", Value::Array(vec![]))
    }

    pub async fn check(&self) -> bool {
        match self.client.call(self.method, self.params.clone()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = self.client.url(), method = self.method, "probe failed: {e}");
                false
            }
        }
    }

    /// Poll until live. Returns the number of attempts used.
    pub async fn wait_until_live(
        &self,
        policy: &ProbePolicy,
        mut child: Option<&mut Child>,
    ) -> Result<u32, ProbeFailure> {
        for attempt in 1..=policy.max_attempts {
            if let Some(child) = child.as_deref_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(ProbeFailure::Exited(status));
                }
            }
            if self.check().await {
                return Ok(attempt);
            }
            tokio::time::sleep(policy.interval).await;
        }
        Err(ProbeFailure::Exhausted {
            attempts: policy.max_attempts,
        })
    }
}
