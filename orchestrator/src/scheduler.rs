//! Instance teardown and the TTL reaper.
//!
//! An instance moves `Running -> Terminated` exactly once. Three triggers
//! lead into the single [`Reaper::teardown`] action: an explicit terminate,
//! TTL expiry and orchestrator shutdown. The registry's `remove` reports
//! whether this call deleted the record, and only that caller signals the
//! process, so racing triggers never tear down twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;

use sandbox_launcher::ProcessSignaler;
use sandbox_store::{InstanceRegistry, StoreError};
use sandbox_types::{InstanceId, NodeInfo};

use crate::OrchestratorError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownTrigger {
    Explicit,
    Ttl,
    Shutdown,
}

impl fmt::Display for TeardownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Ttl => "ttl",
            Self::Shutdown => "shutdown",
        })
    }
}

pub struct Reaper {
    registry: Arc<dyn InstanceRegistry>,
    signaler: Arc<dyn ProcessSignaler>,
    /// `false` when instances share one process that must outlive them.
    owns_process: bool,
}

impl Reaper {
    pub fn new(
        registry: Arc<dyn InstanceRegistry>,
        signaler: Arc<dyn ProcessSignaler>,
        owns_process: bool,
    ) -> Self {
        Self {
            registry,
            signaler,
            owns_process,
        }
    }

    /// Remove `node` and stop its process. Returns `false` when another
    /// trigger already tore it down.
    pub fn teardown(&self, node: &NodeInfo, trigger: TeardownTrigger) -> Result<bool, OrchestratorError> {
        if !self.registry.remove(node)? {
            tracing::debug!(uuid = %node.uuid, %trigger, "instance already torn down");
            return Ok(false);
        }
        self.stop_process(node);
        tracing::info!(
            team = %node.team_id,
            uuid = %node.uuid,
            backend = %node.backend,
            %trigger,
            "instance terminated"
        );
        Ok(true)
    }

    /// Signal the node's process without touching the registry.
    pub(crate) fn stop_process(&self, node: &NodeInfo) {
        if !self.owns_process {
            return;
        }
        match self.signaler.terminate(node.process_id) {
            Ok(true) => tracing::debug!(pid = node.process_id, "sent SIGTERM"),
            Ok(false) => tracing::debug!(pid = node.process_id, "process already gone"),
            Err(e) => tracing::warn!(pid = node.process_id, uuid = %node.uuid, "failed to stop node: {e}"),
        }
    }

    /// TTL expiry: tear down only if the instance still exists.
    pub fn expire(&self, uuid: &InstanceId) -> Result<bool, OrchestratorError> {
        if !self.registry.exists(uuid)? {
            return Ok(false);
        }
        let node = match self.registry.load(uuid) {
            Ok(node) => node,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        self.teardown(&node, TeardownTrigger::Ttl)
    }
}

/// Arms one timer per instance that reaps it after the TTL.
pub struct TerminationScheduler {
    reaper: Arc<Reaper>,
    ttl: Duration,
    timers: Arc<Mutex<HashMap<InstanceId, AbortHandle>>>,
}

impl TerminationScheduler {
    pub fn new(reaper: Arc<Reaper>, ttl: Duration) -> Self {
        Self {
            reaper,
            ttl,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start the countdown for `uuid`. Must be called within a tokio runtime.
    pub fn arm(&self, uuid: InstanceId) {
        let reaper = self.reaper.clone();
        let timers = self.timers.clone();
        let ttl = self.ttl;

        // held across spawn so the task cannot deregister before we insert
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&uuid);
            match reaper.expire(&uuid) {
                Ok(true) => tracing::info!(%uuid, "instance reached its TTL"),
                Ok(false) => tracing::debug!(%uuid, "TTL fired after teardown"),
                Err(e) => tracing::warn!(%uuid, "TTL teardown failed: {e}"),
            }
        });
        if let Some(previous) = guard.insert(uuid, handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Cancel the timer for `uuid`. Returns whether one was pending.
    pub fn disarm(&self, uuid: &InstanceId) -> bool {
        let handle = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uuid);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of pending timers.
    pub fn armed(&self) -> usize {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn cancel_all(&self) {
        let drained: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, h)| h)
            .collect();
        for handle in drained {
            handle.abort();
        }
    }
}

impl Drop for TerminationScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
