//! Gateway shutdown: why the daemon is stopping and what happens to the
//! instances it leaves behind.
//!
//! The reason is held in a `watch` channel, so a subsystem that starts
//! waiting after the trigger still sees it. Once the gateway has stopped
//! accepting requests, [`ShutdownController::drain`] either reaps every
//! registered instance or leaves them for the next daemon to re-arm.

use std::fmt;
use std::future::Future;

use tokio::signal;
use tokio::sync::watch;

use crate::{Orchestrator, OrchestratorError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Requested => "requested",
        })
    }
}

/// What happens to registered instances once the gateway is down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstancePolicy {
    /// Terminate every instance and the family's shared resources.
    Reap,
    /// Leave nodes running; a restarted daemon re-arms their TTL.
    Keep,
}

impl InstancePolicy {
    pub fn from_reap_flag(reap: bool) -> Self {
        if reap {
            Self::Reap
        } else {
            Self::Keep
        }
    }
}

pub struct ShutdownController {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Record `reason`. Only the first trigger counts.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Resolves with the reason once shutdown is triggered, including when
    /// it was triggered before this call.
    pub fn stopped(&self) -> impl Future<Output = ShutdownReason> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            match rx.wait_for(Option::is_some).await {
                Ok(reason) => (*reason).unwrap_or(ShutdownReason::Requested),
                // controller dropped without a trigger
                Err(_) => ShutdownReason::Requested,
            }
        }
    }

    /// Wait for SIGTERM or SIGINT and trigger with the matching reason.
    pub async fn listen_for_signals(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = ctrl_c => ShutdownReason::Interrupt,
            _ = terminate => ShutdownReason::Terminate,
        };
        tracing::info!(%reason, "shutting down gateway");
        self.trigger(reason);
    }

    /// Settle the instances after the gateway stopped serving. Returns how
    /// many were reaped.
    pub async fn drain(&self, orchestrator: &Orchestrator, policy: InstancePolicy) -> Result<usize, OrchestratorError> {
        let reason = self.reason().unwrap_or(ShutdownReason::Requested);
        match policy {
            InstancePolicy::Reap => {
                let reaped = orchestrator.shutdown_all().await?;
                tracing::info!(%reason, reaped, "reaped instances on shutdown");
                Ok(reaped)
            }
            InstancePolicy::Keep => {
                orchestrator.scheduler().cancel_all();
                tracing::info!(%reason, "leaving instances running");
                Ok(0)
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
