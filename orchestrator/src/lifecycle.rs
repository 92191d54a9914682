//! Instance lifecycle manager: launch, deploy, verify and terminate.
//!
//! The manager is backend-agnostic: all family quirks live behind
//! [`BackendLauncher`]. Everything it knows about running instances comes
//! from the [`InstanceRegistry`], so several gateway processes sharing one
//! data directory observe the same instances.

use std::sync::Arc;
use std::time::Duration;

use sandbox_launcher::{BackendLauncher, ProcessSignaler};
use sandbox_store::{InstanceRegistry, StoreError};
use sandbox_types::{BackendKind, InstanceId, NodeInfo, TeamId};

use crate::callbacks::{DeployContext, DeployHandler, SolvedContext, SolvedPredicate};
use crate::scheduler::{Reaper, TeardownTrigger, TerminationScheduler};
use crate::OrchestratorError;

/// Reservation of a team for one in-flight `start`, released on drop.
struct TeamClaim {
    registry: Arc<dyn InstanceRegistry>,
    team: TeamId,
}

impl TeamClaim {
    fn acquire(registry: &Arc<dyn InstanceRegistry>, team: &TeamId) -> Result<Option<Self>, StoreError> {
        Ok(registry.try_claim_team(team)?.then(|| Self {
            registry: registry.clone(),
            team: team.clone(),
        }))
    }
}

impl Drop for TeamClaim {
    fn drop(&mut self) {
        if let Err(e) = self.registry.release_team(&self.team) {
            tracing::warn!(team = %self.team, "failed to release launch reservation: {e}");
        }
    }
}

/// Everything the launch task needs, owned so it can outlive the request.
struct LaunchJob {
    launcher: Arc<dyn BackendLauncher>,
    registry: Arc<dyn InstanceRegistry>,
    reaper: Arc<Reaper>,
    scheduler: Arc<TerminationScheduler>,
    claim: TeamClaim,
}

impl LaunchJob {
    /// Spawn the node, register it and arm its TTL. Once the node exists it
    /// is either registered with a timer or stopped again.
    async fn run(self) -> Result<(NodeInfo, TeamClaim), OrchestratorError> {
        let team = &self.claim.team;
        let backend = self.launcher.backend();
        let node = self
            .launcher
            .launch(team)
            .await
            .map_err(|e| OrchestratorError::LaunchFailed {
                backend,
                team: team.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            team = %team,
            uuid = %node.uuid,
            %backend,
            port = node.port,
            pid = node.process_id,
            "instance launched"
        );

        if let Err(e) = self.registry.save(&node) {
            self.reaper.stop_process(&node);
            return Err(e.into());
        }
        self.scheduler.arm(node.uuid);
        Ok((node, self.claim))
    }
}

pub struct Orchestrator {
    launcher: Arc<dyn BackendLauncher>,
    registry: Arc<dyn InstanceRegistry>,
    solved: Option<Arc<dyn SolvedPredicate>>,
    signaler: Arc<dyn ProcessSignaler>,
    reaper: Arc<Reaper>,
    scheduler: Arc<TerminationScheduler>,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn BackendLauncher>,
        registry: Arc<dyn InstanceRegistry>,
        signaler: Arc<dyn ProcessSignaler>,
        solved: Option<Arc<dyn SolvedPredicate>>,
        ttl: Duration,
    ) -> Self {
        let reaper = Arc::new(Reaper::new(
            registry.clone(),
            signaler.clone(),
            launcher.owns_process(),
        ));
        Self {
            scheduler: Arc::new(TerminationScheduler::new(reaper.clone(), ttl)),
            launcher,
            registry,
            solved,
            signaler,
            reaper,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.launcher.backend()
    }

    pub fn ttl(&self) -> Duration {
        self.scheduler.ttl()
    }

    pub fn scheduler(&self) -> &TerminationScheduler {
        &self.scheduler
    }

    /// Launch a node for `team`, deploy the challenge onto it and arm its
    /// TTL. Fails with `AlreadyRunning` while the team has a live instance
    /// or another launch for it is in flight.
    ///
    /// A failed deploy leaves the instance registered; the TTL reaper or an
    /// explicit terminate cleans it up. The same holds when the caller drops
    /// this future: launch, registration and TTL arming finish regardless.
    pub async fn start(&self, team: &TeamId, deploy: &dyn DeployHandler) -> Result<NodeInfo, OrchestratorError> {
        let Some(claim) = TeamClaim::acquire(&self.registry, team)? else {
            return Err(OrchestratorError::AlreadyRunning { team: team.clone() });
        };
        if self.registry.exists_for_team(team)? {
            return Err(OrchestratorError::AlreadyRunning { team: team.clone() });
        }

        // runs detached so a caller that goes away cannot strand the node
        let job = LaunchJob {
            launcher: self.launcher.clone(),
            registry: self.registry.clone(),
            reaper: self.reaper.clone(),
            scheduler: self.scheduler.clone(),
            claim,
        };
        let (mut node, _claim) = tokio::spawn(job.run())
            .await
            .map_err(|e| OrchestratorError::LaunchFailed {
                backend: self.backend(),
                team: team.clone(),
                reason: format!("launch task failed: {e}"),
            })??;

        let uuid = node.uuid.to_string();
        let deploy_failed = |reason: String| OrchestratorError::DeployFailed {
            team: team.clone(),
            uuid: uuid.clone(),
            reason,
        };
        let funder = self
            .launcher
            .funder()
            .await
            .map_err(|e| deploy_failed(e.to_string()))?;
        let addr = match deploy.deploy(DeployContext::from_node(&node, funder)).await {
            Ok(addr) => addr,
            Err(reason) => {
                tracing::warn!(team = %team, uuid = %node.uuid, "deploy failed: {reason}");
                return Err(deploy_failed(reason));
            }
        };
        node.attach_contract(addr)
            .map_err(|e| deploy_failed(e.to_string()))?;
        self.registry.save(&node)?;
        tracing::info!(
            team = %team,
            uuid = %node.uuid,
            contract = node.contract_addr.as_deref().unwrap_or_default(),
            "challenge deployed"
        );

        Ok(node)
    }

    /// Tear down the team's instance now. A second call fails with
    /// `NotRunning`.
    pub fn terminate(&self, team: &TeamId) -> Result<(), OrchestratorError> {
        let node = self.instance(team)?;
        self.scheduler.disarm(&node.uuid);
        if self.reaper.teardown(&node, TeardownTrigger::Explicit)? {
            Ok(())
        } else {
            Err(OrchestratorError::NotRunning { team: team.clone() })
        }
    }

    /// Whether the team's deployed artifact reports itself solved.
    pub async fn verify(&self, team: &TeamId) -> Result<bool, OrchestratorError> {
        let node = self.instance(team)?;
        let Some(addr) = node.contract_addr.clone() else {
            return Err(OrchestratorError::NotDeployed { team: team.clone() });
        };
        let Some(predicate) = &self.solved else {
            return Err(OrchestratorError::VerifyFailed {
                team: team.clone(),
                reason: format!("no solved check configured for {}", node.backend),
            });
        };
        let solved = predicate
            .is_solved(SolvedContext::from_node(&node, addr))
            .await
            .map_err(|reason| OrchestratorError::VerifyFailed {
                team: team.clone(),
                reason,
            })?;
        tracing::info!(team = %team, uuid = %node.uuid, solved, "solved check");
        Ok(solved)
    }

    /// The team's live instance.
    pub fn instance(&self, team: &TeamId) -> Result<NodeInfo, OrchestratorError> {
        match self.registry.load_for_team(team) {
            Ok(node) => Ok(node),
            Err(StoreError::NotFound(_)) => Err(OrchestratorError::NotRunning { team: team.clone() }),
            Err(e) => Err(e.into()),
        }
    }

    /// The live instance with `uuid`, if any.
    pub fn instance_by_uuid(&self, uuid: &InstanceId) -> Result<Option<NodeInfo>, OrchestratorError> {
        match self.registry.load(uuid) {
            Ok(node) => Ok(Some(node)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Arm TTL timers for instances registered by an earlier gateway
    /// process, each with a full TTL from now. Returns how many were armed.
    pub fn rearm_existing(&self) -> Result<usize, OrchestratorError> {
        let nodes = self.registry.list()?;
        for node in &nodes {
            self.scheduler.arm(node.uuid);
        }
        if !nodes.is_empty() {
            tracing::info!(count = nodes.len(), "re-armed TTL for surviving instances");
        }
        Ok(nodes.len())
    }

    /// Tear down every registered instance and release family-wide
    /// resources. Returns how many instances this call removed.
    pub async fn shutdown_all(&self) -> Result<usize, OrchestratorError> {
        self.scheduler.cancel_all();
        let mut removed = 0;
        for node in self.registry.list()? {
            match self.reaper.teardown(&node, TeardownTrigger::Shutdown) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(uuid = %node.uuid, "shutdown teardown failed: {e}"),
            }
        }
        if let Err(e) = self.launcher.shutdown(self.signaler.as_ref()).await {
            tracing::warn!(backend = %self.backend(), "failed to release backend resources: {e}");
        }
        tracing::info!(removed, "all instances torn down");
        Ok(removed)
    }
}
