use sandbox_store::StoreError;
use sandbox_types::{BackendKind, TeamId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("team {team} already has a running instance")]
    AlreadyRunning { team: TeamId },

    #[error("team {team} has no running instance")]
    NotRunning { team: TeamId },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{backend} launch for team {team} failed: {reason}")]
    LaunchFailed {
        backend: BackendKind,
        team: TeamId,
        reason: String,
    },

    #[error("deploy for team {team} (instance {uuid}) failed: {reason}")]
    DeployFailed {
        team: TeamId,
        uuid: String,
        reason: String,
    },

    #[error("instance of team {team} has no deployed contract")]
    NotDeployed { team: TeamId },

    #[error("solved check for team {team} failed: {reason}")]
    VerifyFailed { team: TeamId, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl OrchestratorError {
    /// Stable machine-readable code for boundary layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning { .. } => "already_running",
            Self::NotRunning { .. } => "not_running",
            Self::NotFound(_) => "not_found",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::DeployFailed { .. } => "deploy_failed",
            Self::NotDeployed { .. } => "not_deployed",
            Self::VerifyFailed { .. } => "verify_failed",
            Self::Config(_) => "config",
            Self::Store(_) => "storage",
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_miss_maps_to_not_found() {
        let err: OrchestratorError = StoreError::NotFound("team abc".into()).into();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn messages_carry_team_context() {
        let err = OrchestratorError::AlreadyRunning {
            team: TeamId::new("teamA").unwrap(),
        };
        assert_eq!(err.to_string(), "team teamA already has a running instance");
        assert_eq!(err.code(), "already_running");
    }
}
