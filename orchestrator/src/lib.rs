//! Sandbox orchestration: per-team instance lifecycle on top of the
//! launchers and the instance registry.
//!
//! - [`Orchestrator`] — `start` / `terminate` / `verify`
//! - [`TerminationScheduler`] — TTL reaping, idempotent with explicit teardown
//! - [`DeployHandler`] / [`SolvedPredicate`] — per-challenge collaborators
//! - [`SandboxConfig`] — TOML configuration
//! - [`ShutdownController`] — shutdown reason and the instance reap on exit

pub mod callbacks;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod shutdown;

pub use callbacks::{
    solved_predicate_for, CommandDeployHandler, CommandSolvedPredicate, DeployContext, DeployHandler,
    EvmSolvedCheck, SolvedContext, SolvedPredicate, StarknetSolvedCheck,
};
pub use config::SandboxConfig;
pub use error::OrchestratorError;
pub use lifecycle::Orchestrator;
pub use scheduler::{Reaper, TeardownTrigger, TerminationScheduler};
pub use shutdown::{InstancePolicy, ShutdownController, ShutdownReason};
