//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing or mutating the core records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("unknown backend family: {0}")]
    UnknownBackend(String),

    #[error("invalid team id: {0}")]
    InvalidTeamId(String),

    #[error("invalid instance id: {0}")]
    InvalidInstanceId(String),

    #[error("contract address already attached to instance {uuid}")]
    ContractAlreadyAttached { uuid: String },
}
