//! Fundamental types for the chain sandbox orchestrator.
//!
//! This crate defines the records shared across every other crate in the
//! workspace: backend families, team and instance identifiers, minted
//! accounts, launched node records, and the shared validator handle.

pub mod account;
pub mod backend;
pub mod error;
pub mod instance;
pub mod team;
pub mod validator;

pub use account::AccountInfo;
pub use backend::BackendKind;
pub use error::TypesError;
pub use instance::{InstanceId, NodeInfo};
pub use team::TeamId;
pub use validator::SharedValidatorState;
