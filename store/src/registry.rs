//! Instance registry trait.
//!
//! Two indexes over launched nodes: by instance uuid (routing proxied
//! calls) and by team (enforcing one live instance per team). The rest of
//! the codebase depends only on this trait.

use sandbox_types::{InstanceId, NodeInfo, TeamId};

use crate::StoreError;

pub trait InstanceRegistry: Send + Sync {
    fn exists(&self, uuid: &InstanceId) -> Result<bool, StoreError>;
    fn exists_for_team(&self, team: &TeamId) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record exists.
    fn load(&self, uuid: &InstanceId) -> Result<NodeInfo, StoreError>;
    /// Fails with [`StoreError::NotFound`] when no record exists.
    fn load_for_team(&self, team: &TeamId) -> Result<NodeInfo, StoreError>;

    /// Write both indexes. The uuid index is written first so that a team
    /// binding never points at a missing record.
    fn save(&self, node: &NodeInfo) -> Result<(), StoreError>;

    /// Delete both indexes, uuid first.
    ///
    /// Returns `true` only for the call that actually removed the uuid
    /// record; concurrent or repeated removals observe `false`. The team
    /// index is only deleted while it still points at `node`.
    fn remove(&self, node: &NodeInfo) -> Result<bool, StoreError>;

    /// Atomically reserve `team` for an in-flight launch. Returns `false`
    /// when another launch already holds the reservation.
    fn try_claim_team(&self, team: &TeamId) -> Result<bool, StoreError>;
    fn release_team(&self, team: &TeamId) -> Result<(), StoreError>;

    /// All live instances.
    fn list(&self) -> Result<Vec<NodeInfo>, StoreError>;
}
