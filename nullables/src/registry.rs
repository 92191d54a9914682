//! Nullable registry — thread-safe in-memory instance indexes.

use sandbox_store::{InstanceRegistry, StoreError};
use sandbox_types::{InstanceId, NodeInfo, TeamId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory [`InstanceRegistry`] with the same contract as the file
/// registry: `remove` is exactly-once and team claims are exclusive.
#[derive(Default)]
pub struct NullRegistry {
    by_uuid: Mutex<HashMap<InstanceId, NodeInfo>>,
    by_team: Mutex<HashMap<TeamId, InstanceId>>,
    claims: Mutex<HashSet<TeamId>>,
}

impl NullRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_uuid.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_claimed(&self, team: &TeamId) -> bool {
        self.claims.lock().unwrap().contains(team)
    }
}

impl InstanceRegistry for NullRegistry {
    fn exists(&self, uuid: &InstanceId) -> Result<bool, StoreError> {
        Ok(self.by_uuid.lock().unwrap().contains_key(uuid))
    }

    fn exists_for_team(&self, team: &TeamId) -> Result<bool, StoreError> {
        Ok(self.by_team.lock().unwrap().contains_key(team))
    }

    fn load(&self, uuid: &InstanceId) -> Result<NodeInfo, StoreError> {
        self.by_uuid
            .lock()
            .unwrap()
            .get(uuid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("instance {uuid}")))
    }

    fn load_for_team(&self, team: &TeamId) -> Result<NodeInfo, StoreError> {
        let uuid = self
            .by_team
            .lock()
            .unwrap()
            .get(team)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("team {team}")))?;
        self.load(&uuid)
    }

    fn save(&self, node: &NodeInfo) -> Result<(), StoreError> {
        self.by_uuid.lock().unwrap().insert(node.uuid, node.clone());
        self.by_team.lock().unwrap().insert(node.team_id.clone(), node.uuid);
        Ok(())
    }

    fn remove(&self, node: &NodeInfo) -> Result<bool, StoreError> {
        if self.by_uuid.lock().unwrap().remove(&node.uuid).is_none() {
            return Ok(false);
        }
        let mut by_team = self.by_team.lock().unwrap();
        if by_team.get(&node.team_id) == Some(&node.uuid) {
            by_team.remove(&node.team_id);
        }
        Ok(true)
    }

    fn try_claim_team(&self, team: &TeamId) -> Result<bool, StoreError> {
        Ok(self.claims.lock().unwrap().insert(team.clone()))
    }

    fn release_team(&self, team: &TeamId) -> Result<(), StoreError> {
        self.claims.lock().unwrap().remove(team);
        Ok(())
    }

    fn list(&self) -> Result<Vec<NodeInfo>, StoreError> {
        Ok(self.by_uuid.lock().unwrap().values().cloned().collect())
    }
}
