//! Directory-backed [`InstanceRegistry`].
//!
//! Layout under the root directory:
//!
//! ```text
//! instances-by-uuid/<uuid>        NodeInfo JSON
//! instances-by-team/<hex(team)>   NodeInfo JSON (same record)
//! claims/<hex(team)>              launch reservation
//! ```
//!
//! Team ids are opaque tickets, so they are hex-encoded before touching the
//! filesystem. Records are replaced with write-then-rename.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sandbox_types::{InstanceId, NodeInfo, TeamId};

use crate::fs::{atomic_write, remove_if_exists};
use crate::{InstanceRegistry, StoreError};

const BY_UUID_DIR: &str = "instances-by-uuid";
const BY_TEAM_DIR: &str = "instances-by-team";
const CLAIMS_DIR: &str = "claims";

/// Reservations older than this are left over from a crashed worker.
const DEFAULT_STALE_CLAIM: Duration = Duration::from_secs(10 * 60);

pub struct FsRegistry {
    root: PathBuf,
    stale_claim_after: Duration,
}

impl FsRegistry {
    /// Open (creating if needed) a registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in [BY_UUID_DIR, BY_TEAM_DIR, CLAIMS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self {
            root,
            stale_claim_after: DEFAULT_STALE_CLAIM,
        })
    }

    pub fn with_stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uuid_path(&self, uuid: &InstanceId) -> PathBuf {
        self.root.join(BY_UUID_DIR).join(uuid.to_string())
    }

    fn team_path(&self, team: &TeamId) -> PathBuf {
        self.root.join(BY_TEAM_DIR).join(hex::encode(team.as_str()))
    }

    fn claim_path(&self, team: &TeamId) -> PathBuf {
        self.root.join(CLAIMS_DIR).join(hex::encode(team.as_str()))
    }

    fn read_record(path: &Path, what: impl FnOnce() -> String) -> Result<NodeInfo, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(what()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corruption(format!("{}: {e}", path.display())))
    }

    fn create_claim(path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())
    }

    fn claim_is_stale(&self, path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.stale_claim_after)
    }
}

impl InstanceRegistry for FsRegistry {
    fn exists(&self, uuid: &InstanceId) -> Result<bool, StoreError> {
        Ok(self.uuid_path(uuid).exists())
    }

    fn exists_for_team(&self, team: &TeamId) -> Result<bool, StoreError> {
        Ok(self.team_path(team).exists())
    }

    fn load(&self, uuid: &InstanceId) -> Result<NodeInfo, StoreError> {
        Self::read_record(&self.uuid_path(uuid), || format!("instance {uuid}"))
    }

    fn load_for_team(&self, team: &TeamId) -> Result<NodeInfo, StoreError> {
        Self::read_record(&self.team_path(team), || format!("team {team}"))
    }

    fn save(&self, node: &NodeInfo) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(node).map_err(|e| StoreError::Serialization(e.to_string()))?;
        atomic_write(&self.uuid_path(&node.uuid), &bytes)?;
        atomic_write(&self.team_path(&node.team_id), &bytes)?;
        Ok(())
    }

    fn remove(&self, node: &NodeInfo) -> Result<bool, StoreError> {
        let removed = remove_if_exists(&self.uuid_path(&node.uuid))?;

        let team_path = self.team_path(&node.team_id);
        match Self::read_record(&team_path, String::new) {
            Ok(bound) if bound.uuid == node.uuid => {
                remove_if_exists(&team_path)?;
            }
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(StoreError::Corruption(reason)) => {
                tracing::warn!(team = %node.team_id, "dropping corrupt team index: {reason}");
                remove_if_exists(&team_path)?;
            }
            Err(e) => return Err(e),
        }
        Ok(removed)
    }

    fn try_claim_team(&self, team: &TeamId) -> Result<bool, StoreError> {
        let path = self.claim_path(team);
        match Self::create_claim(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !self.claim_is_stale(&path) {
                    return Ok(false);
                }
                tracing::warn!(team = %team, "reclaiming stale launch reservation");
                remove_if_exists(&path)?;
                match Self::create_claim(&path) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn release_team(&self, team: &TeamId) -> Result<(), StoreError> {
        remove_if_exists(&self.claim_path(team))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<NodeInfo>, StoreError> {
        let mut nodes = Vec::new();
        for entry in fs::read_dir(self.root.join(BY_UUID_DIR))? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            match Self::read_record(&entry.path(), String::new) {
                Ok(node) => nodes.push(node),
                // removed between readdir and read
                Err(StoreError::NotFound(_)) => {}
                Err(e) => tracing::warn!(path = %entry.path().display(), "skipping record: {e}"),
            }
        }
        Ok(nodes)
    }
}
