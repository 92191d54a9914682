//! Team identity derived from an authenticated ticket.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Upper bound on ticket length accepted as a team identity.
pub const MAX_TEAM_ID_LEN: usize = 100;

/// An authenticated team identity.
///
/// The orchestrator treats tickets as opaque: the only checks are that the
/// value is present, bounded, and free of control characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_TEAM_ID_LEN || raw.chars().any(char::is_control) {
            return Err(TypesError::InvalidTeamId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for TeamId {
    type Error = TypesError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}
