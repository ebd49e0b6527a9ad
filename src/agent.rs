use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::game_interface::{GameSnapshot, Move, Policy};

/// A tournament participant. Read-only once loaded.
pub struct Agent {
    /// Unique id (usually the upload name).
    pub id: String,
    pub team_name: String,
    policy: Arc<dyn Policy>,
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("team_name", &self.team_name)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        team_name: impl Into<String>,
        policy: impl Policy + 'static,
    ) -> Agent {
        Self::with_shared_policy(id, team_name, Arc::new(policy))
    }

    /// Build an agent around a policy that is already shared.
    pub fn with_shared_policy(
        id: impl Into<String>,
        team_name: impl Into<String>,
        policy: Arc<dyn Policy>,
    ) -> Agent {
        Agent {
            id: id.into(),
            team_name: team_name.into(),
            policy,
        }
    }

    /// Name used when attending a game: team name and last segment of the id.
    pub fn player_name(&self) -> String {
        let short_id = self.id.rsplit('.').next().unwrap_or(&self.id);
        format!("{}_{}", self.team_name, short_id)
    }

    pub fn select_move(&self, snapshot: &GameSnapshot) -> Move {
        self.policy.select_move(snapshot)
    }
}
