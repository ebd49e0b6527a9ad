//! Traits and types shared between the evaluator, the game service and the agents.
//!
//! The game itself lives on a remote server. The evaluator only reads the handful of snapshot
//! fields it needs to drive a match; everything else is kept as raw JSON in
//! [`GameSnapshot::extra`] so that agents can see the full state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tournament_strategy::Level;

/// A move direction, or `Skip` to pass the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Move up.
    Up,
    /// Move down.
    Down,
    /// Move left.
    Left,
    /// Move right.
    Right,
    /// Pass the turn without moving.
    Skip,
}

impl Action {
    /// Wire representation used in the `action` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::Skip => "SKIP",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Action::Up),
            "DOWN" => Ok(Action::Down),
            "LEFT" => Ok(Action::Left),
            "RIGHT" => Ok(Action::Right),
            "SKIP" => Ok(Action::Skip),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// What an agent returns on its turn: an action and an optional symbol for its partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// The action to submit.
    pub action: Action,
    /// Optional side-channel symbol sent along with the action.
    pub symbol_message: Option<String>,
}

impl Move {
    /// A move without symbol message.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            symbol_message: None,
        }
    }

    /// The no-op move.
    pub fn skip() -> Self {
        Self::new(Action::Skip)
    }

    /// Attach a symbol message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.symbol_message = Some(message.into());
        self
    }
}

/// Game status flags reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameStatus {
    /// Both player slots are filled and the game is running (or finished).
    pub started: bool,
    /// The game reached a terminal state.
    pub over: bool,
    /// All goals were reached.
    pub won: bool,
    /// The game was lost (out of moves, ...).
    pub lost: bool,
    /// Reason given by the server when `lost` is set.
    pub lost_message: Option<String>,
}

/// Reference to a player inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Player id assigned by the server on `attend`.
    pub uuid: String,
}

/// A single read of the remote game state. Never cached across rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Game id.
    #[serde(default)]
    pub uuid: String,
    /// Status flags.
    #[serde(default)]
    pub state: GameStatus,
    /// Player whose turn it is; absent before the game starts.
    #[serde(default)]
    pub current_player: Option<PlayerRef>,
    /// Moves spent so far by both players.
    #[serde(default)]
    pub used_moves: u32,
    /// Goals not reached yet.
    #[serde(default)]
    pub unreached_goals: Vec<serde_json::Value>,
    /// Every other field sent by the server, untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GameSnapshot {
    /// Id of the player expected to move, if any.
    pub fn current_player_id(&self) -> Option<&str> {
        self.current_player.as_ref().map(|p| p.uuid.as_str())
    }
}

/// The single capability an agent has: pick a move given the current snapshot.
///
/// The same policy may be asked for moves by several matches at once, from several threads.
/// Nothing is assumed about how long it takes: a policy that never returns is bounded by the
/// job timeout of the scheduler, and a policy that panics only fails its own job.
pub trait Policy: Send + Sync {
    /// Select the next move.
    fn select_move(&self, snapshot: &GameSnapshot) -> Move;
}

impl<F> Policy for F
where
    F: Fn(&GameSnapshot) -> Move + Send + Sync,
{
    fn select_move(&self, snapshot: &GameSnapshot) -> Move {
        self(snapshot)
    }
}

/// Errors returned by a [`GameService`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The server refused the request (e.g. a move leaving the arena).
    #[error("request rejected by server: {0}")]
    Rejected(String),

    /// The server could not be reached or did not answer in time.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with something that is not the expected JSON.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// The remote game server, as seen by the evaluator.
///
/// Every method is a blocking request/response exchange; implementations must not retry on
/// transport failure.
pub trait GameService: Send + Sync {
    /// Create a two-player game at `level` and return its id.
    fn create_game(&self, level: Level, rate_limited: bool) -> Result<String, ServiceError>;

    /// Join `game_id` under `player_name` and return the assigned player id.
    fn attend(&self, game_id: &str, player_name: &str) -> Result<String, ServiceError>;

    /// Read the current game state.
    fn fetch_state(&self, game_id: &str) -> Result<GameSnapshot, ServiceError>;

    /// Submit one move and return the resulting state.
    fn post_move(
        &self,
        game_id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<GameSnapshot, ServiceError>;
}
