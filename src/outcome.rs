//! The record of how a job ended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game_interface::{Action, Move};
use crate::tournament_strategy::{Level, PairingJob};

/// Why a job produced no valid game result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No result within the job's wall-clock budget.
    Timeout,
    /// The server kept rejecting moves, or answered something the runner could not follow.
    MoveError,
    /// Network failure while talking to the server.
    Transport,
    /// The worker died (panic in the runner or in agent code).
    WorkerCrash,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::MoveError => "move error",
            FailureKind::Transport => "transport error",
            FailureKind::WorkerCrash => "worker crash",
        };
        f.write_str(s)
    }
}

/// Terminal classification of a match that ran to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    /// All goals reached.
    Won,
    /// The server declared the game lost.
    Lost,
    /// The game is over but neither won nor lost.
    Aborted,
}

/// One move as chosen by an agent, before any skip substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub agent_id: String,
    pub action: Action,
    pub symbol_message: Option<String>,
}

impl MoveRecord {
    pub fn new(agent_id: impl Into<String>, mv: &Move) -> Self {
        Self {
            agent_id: agent_id.into(),
            action: mv.action,
            symbol_message: mv.symbol_message.clone(),
        }
    }
}

/// Immutable record of one job. Exactly one exists per job of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: usize,
    pub agent_a: String,
    pub agent_b: String,
    pub level: Level,
    /// Server-side game id, when a game was created.
    pub game_id: Option<String>,
    pub won: bool,
    /// The match reached a terminal state (won, lost or aborted).
    pub completed: bool,
    /// Agent whose move won the game.
    pub winner: Option<String>,
    pub failure: Option<FailureKind>,
    /// Free text: lost message, error chain...
    pub detail: Option<String>,
    /// Every move played in the game, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<MoveRecord>,
}

impl JobOutcome {
    /// Outcome of a match that reached a terminal state.
    pub fn finished(
        job: &PairingJob,
        game_id: String,
        result: MatchResult,
        winner: Option<String>,
        detail: Option<String>,
    ) -> Self {
        let won = result == MatchResult::Won;
        Self {
            job_id: job.job_id,
            agent_a: job.agent_a.id.clone(),
            agent_b: job.agent_b.id.clone(),
            level: job.level,
            game_id: Some(game_id),
            won,
            completed: true,
            winner: if won { winner } else { None },
            failure: None,
            detail,
            moves: vec![],
        }
    }

    /// Outcome of a job that did not produce a game result.
    pub fn failed(
        job: &PairingJob,
        kind: FailureKind,
        game_id: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job.job_id,
            agent_a: job.agent_a.id.clone(),
            agent_b: job.agent_b.id.clone(),
            level: job.level,
            game_id,
            won: false,
            completed: false,
            winner: None,
            failure: Some(kind),
            detail: Some(detail.into()),
            moves: vec![],
        }
    }

    pub fn with_moves(mut self, moves: Vec<MoveRecord>) -> Self {
        self.moves = moves;
        self
    }

    pub fn involves(&self, agent_id: &str) -> bool {
        self.agent_a == agent_id || self.agent_b == agent_id
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} vs {} (lvl {}): ",
            self.job_id, self.agent_a, self.agent_b, self.level
        )?;
        match (self.failure, self.won) {
            (Some(kind), _) => write!(f, "{kind}"),
            (None, true) => match &self.winner {
                Some(winner) => write!(f, "won by {winner}"),
                None => write!(f, "won"),
            },
            (None, false) => write!(f, "not won"),
        }
    }
}
