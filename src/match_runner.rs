use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::agent::Agent;
use crate::configuration::Configuration;
use crate::game_interface::{GameService, GameSnapshot};
use crate::move_client::{ClientError, MoveClient};
use crate::outcome::{FailureKind, JobOutcome, MatchResult, MoveRecord};
use crate::tournament_strategy::PairingJob;

/// Set by the scheduler when it gives up on a job.
///
/// The runner checks it before every request it is about to make, so an abandoned match stops at
/// the next network call instead of playing on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a match that reached a terminal state ended.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub game_id: String,
    pub result: MatchResult,
    /// Agent whose move produced the victory.
    pub winner: Option<Arc<Agent>>,
    pub used_moves: u32,
    pub lost_message: Option<String>,
    pub moves: Vec<MoveRecord>,
}

impl MatchReport {
    pub fn into_outcome(self, job: &PairingJob) -> JobOutcome {
        let detail = self.lost_message.or(Some(format!("{} moves", self.used_moves)));
        JobOutcome::finished(
            job,
            self.game_id,
            self.result,
            self.winner.map(|a| a.id.clone()),
            detail,
        )
        .with_moves(self.moves)
    }
}

/// A match abandoned before reaching a terminal state.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct MatchError {
    pub kind: FailureKind,
    pub game_id: Option<String>,
    pub message: String,
    /// Moves played before the match was abandoned.
    pub moves: Vec<MoveRecord>,
}

impl MatchError {
    fn new(kind: FailureKind, game_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            game_id: game_id.map(str::to_owned),
            message: message.into(),
            moves: vec![],
        }
    }

    fn from_client(err: ClientError, game_id: Option<&str>) -> Self {
        let kind = match err {
            ClientError::Transport(_) => FailureKind::Transport,
            ClientError::Rejected(_) | ClientError::Protocol(_) => FailureKind::MoveError,
        };
        Self::new(kind, game_id, err.to_string())
    }

    fn cancelled(game_id: Option<&str>) -> Self {
        Self::new(FailureKind::Timeout, game_id, "abandoned by the scheduler")
    }

    fn with_moves(mut self, moves: Vec<MoveRecord>) -> Self {
        self.moves = moves;
        self
    }

    pub fn into_outcome(self, job: &PairingJob) -> JobOutcome {
        JobOutcome::failed(job, self.kind, self.game_id, self.message).with_moves(self.moves)
    }
}

/// Play `job` to the end on a fresh game.
///
/// There is no turn limit: a match that never ends is bounded by the scheduler's job timeout,
/// which cancels `cancel`. The runner then returns a [`FailureKind::Timeout`] error before its
/// next request.
#[instrument(skip_all, fields(job = job.job_id, level = %job.level))]
pub fn run_match<S: GameService + ?Sized>(
    job: &PairingJob,
    client: &MoveClient<S>,
    config: &Configuration,
    cancel: &CancelToken,
) -> Result<MatchReport, MatchError> {
    if cancel.is_cancelled() {
        return Err(MatchError::cancelled(None));
    }
    let game_id = client
        .create_game(job.level, job.rate_limited)
        .map_err(|e| MatchError::from_client(e, None))?;
    let fail = |e: ClientError| MatchError::from_client(e, Some(&game_id));
    let check = || {
        if cancel.is_cancelled() {
            Err(MatchError::cancelled(Some(&game_id)))
        } else {
            Ok(())
        }
    };

    if job.rate_limited {
        announce_showcase(&game_id, config);
    }

    check()?;
    let player_a = client
        .attend(&game_id, &job.agent_a.player_name())
        .map_err(fail)?;
    check()?;
    let player_b = client
        .attend(&game_id, &job.agent_b.player_name())
        .map_err(fail)?;
    debug!(%game_id, %player_a, %player_b, "players joined");

    let mut snapshot = wait_for_start(client, &game_id, config, cancel)?;
    let mut last_mover: Option<&Arc<Agent>> = None;
    let mut moves = Vec::new();

    while !(snapshot.state.over || snapshot.state.won) {
        let Some(current) = snapshot.current_player_id() else {
            return Err(MatchError::new(
                FailureKind::MoveError,
                Some(&game_id),
                "running game without current player",
            )
            .with_moves(moves));
        };
        let (agent, player_id) = if current == player_a {
            (&job.agent_a, &player_a)
        } else if current == player_b {
            (&job.agent_b, &player_b)
        } else {
            return Err(MatchError::new(
                FailureKind::MoveError,
                Some(&game_id),
                format!("current player '{current}' is not part of this game"),
            )
            .with_moves(moves));
        };

        let mv = agent.select_move(&snapshot);
        // the agent may have been thinking past the deadline
        if let Err(e) = check() {
            return Err(e.with_moves(moves));
        }
        trace!(agent = %agent.id, action = %mv.action, "move");
        moves.push(MoveRecord::new(agent.id.clone(), &mv));
        let after = match client.submit(&game_id, player_id, &mv) {
            Ok(after) => after,
            Err(e) => return Err(fail(e).with_moves(moves)),
        };
        last_mover = Some(agent);
        trace!(
            used_moves = after.used_moves,
            goals_left = after.unreached_goals.len()
        );

        // the game may end on any move, not only at the end of a round
        if after.state.won || after.state.over {
            snapshot = after;
            break;
        }
        if let Err(e) = check() {
            return Err(e.with_moves(moves));
        }
        snapshot = match client.fetch_state(&game_id) {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(fail(e).with_moves(moves)),
        };
    }

    let result = if snapshot.state.won {
        MatchResult::Won
    } else if snapshot.state.lost {
        MatchResult::Lost
    } else {
        MatchResult::Aborted
    };
    info!(%game_id, ?result, used_moves = snapshot.used_moves, "match over");

    Ok(MatchReport {
        result,
        winner: if result == MatchResult::Won {
            last_mover.cloned()
        } else {
            None
        },
        used_moves: snapshot.used_moves,
        lost_message: snapshot.state.lost_message.clone(),
        moves,
        game_id,
    })
}

fn wait_for_start<S: GameService + ?Sized>(
    client: &MoveClient<S>,
    game_id: &str,
    config: &Configuration,
    cancel: &CancelToken,
) -> Result<GameSnapshot, MatchError> {
    loop {
        if cancel.is_cancelled() {
            return Err(MatchError::cancelled(Some(game_id)));
        }
        let snapshot = client
            .fetch_state(game_id)
            .map_err(|e| MatchError::from_client(e, Some(game_id)))?;
        if snapshot.state.started {
            return Ok(snapshot);
        }
        trace!(game_id, "waiting for players");
        thread::sleep(config.start_poll_interval);
    }
}

fn announce_showcase(game_id: &str, config: &Configuration) {
    info!(
        "showcase game: {}/?gameId={game_id}",
        config.webapp_url.trim_end_matches('/')
    );
    if let Some(path) = &config.watch_file {
        if let Err(e) = append_line(path, game_id) {
            warn!("could not add {game_id} to {}: {e}", path.display());
        }
    }
    thread::sleep(config.showcase_delay);
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
