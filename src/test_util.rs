//! In-memory [`GameService`] for unit tests.
//!
//! Each game is a strip of `goals` cells: `RIGHT` reaches the next goal, other accepted actions
//! only spend a move. Players alternate, first attendee first.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::game_interface::{
    Action, GameService, GameSnapshot, GameStatus, Move, PlayerRef, ServiceError,
};
use crate::tournament_strategy::Level;

#[derive(Debug, Default)]
struct FakeGame {
    level: Option<Level>,
    rate_limited: bool,
    players: Vec<String>,
    turn: usize,
    used_moves: u32,
    goals: u32,
    fetches_since_full: u32,
    status: GameStatus,
    moves: Vec<(String, Action, Option<String>)>,
}

#[derive(Debug, Default)]
struct Inner {
    games: HashMap<String, FakeGame>,
    created: usize,
    fetches: usize,
    disconnected: bool,
}

pub(crate) struct ScriptedService {
    goals: u32,
    max_moves: u32,
    abort_on_exhaustion: bool,
    start_after_polls: u32,
    stranger_turn: bool,
    lagging: bool,
    rejected: HashSet<Action>,
    inner: Mutex<Inner>,
}

impl ScriptedService {
    pub(crate) fn new(goals: u32) -> Self {
        Self {
            goals,
            max_moves: 50,
            abort_on_exhaustion: false,
            start_after_polls: 0,
            stranger_turn: false,
            lagging: false,
            rejected: HashSet::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Refuse every move with this action.
    pub(crate) fn rejecting(mut self, action: Action) -> Self {
        self.rejected.insert(action);
        self
    }

    /// The game ends after this many moves: lost, or merely over with `aborting`.
    pub(crate) fn with_max_moves(mut self, max_moves: u32) -> Self {
        self.max_moves = max_moves;
        self
    }

    pub(crate) fn aborting(mut self) -> Self {
        self.abort_on_exhaustion = true;
        self
    }

    /// Report `started = false` for this many state reads after the second player joined.
    pub(crate) fn start_after_polls(mut self, polls: u32) -> Self {
        self.start_after_polls = polls;
        self
    }

    /// Report a current player that is not part of the game.
    pub(crate) fn with_stranger_turn(mut self) -> Self {
        self.stranger_turn = true;
        self
    }

    /// Move replies show the state from before the move, and a won game is not flagged `over`.
    pub(crate) fn lagging(mut self) -> Self {
        self.lagging = true;
        self
    }

    /// Number of state reads so far, over every game.
    pub(crate) fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches
    }

    /// Every later request fails with a transport error.
    pub(crate) fn disconnect(&self) {
        self.inner.lock().unwrap().disconnected = true;
    }

    pub(crate) fn moves(&self, game_id: &str) -> Vec<(String, Action, Option<String>)> {
        self.inner.lock().unwrap().games[game_id].moves.clone()
    }

    pub(crate) fn created_games(&self) -> Vec<(String, Level, bool)> {
        let inner = self.inner.lock().unwrap();
        let mut games: Vec<_> = inner
            .games
            .iter()
            .map(|(id, g)| (id.clone(), g.level.unwrap(), g.rate_limited))
            .collect();
        games.sort();
        games
    }

    fn snapshot(&self, id: &str, game: &FakeGame) -> GameSnapshot {
        let current_player = if !game.status.started {
            None
        } else if self.stranger_turn {
            Some(PlayerRef {
                uuid: "stranger".to_owned(),
            })
        } else {
            Some(PlayerRef {
                uuid: game.players[game.turn].clone(),
            })
        };
        GameSnapshot {
            uuid: id.to_owned(),
            state: game.status.clone(),
            current_player,
            used_moves: game.used_moves,
            unreached_goals: (0..game.goals).map(serde_json::Value::from).collect(),
            extra: Default::default(),
        }
    }
}

impl GameService for ScriptedService {
    fn create_game(&self, level: Level, rate_limited: bool) -> Result<String, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.disconnected {
            return Err(ServiceError::Transport("connection refused".to_owned()));
        }
        inner.created += 1;
        let id = format!("game-{}", inner.created);
        inner.games.insert(
            id.clone(),
            FakeGame {
                level: Some(level),
                rate_limited,
                goals: self.goals,
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn attend(&self, game_id: &str, _player_name: &str) -> Result<String, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.disconnected {
            return Err(ServiceError::Transport("connection refused".to_owned()));
        }
        let start_now = self.start_after_polls == 0;
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| ServiceError::Rejected("no such game".to_owned()))?;
        if game.players.len() == 2 {
            return Err(ServiceError::Rejected("game is full".to_owned()));
        }
        let player = format!("{game_id}-p{}", game.players.len());
        game.players.push(player.clone());
        if game.players.len() == 2 && start_now {
            game.status.started = true;
        }
        Ok(player)
    }

    fn fetch_state(&self, game_id: &str) -> Result<GameSnapshot, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.disconnected {
            return Err(ServiceError::Transport("connection refused".to_owned()));
        }
        inner.fetches += 1;
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| ServiceError::Rejected("no such game".to_owned()))?;
        if game.players.len() == 2 && !game.status.started {
            game.fetches_since_full += 1;
            if game.fetches_since_full > self.start_after_polls {
                game.status.started = true;
            }
        }
        let game = &inner.games[game_id];
        Ok(self.snapshot(game_id, game))
    }

    fn post_move(
        &self,
        game_id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<GameSnapshot, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.disconnected {
            return Err(ServiceError::Transport("connection refused".to_owned()));
        }
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| ServiceError::Rejected("no such game".to_owned()))?;
        if !game.status.started || game.status.over {
            return Err(ServiceError::Rejected("game not running".to_owned()));
        }
        if game.players[game.turn] != player_id {
            return Err(ServiceError::Rejected("not your turn".to_owned()));
        }
        if self.rejected.contains(&mv.action) {
            return Err(ServiceError::Rejected(format!("{} not allowed", mv.action)));
        }

        let before = self.snapshot(game_id, game);
        game.moves
            .push((player_id.to_owned(), mv.action, mv.symbol_message.clone()));
        game.used_moves += 1;
        if mv.action == Action::Right {
            game.goals = game.goals.saturating_sub(1);
        }
        if game.goals == 0 {
            game.status.won = true;
            game.status.over = !self.lagging;
        } else if game.used_moves >= self.max_moves {
            game.status.over = true;
            if !self.abort_on_exhaustion {
                game.status.lost = true;
                game.status.lost_message = Some("out of moves".to_owned());
            }
        }
        game.turn = (game.turn + 1) % game.players.len();
        if self.lagging {
            return Ok(before);
        }

        let game = &inner.games[game_id];
        Ok(self.snapshot(game_id, game))
    }
}
