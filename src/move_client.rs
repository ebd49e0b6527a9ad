use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::game_interface::{GameService, GameSnapshot, Move, ServiceError};
use crate::tournament_strategy::Level;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Even the substitute skip was refused, or a setup request was refused.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl From<ServiceError> for ClientError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected(msg) => ClientError::Rejected(msg),
            ServiceError::Transport(msg) => ClientError::Transport(msg),
            ServiceError::Decode(msg) => ClientError::Protocol(msg),
        }
    }
}

/// Single request/response exchanges with the game service on behalf of a match.
pub struct MoveClient<S: ?Sized> {
    service: Arc<S>,
}

impl<S: ?Sized> Clone for MoveClient<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: GameService + ?Sized> MoveClient<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn create_game(&self, level: Level, rate_limited: bool) -> Result<String, ClientError> {
        Ok(self.service.create_game(level, rate_limited)?)
    }

    pub fn attend(&self, game_id: &str, player_name: &str) -> Result<String, ClientError> {
        Ok(self.service.attend(game_id, player_name)?)
    }

    /// Read the current state. No side effect on the game.
    pub fn fetch_state(&self, game_id: &str) -> Result<GameSnapshot, ClientError> {
        Ok(self.service.fetch_state(game_id)?)
    }

    /// Submit `mv` for `player_id` and return the resulting state.
    ///
    /// A move refused by the server (e.g. walking out of the arena) is replaced by a single
    /// `SKIP` without symbol message: the player loses the turn, the match goes on. Transport
    /// failures are returned as-is, without retry.
    #[instrument(skip(self, mv), fields(action = %mv.action))]
    pub fn submit(
        &self,
        game_id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<GameSnapshot, ClientError> {
        match self.service.post_move(game_id, player_id, mv) {
            Ok(snapshot) => Ok(snapshot),
            Err(ServiceError::Rejected(reason)) => {
                debug!("move {} rejected ({reason}), skipping turn", mv.action);
                Ok(self.service.post_move(game_id, player_id, &Move::skip())?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_interface::Action;
    use crate::test_util::ScriptedService;

    #[test]
    fn test_accepted_move_is_applied() {
        let service = Arc::new(ScriptedService::new(2));
        let client = MoveClient::new(service.clone());
        let game = client.create_game(Level::Two, false).unwrap();
        let p1 = client.attend(&game, "a").unwrap();
        client.attend(&game, "b").unwrap();

        let snapshot = client
            .submit(&game, &p1, &Move::new(Action::Right).with_message("hi"))
            .unwrap();
        assert_eq!(snapshot.used_moves, 1);
        assert_eq!(
            service.moves(&game),
            vec![(p1, Action::Right, Some("hi".to_owned()))]
        );
    }

    #[test]
    fn test_rejected_move_becomes_skip() {
        let service = Arc::new(ScriptedService::new(2).rejecting(Action::Left));
        let client = MoveClient::new(service.clone());
        let game = client.create_game(Level::One, false).unwrap();
        let p1 = client.attend(&game, "a").unwrap();
        let p2 = client.attend(&game, "b").unwrap();

        let snapshot = client
            .submit(&game, &p1, &Move::new(Action::Left).with_message("x"))
            .unwrap();
        // the skip was applied: turn passed, no goal reached, no message sent
        assert_eq!(snapshot.current_player_id(), Some(p2.as_str()));
        assert_eq!(snapshot.unreached_goals.len(), 2);
        assert_eq!(service.moves(&game), vec![(p1, Action::Skip, None)]);
    }

    #[test]
    fn test_rejected_skip_is_an_error() {
        let service = Arc::new(
            ScriptedService::new(2)
                .rejecting(Action::Left)
                .rejecting(Action::Skip),
        );
        let client = MoveClient::new(service);
        let game = client.create_game(Level::One, false).unwrap();
        let p1 = client.attend(&game, "a").unwrap();
        client.attend(&game, "b").unwrap();

        let err = client
            .submit(&game, &p1, &Move::new(Action::Left))
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));
    }

    #[test]
    fn test_transport_error_is_not_retried() {
        let service = Arc::new(ScriptedService::new(2));
        let client = MoveClient::new(service.clone());
        let game = client.create_game(Level::One, false).unwrap();
        let p1 = client.attend(&game, "a").unwrap();
        client.attend(&game, "b").unwrap();

        service.disconnect();
        let err = client
            .submit(&game, &p1, &Move::new(Action::Right))
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(service.moves(&game).is_empty());
    }
}
