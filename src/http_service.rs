//! [`GameService`] over the CoMaze REST API.
//!
//! Every call is a single blocking request bounded by
//! [`Configuration::with_request_timeout`]. Requests are never retried here: a connection failure
//! is reported as [`ServiceError::Transport`] and ends the current match.

use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::configuration::Configuration;
use crate::game_interface::{GameService, GameSnapshot, Move, ServiceError};
use crate::tournament_strategy::Level;

const PLAYER_SLOTS: &str = "2";

#[derive(Deserialize)]
struct Created {
    uuid: String,
}

/// Blocking HTTP client for the game server.
#[derive(Debug, Clone)]
pub struct HttpGameService {
    client: Client,
    api_url: String,
}

impl HttpGameService {
    /// Build a client for the API at `config.api_url()`.
    pub fn new(config: &Configuration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("could not create HTTP client")?;
        Ok(Self {
            client,
            api_url: config.api_url().trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn send(request: RequestBuilder) -> Result<Response, ServiceError> {
        request
            .send()
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }
}

/// Reject non-success statuses, then decode the body.
fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ServiceError::Rejected(format!("{status}: {}", body.trim())));
    }
    response
        .json::<T>()
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

impl GameService for HttpGameService {
    #[instrument(skip(self))]
    fn create_game(&self, level: Level, rate_limited: bool) -> Result<String, ServiceError> {
        let mut query = vec![
            ("level", level.to_string()),
            ("numOfPlayerSlots", PLAYER_SLOTS.to_owned()),
        ];
        if rate_limited {
            query.push(("actionRateLimit", "1".to_owned()));
        }
        let response = Self::send(self.client.post(self.url("/game/create")).query(&query))?;
        let created: Created = read_json(response)?;
        trace!(game_id = %created.uuid, "game created");
        Ok(created.uuid)
    }

    #[instrument(skip(self))]
    fn attend(&self, game_id: &str, player_name: &str) -> Result<String, ServiceError> {
        let request = self
            .client
            .post(self.url(&format!("/game/{game_id}/attend")))
            .query(&[("playerName", player_name)]);
        let player: Created = read_json(Self::send(request)?)?;
        Ok(player.uuid)
    }

    fn fetch_state(&self, game_id: &str) -> Result<GameSnapshot, ServiceError> {
        let request = self.client.get(self.url(&format!("/game/{game_id}")));
        read_json(Self::send(request)?)
    }

    #[instrument(skip(self))]
    fn post_move(
        &self,
        game_id: &str,
        player_id: &str,
        mv: &Move,
    ) -> Result<GameSnapshot, ServiceError> {
        let mut query = vec![("playerId", player_id), ("action", mv.action.as_str())];
        if let Some(message) = mv.symbol_message.as_deref() {
            query.push(("symbolMessage", message));
        }
        let request = self
            .client
            .post(self.url(&format!("/game/{game_id}/move")))
            .query(&query);
        // A move the server refuses often comes back as an error page rather than a status code,
        // so an unreadable body counts as a rejection too.
        read_json(Self::send(request)?).map_err(|e| match e {
            ServiceError::Decode(msg) => ServiceError::Rejected(msg),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_url_without_trailing_slash() {
        let config = Configuration::new().with_api_url("http://127.0.0.1:9/");
        let service = HttpGameService::new(&config).unwrap();
        assert_eq!(service.url("/game/abc"), "http://127.0.0.1:9/game/abc");
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // port 9 (discard) is closed on test machines
        let config = Configuration::new()
            .with_api_url("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2));
        let service = HttpGameService::new(&config).unwrap();
        let err = service.fetch_state("missing").unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)), "{err:?}");
    }
}
