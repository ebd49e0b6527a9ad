//! # Remote Tournament
//!
//! Round-robin evaluation of cooperative maze agents against a remote CoMaze game server.
//!
//! It provides:
//! - Tournament execution and score aggregation (`Evaluator`)
//! - Job generation: every pair of agents plays every difficulty level once ([`LevelRoundRobin`](crate::tournament_strategy::LevelRoundRobin))
//! - A bounded worker pool with a per-match timeout and crash isolation
//! - A blocking HTTP client for the CoMaze REST API, behind the [`GameService`](crate::game_interface::GameService) trait
//!
//! Each match is played on a fresh game created on the server. Both agents attend, then take turns
//! until the server reports the game as won, lost or over. A move refused by the server costs the
//! player its turn but never ends the match.
//!
//! # Documentation Overview
//!
//! - For details about the tournament execution and the report it produces, see the [`server`] module.
//! - For server URLs, concurrency, timeouts and showcase games, see
//! [`Configuration`](crate::configuration::Configuration).
//! - For implementing agents, check out the [`Policy`](crate::game_interface::Policy) trait and
//! [`AgentSource`](crate::agent_collector::AgentSource).
//! - For scoring rules, see the [`score`] module.
//!
//! # Usage Example
//!
//! ```no_run
//! use remote_tournament::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Server URLs, workers and timeouts from `EVAL_*` variables
//!     let config = Configuration::from_env().with_watch_file("path_ids_towatch.txt");
//!     let evaluator = Evaluator::http(config)?;
//!
//!     let sources = ["uploads.walker", "uploads.lazy"].map(|id| {
//!         FnSource::new(id, move || {
//!             Ok(Agent::new(id, "my_team", |snapshot: &GameSnapshot| {
//!                 if snapshot.unreached_goals.is_empty() {
//!                     Move::skip()
//!                 } else {
//!                     Move::new(Action::Right).with_message("->")
//!                 }
//!             }))
//!         })
//!     });
//!
//!     let report = evaluator.evaluate(sources)?;
//!     for entry in &report.leaderboard {
//!         println!("{entry}");
//!     }
//!     report.save("logging")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Agent Requirements
//!
//! - `Policy::select_move` must be thread-safe: an agent plays many matches at the same time
//! - A move must be returned within the configured job timeout, otherwise the match is abandoned
//! - A panicking agent only loses the match it was playing

pub use anyhow;
pub mod agent;
pub mod agent_collector;
pub mod configuration;
pub mod error;
pub mod game_interface;
pub mod http_service;
mod logger;
pub mod match_runner;
pub mod move_client;
pub mod outcome;
pub mod score;
pub mod server;
pub mod tournament_scheduler;
pub mod tournament_strategy;

#[cfg(test)]
mod test_util;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use remote_tournament::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::Agent;
    pub use crate::agent_collector::{AgentSource, FnSource};
    pub use crate::configuration::Configuration;
    pub use crate::game_interface::{Action, GameService, GameSnapshot, Move, Policy};
    pub use crate::outcome::{FailureKind, JobOutcome, MoveRecord};
    pub use crate::score::{CreditPolicy, LeaderboardEntry};
    pub use crate::server::{Evaluator, TournamentReport};
    pub use crate::tournament_strategy::Level;
}
