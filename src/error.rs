//! Errors that abort a whole tournament run.
//!
//! Everything that goes wrong inside a single job is recorded in its
//! [`JobOutcome`](crate::outcome::JobOutcome) instead and never reaches this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TournamentError {
    /// Fewer than two agents could be loaded: there is nobody to pair.
    #[error("only {usable} usable agent(s) out of {total}, at least 2 are needed")]
    NotEnoughAgents { usable: usize, total: usize },

    /// The configuration cannot produce a valid run.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
