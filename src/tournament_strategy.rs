//! Tournament strategies used by the evaluator to build the job list.
//!
//! A strategy receives the roster once and returns every [`PairingJob`] of the run up front. The
//! scheduler then executes the jobs in any order, so a strategy must not depend on results.
//!
//! # Provided Strategies
//! - [`LevelRoundRobin`]: every unordered pair of agents plays once at every level, with a few
//!   randomly picked showcase games slowed down for spectators.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::Agent;

/// Difficulty level of a maze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    /// Level 1.
    One = 1,
    /// Level 2.
    Two = 2,
    /// Level 3.
    Three = 3,
    /// Level 4.
    Four = 4,
}

impl Level {
    /// All levels, easiest first.
    pub const ALL: [Level; 4] = [Level::One, Level::Two, Level::Three, Level::Four];

    /// Level number, from 1 to 4.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Points for a won game at this level: `2L - 1`.
    pub fn points(self) -> u32 {
        2 * u32::from(self.number()) - 1
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::One),
            2 => Ok(Level::Two),
            3 => Ok(Level::Three),
            4 => Ok(Level::Four),
            n => Err(format!("no level {n}, expected 1 to 4")),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.number()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One scheduled match between two agents at one level.
#[derive(Debug, Clone)]
pub struct PairingJob {
    /// Position of the job in the generated list, unique within a run.
    pub job_id: usize,
    /// First player (attends and moves first).
    pub agent_a: Arc<Agent>,
    /// Second player.
    pub agent_b: Arc<Agent>,
    /// Maze difficulty.
    pub level: Level,
    /// Showcase game: created with a move rate limit so spectators can follow it.
    pub rate_limited: bool,
}

impl fmt::Display for PairingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} vs {} (lvl {})",
            self.job_id, self.agent_a.id, self.agent_b.id, self.level
        )
    }
}

/// Decides which jobs make up a tournament.
pub trait TournamentStrategy {
    /// Build every job of the run from the roster.
    fn generate_jobs(&mut self, agents: &[Arc<Agent>]) -> Vec<PairingJob>;
}

/// Every unordered pair of agents plays once per level.
///
/// Jobs are emitted level by level, and within a level in roster order (`i < j`). `showcase`
/// jobs, picked uniformly at random among all of them, are flagged as rate limited.
pub struct LevelRoundRobin {
    levels: Vec<Level>,
    showcase: usize,
    rng: StdRng,
}

impl LevelRoundRobin {
    /// Round robin over `levels` with `showcase` rate-limited games.
    ///
    /// A level listed twice is played once, at its first position.
    pub fn new(mut levels: Vec<Level>, showcase: usize) -> Self {
        let mut seen = HashSet::new();
        levels.retain(|&level| seen.insert(level));
        Self {
            levels,
            showcase,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Use a fixed seed for the showcase selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl TournamentStrategy for LevelRoundRobin {
    fn generate_jobs(&mut self, agents: &[Arc<Agent>]) -> Vec<PairingJob> {
        let n = agents.len();
        let mut jobs = Vec::with_capacity(self.levels.len() * n * n.saturating_sub(1) / 2);

        for &level in &self.levels {
            for i in 0..n {
                for j in (i + 1)..n {
                    jobs.push(PairingJob {
                        job_id: jobs.len(),
                        agent_a: agents[i].clone(),
                        agent_b: agents[j].clone(),
                        level,
                        rate_limited: false,
                    });
                }
            }
        }

        let showcase = self.showcase.min(jobs.len());
        for idx in index::sample(&mut self.rng, jobs.len(), showcase) {
            debug!("showcase game: {}", jobs[idx]);
            jobs[idx].rate_limited = true;
        }

        info!(
            "{} jobs generated ({} agents, {} levels, {showcase} showcase)",
            jobs.len(),
            n,
            self.levels.len()
        );
        jobs
    }
}
