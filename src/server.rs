//! Core evaluation logic for running a tournament against the game server.
//!
//! This module defines the [`Evaluator`] type, which orchestrates tournament execution.
//! Its responsibilities include:
//!
//! - Loading agents from a list of [`AgentSource`]s, excluding the ones that fail
//! - Generating one job per pair of agents and per level ([`LevelRoundRobin`])
//! - Running every job on the [`JobScheduler`] with bounded concurrency and a per-job timeout
//! - Aggregating the outcomes into scores, history and a leaderboard
//!
//! # Behavior & Configuration
//!
//! Behavior is controlled by a [`Configuration`] object: server URLs, number of workers, job and
//! request timeouts, showcase games, credit policy, verbosity and logging.
//!
//! A run never fails because of a single match: timeouts, rejected moves, network errors and
//! crashing agents all end up as a [`JobOutcome`] with a [`FailureKind`](crate::outcome::FailureKind).
//! The only fatal errors are an invalid configuration and a roster with fewer than two usable
//! agents.
//!
//! # Example
//!
//! See crate-level documentation for an example on how to use the `Evaluator`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace, warn};

use crate::agent_collector::{collect_agents, AgentSource};
use crate::configuration::Configuration;
use crate::game_interface::GameService;
use crate::http_service::HttpGameService;
use crate::logger::{init_logger, timestamp};
use crate::outcome::JobOutcome;
use crate::score::{CreditPolicy, History, LeaderboardEntry, ScoreAggregator};
use crate::tournament_scheduler::JobScheduler;
use crate::tournament_strategy::{LevelRoundRobin, TournamentStrategy};

/// Everything a tournament produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentReport {
    /// One outcome per job, in job order.
    pub outcomes: Vec<JobOutcome>,
    pub history: History,
    pub scores: BTreeMap<String, u32>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub credit: CreditPolicy,
    /// `(source name, reason)` of every agent that could not be loaded.
    pub excluded: Vec<(String, String)>,
    /// Server ids of the rate-limited games.
    pub showcase_games: Vec<String>,
}

impl TournamentReport {
    /// Write `performance_<ts>.json`, `leaderboard_<ts>.json` and `history_<ts>.json` in `dir`,
    /// creating it if needed, then the move log of every created game as `<game id>.json`.
    /// Returns the written paths, summaries first.
    pub fn save(&self, dir: impl AsRef<Path>) -> anyhow::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        let stamp = timestamp()?;

        let performance = dir.join(format!("performance_{stamp}.json"));
        write_json(&performance, &self.scores)?;
        let leaderboard = dir.join(format!("leaderboard_{stamp}.json"));
        write_json(&leaderboard, &self.leaderboard)?;
        let history = dir.join(format!("history_{stamp}.json"));
        write_json(&history, &self.history)?;
        let mut paths = vec![performance, leaderboard, history];

        for outcome in &self.outcomes {
            let Some(game_id) = &outcome.game_id else {
                continue;
            };
            let game = dir.join(format!("{}.json", file_stem(game_id)));
            write_json(&game, &outcome.moves)?;
            paths.push(game);
        }

        info!("report saved in {}", dir.display());
        Ok(paths)
    }
}

/// `game_id` with every character that does not belong in a file name replaced by `_`.
fn file_stem(game_id: &str) -> String {
    game_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("cannot write {}", path.display()))
}

/// The main type for running tournaments.
///
/// # Type Parameters
/// - `S`: the [`GameService`] matches are played on, [`HttpGameService`] outside of tests
pub struct Evaluator<S: GameService + ?Sized + 'static> {
    service: Arc<S>,
    config: Configuration,
}

impl Evaluator<HttpGameService> {
    /// Create an [`Evaluator`] playing on the HTTP server named by `config`.
    pub fn http(config: Configuration) -> anyhow::Result<Self> {
        let service = HttpGameService::new(&config)?;
        Self::new(Arc::new(service), config)
    }
}

impl<S: GameService + ?Sized + 'static> Evaluator<S> {
    /// Create an [`Evaluator`] playing on `service`.
    ///
    /// # Errors
    /// If `config.log` is set and the file logger cannot be installed.
    #[instrument(skip_all)]
    pub fn new(service: Arc<S>, config: Configuration) -> anyhow::Result<Self> {
        if config.log {
            init_logger()?;
        }
        trace!(?config);
        Ok(Self { service, config })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Execute a tournament between the agents of `sources`.
    ///
    /// Every pair of usable agents plays every configured level once.
    ///
    /// # Errors
    /// [`TournamentError`](crate::error::TournamentError) if the configuration is invalid or fewer
    /// than two agents can be loaded. No job is run in that case.
    pub fn evaluate<A: AgentSource>(
        &self,
        sources: impl IntoIterator<Item = A>,
    ) -> anyhow::Result<TournamentReport> {
        let verbose = self.config.verbose;
        self.config.validate()?;

        // 1. load agents
        let roster = collect_agents(sources, verbose)?;
        info!(
            "{} agents ready, {} excluded",
            roster.agents.len(),
            roster.excluded.len()
        );

        // 2. jobs
        let mut strategy =
            LevelRoundRobin::new(self.config.levels.clone(), self.config.showcase_matches);
        if let Some(seed) = self.config.showcase_seed {
            strategy = strategy.with_seed(seed);
        }
        let jobs = strategy.generate_jobs(&roster.agents);
        let showcase_jobs: Vec<usize> = jobs
            .iter()
            .filter(|job| job.rate_limited)
            .map(|job| job.job_id)
            .collect();
        if verbose {
            println!("Running {} matches...", jobs.len());
        }

        // 3. run
        let mut scheduler = JobScheduler::new(self.service.clone(), self.config.clone());
        if verbose {
            scheduler = scheduler.with_outcome_callback(print_outcome);
        }
        let outcomes = scheduler.run(jobs);
        self.clear_watch_file();

        // 4. aggregate
        let scores = ScoreAggregator::new(
            roster.agents.iter().map(|agent| agent.id.clone()),
            self.config.credit,
        )
        .fold_all(&outcomes);
        let leaderboard = scores.leaderboard();
        if verbose {
            print_leaderboard(&leaderboard);
        }

        let showcase_games = showcase_jobs
            .iter()
            .filter_map(|&job_id| outcomes[job_id].game_id.clone())
            .collect();

        Ok(TournamentReport {
            history: History::from_outcomes(&outcomes),
            scores: scores.scores().clone(),
            leaderboard,
            credit: self.config.credit,
            excluded: roster.excluded,
            showcase_games,
            outcomes,
        })
    }

    /// Every game is over, nothing left to watch.
    fn clear_watch_file(&self) {
        if let Some(path) = &self.config.watch_file {
            if path.exists() {
                if let Err(e) = File::create(path) {
                    warn!("could not clear {}: {e}", path.display());
                }
            }
        }
    }
}

fn print_outcome(outcome: &JobOutcome) {
    // clear line, green win, yellow loss, red failure
    let colour = match (outcome.won, outcome.failure) {
        (true, _) => "\x1b[32m",
        (false, None) => "\x1b[33m",
        (false, Some(_)) => "\x1b[31m",
    };
    println!("\x1b[2K{colour}{outcome}\x1b[39m");
}

fn print_leaderboard(leaderboard: &[LeaderboardEntry]) {
    let width = leaderboard
        .iter()
        .fold(0, |acu, e| acu.max(e.agent_id.len()))
        + 3;
    println!("Leaderboard:");
    for (rank, entry) in leaderboard.iter().enumerate() {
        println!(
            "{:>3}. {:·<width$} {}",
            rank + 1,
            entry.agent_id,
            entry.score
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::agent::Agent;
    use crate::agent_collector::FnSource;
    use crate::error::TournamentError;
    use crate::game_interface::{Action, GameSnapshot, Move};
    use crate::outcome::{FailureKind, MoveRecord};
    use crate::test_util::ScriptedService;
    use crate::tournament_strategy::Level;

    fn source(id: &'static str, action: Action) -> Box<dyn AgentSource> {
        Box::new(FnSource::new(id, move || {
            Ok(Agent::new(id, "team", move |_: &GameSnapshot| {
                Move::new(action)
            }))
        }))
    }

    fn config() -> Configuration {
        Configuration::new()
            .with_verbose(false)
            .with_start_poll_interval(Duration::from_millis(1))
            .with_showcase_delay(Duration::ZERO)
            .with_showcase_seed(7)
    }

    #[test]
    fn test_evaluate_scores_every_level() {
        // one goal: the first player always wins on its first move
        let evaluator = Evaluator::new(Arc::new(ScriptedService::new(1)), config()).unwrap();
        let report = evaluator
            .evaluate(vec![
                source("a", Action::Right),
                source("b", Action::Right),
                source("c", Action::Right),
            ])
            .unwrap();

        assert_eq!(report.outcomes.len(), 4 * 3);
        assert_eq!(report.showcase_games.len(), 4);
        // a is first in both its pairs, b in one, c never: 2 * 16 and 16
        assert_eq!(report.scores["a"], 32);
        assert_eq!(report.scores["b"], 16);
        assert_eq!(report.scores["c"], 0);
        let ids: Vec<_> = report
            .leaderboard
            .iter()
            .map(|e| e.agent_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.history.of("c").len(), 8);
    }

    #[test]
    fn test_shared_credit() {
        let evaluator = Evaluator::new(
            Arc::new(ScriptedService::new(1)),
            config()
                .with_levels(vec![Level::Two])
                .with_credit_policy(CreditPolicy::Shared),
        )
        .unwrap();
        let report = evaluator
            .evaluate(vec![source("a", Action::Right), source("b", Action::Up)])
            .unwrap();
        assert_eq!(report.scores["a"], 3);
        assert_eq!(report.scores["b"], 3);
    }

    #[test]
    fn test_not_enough_agents_runs_nothing() {
        let service = Arc::new(ScriptedService::new(1));
        let evaluator = Evaluator::new(service.clone(), config()).unwrap();
        let broken: Box<dyn AgentSource> =
            Box::new(FnSource::new("broken", || anyhow::bail!("unreadable")));
        let err = evaluator
            .evaluate(vec![source("a", Action::Right), broken])
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TournamentError>(),
            Some(TournamentError::NotEnoughAgents { usable: 1, total: 2 })
        ));
        assert!(service.created_games().is_empty());
    }

    #[test]
    fn test_failed_matches_score_nothing() {
        let service = Arc::new(ScriptedService::new(1));
        service.disconnect();
        let evaluator = Evaluator::new(service, config()).unwrap();
        let report = evaluator
            .evaluate(vec![source("a", Action::Right), source("b", Action::Right)])
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.failure == Some(FailureKind::Transport)));
        assert!(report.showcase_games.is_empty());
        assert_eq!(report.scores.values().sum::<u32>(), 0);
    }

    #[test]
    fn test_watch_file_cleared_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let watch = dir.path().join("path_ids_towatch.txt");
        let evaluator = Evaluator::new(
            Arc::new(ScriptedService::new(1)),
            config().with_watch_file(&watch),
        )
        .unwrap();
        let report = evaluator
            .evaluate(vec![source("a", Action::Right), source("b", Action::Right)])
            .unwrap();

        assert_eq!(report.showcase_games.len(), 4);
        assert_eq!(fs::read_to_string(&watch).unwrap(), "");
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = Evaluator::new(Arc::new(ScriptedService::new(1)), config()).unwrap();
        let report = evaluator
            .evaluate(vec![source("a", Action::Right), source("b", Action::Right)])
            .unwrap();

        let paths = report.save(dir.path().join("logging")).unwrap();
        assert_eq!(paths.len(), 3 + report.outcomes.len());
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[0].starts_with("performance_"));
        assert!(names[1].starts_with("leaderboard_"));
        assert!(names[2].starts_with("history_"));

        let scores: BTreeMap<String, u32> =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(scores, report.scores);
        let history: History =
            serde_json::from_str(&fs::read_to_string(&paths[2]).unwrap()).unwrap();
        assert_eq!(history.recompute(report.credit).leaderboard(), report.leaderboard);

        for (outcome, path) in report.outcomes.iter().zip(&paths[3..]) {
            let game_id = outcome.game_id.as_deref().unwrap();
            assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("{game_id}.json"));
            let moves: Vec<MoveRecord> =
                serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(moves, outcome.moves);
            // one goal: the first mover wins on its first move
            assert_eq!(moves.len(), 1);
            assert_eq!(moves[0].agent_id, outcome.agent_a);
            assert_eq!(moves[0].action, Action::Right);
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("game-1"), "game-1");
        assert_eq!(file_stem("../a b/c"), "___a_b_c");
    }
}
