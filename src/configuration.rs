//! Config for the evaluator behaviors
//!
//! This module provides configuration options for controlling the behavior of the evaluator.
//! Nothing is read from ambient state once a [`Configuration`] exists: the game service, the match
//! runner and the scheduler all receive it explicitly.
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set them to `"true"` to enable.
//!
//! - `EVAL_LOCAL`: Talk to a game server on `localhost` instead of the public one (default: `false`)
//! - `EVAL_API_URL`: Base URL of the game API, overrides `EVAL_LOCAL`
//! - `EVAL_WEBAPP_URL`: Base URL of the spectator web app, overrides `EVAL_LOCAL`
//! - `EVAL_MAX_WORKERS`: Maximum number of matches played at the same time (default: `100`)
//! - `EVAL_JOB_TIMEOUT_SECS`: Wall-clock budget of a single match (default: `600`)
//! - `EVAL_REQUEST_TIMEOUT_SECS`: Timeout of a single HTTP request (default: `30`)
//! - `EVAL_SHOWCASE_MATCHES`: Number of rate-limited games for spectators (default: `4`)
//! - `EVAL_SHOWCASE_DELAY_SECS`: Pause after creating a showcase game (default: `20`)
//! - `EVAL_SHARED_CREDIT`: Credit both players of a won game (default: `false`)
//! - `EVAL_VERBOSE`: Print progress to stdout (default: `true`)
//! - `EVAL_LOG`: Enable logging to a file (default: `false`)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::TournamentError;
use crate::score::CreditPolicy;
use crate::tournament_strategy::Level;

const REMOTE_API_URL: &str = "http://teamwork.vs.uni-kassel.de:16216";
const REMOTE_WEBAPP_URL: &str = "http://teamwork.vs.uni-kassel.de";
const LOCAL_API_URL: &str = "http://localhost:16216";
const LOCAL_WEBAPP_URL: &str = "http://localhost";

/// Configuration for evaluator behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) api_url: String,
    pub(crate) webapp_url: String,
    pub(crate) max_workers: usize,
    pub(crate) job_timeout: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) start_poll_interval: Duration,
    pub(crate) levels: Vec<Level>,
    pub(crate) showcase_matches: usize,
    pub(crate) showcase_delay: Duration,
    pub(crate) showcase_seed: Option<u64>,
    pub(crate) watch_file: Option<PathBuf>,
    pub(crate) credit: CreditPolicy,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The public CoMaze server is used.
    /// - At most 100 matches run at the same time, each limited to 10 minutes.
    /// - Every pair of agents plays all four levels.
    /// - 4 random games are rate limited for spectators, with a 20 seconds head start.
    /// - Only the agent whose move won the game is credited.
    /// - The evaluator prints match progress to stdout, logging to file is disabled.
    pub fn new() -> Self {
        Self {
            api_url: REMOTE_API_URL.to_owned(),
            webapp_url: REMOTE_WEBAPP_URL.to_owned(),
            max_workers: 100,
            job_timeout: Duration::from_secs(10 * 60),
            request_timeout: Duration::from_secs(30),
            start_poll_interval: Duration::from_secs(3),
            levels: Level::ALL.to_vec(),
            showcase_matches: 4,
            showcase_delay: Duration::from_secs(20),
            showcase_seed: None,
            watch_file: None,
            credit: CreditPolicy::Winner,
            verbose: true,
            log: false,
        }
    }

    /// Create configuration from environment variables (see module documentation).
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok()?.trim().parse().ok()
        }

        let mut config = Self::new().with_local(get_env_flag("EVAL_LOCAL", false));

        if let Ok(url) = std::env::var("EVAL_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("EVAL_WEBAPP_URL") {
            config.webapp_url = url;
        }
        if let Some(n) = get_env_parsed("EVAL_MAX_WORKERS") {
            config.max_workers = n;
        }
        if let Some(secs) = get_env_parsed("EVAL_JOB_TIMEOUT_SECS") {
            config.job_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get_env_parsed("EVAL_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = get_env_parsed("EVAL_SHOWCASE_MATCHES") {
            config.showcase_matches = n;
        }
        if let Some(secs) = get_env_parsed("EVAL_SHOWCASE_DELAY_SECS") {
            config.showcase_delay = Duration::from_secs(secs);
        }
        if get_env_flag("EVAL_SHARED_CREDIT", false) {
            config.credit = CreditPolicy::Shared;
        }
        config.verbose = get_env_flag("EVAL_VERBOSE", true);
        config.log = get_env_flag("EVAL_LOG", false);
        config
    }

    /// Switch between the public server and a server running on `localhost`.
    pub fn with_local(mut self, local: bool) -> Self {
        let (api, webapp) = if local {
            (LOCAL_API_URL, LOCAL_WEBAPP_URL)
        } else {
            (REMOTE_API_URL, REMOTE_WEBAPP_URL)
        };
        self.api_url = api.to_owned();
        self.webapp_url = webapp.to_owned();
        self
    }

    /// Base URL of the game API.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Base URL of the spectator web app (only used in log messages).
    pub fn with_webapp_url(mut self, url: impl Into<String>) -> Self {
        self.webapp_url = url.into();
        self
    }

    /// Maximum number of matches running at the same time. Extra jobs wait in a queue.
    pub fn with_max_workers(mut self, value: usize) -> Self {
        self.max_workers = value;
        self
    }

    /// Wall-clock budget of a single job, from dispatch to outcome.
    pub fn with_job_timeout(mut self, value: Duration) -> Self {
        self.job_timeout = value;
        self
    }

    /// Timeout of a single HTTP request to the game server.
    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    /// Delay between two state reads while waiting for a game to start.
    pub fn with_start_poll_interval(mut self, value: Duration) -> Self {
        self.start_poll_interval = value;
        self
    }

    /// Levels every pair plays.
    pub fn with_levels(mut self, levels: Vec<Level>) -> Self {
        self.levels = levels;
        self
    }

    /// Number of rate-limited games picked at random for spectators.
    pub fn with_showcase_matches(mut self, value: usize) -> Self {
        self.showcase_matches = value;
        self
    }

    /// Pause after creating a showcase game, before the players join.
    pub fn with_showcase_delay(mut self, value: Duration) -> Self {
        self.showcase_delay = value;
        self
    }

    /// Seed the random pick of showcase games.
    pub fn with_showcase_seed(mut self, seed: u64) -> Self {
        self.showcase_seed = Some(seed);
        self
    }

    /// Append the id of every showcase game to this file.
    pub fn with_watch_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch_file = Some(path.into());
        self
    }

    /// Who gets the points of a won game.
    pub fn with_credit_policy(mut self, credit: CreditPolicy) -> Self {
        self.credit = credit;
        self
    }

    /// Enable or disable progress output on stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn webapp_url(&self) -> &str {
        &self.webapp_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Check that a run with this configuration can make progress.
    pub fn validate(&self) -> Result<(), TournamentError> {
        let problem = if self.levels.is_empty() {
            "no level to play"
        } else if (1..self.levels.len()).any(|i| self.levels[..i].contains(&self.levels[i])) {
            "a level is listed more than once"
        } else if self.max_workers == 0 {
            "max_workers must be at least 1"
        } else if self.job_timeout.is_zero() {
            "job timeout must not be zero"
        } else {
            return Ok(());
        };
        Err(TournamentError::InvalidConfiguration(problem.to_owned()))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_switch() {
        let config = Configuration::new().with_local(true);
        assert_eq!(config.api_url(), "http://localhost:16216");
        assert_eq!(config.webapp_url(), "http://localhost");

        let config = config.with_local(false);
        assert_eq!(config.api_url(), REMOTE_API_URL);
    }

    #[test]
    fn test_builder() {
        let config = Configuration::new()
            .with_max_workers(3)
            .with_job_timeout(Duration::from_millis(250))
            .with_levels(vec![Level::Two])
            .with_credit_policy(CreditPolicy::Shared);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.job_timeout, Duration::from_millis(250));
        assert_eq!(config.levels, vec![Level::Two]);
        assert_eq!(config.credit, CreditPolicy::Shared);
    }

    #[test]
    fn test_validate() {
        assert!(Configuration::new().validate().is_ok());
        for config in [
            Configuration::new().with_levels(vec![]),
            Configuration::new().with_levels(vec![Level::One, Level::Three, Level::One]),
            Configuration::new().with_max_workers(0),
            Configuration::new().with_job_timeout(Duration::ZERO),
        ] {
            assert!(matches!(
                config.validate(),
                Err(TournamentError::InvalidConfiguration(_))
            ));
        }
    }
}
