use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::agent::Agent;
use crate::error::TournamentError;

/// Something an [`Agent`] can be loaded from: a serialized policy, a plugin, a constructor...
///
/// Loading may fail; a failing source only removes that agent from the roster.
pub trait AgentSource {
    /// Human readable name, used in logs and in the list of excluded agents.
    fn name(&self) -> String;

    fn load(&self) -> anyhow::Result<Agent>;
}

impl<S: AgentSource + ?Sized> AgentSource for Box<S> {
    fn name(&self) -> String {
        self.as_ref().name()
    }

    fn load(&self) -> anyhow::Result<Agent> {
        self.as_ref().load()
    }
}

/// An [`AgentSource`] built from a name and a constructor closure.
pub struct FnSource<F> {
    name: String,
    load: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> anyhow::Result<Agent>,
{
    pub fn new(name: impl Into<String>, load: F) -> Self {
        Self {
            name: name.into(),
            load,
        }
    }
}

impl<F> AgentSource for FnSource<F>
where
    F: Fn() -> anyhow::Result<Agent>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> anyhow::Result<Agent> {
        (self.load)()
    }
}

/// Agents that made it into the tournament, plus the ones that did not.
#[derive(Debug)]
pub struct Roster {
    /// Usable agents, in source order.
    pub agents: Vec<Arc<Agent>>,
    /// `(source name, reason)` of every excluded source.
    pub excluded: Vec<(String, String)>,
}

/// Load every source, skipping (and reporting) the ones that fail or reuse an id.
///
/// # Errors
/// [`TournamentError::NotEnoughAgents`] when fewer than two agents remain.
#[instrument(skip_all)]
pub fn collect_agents<S: AgentSource>(
    sources: impl IntoIterator<Item = S>,
    verbose: bool,
) -> Result<Roster, TournamentError> {
    const RED: &str = "\x1b[31m";
    const GREEN: &str = "\x1b[32m";
    const RESET: &str = "\x1b[0m";

    let sources: Vec<S> = sources.into_iter().collect();
    let longest_name = sources.iter().fold(0, |acu, s| acu.max(s.name().len())) + 3; // at least 3 dots

    if verbose {
        println!("Loading agents...");
    }

    let mut agents: Vec<Arc<Agent>> = Vec::new();
    let mut excluded = Vec::new();
    let mut seen_ids = HashSet::new();

    for source in &sources {
        let name = source.name();
        if verbose {
            print!("Loading {name:·<longest_name$} ");
            let _ = std::io::stdout().flush(); // try to flush stdout
        }

        let reason = match source.load() {
            Ok(agent) if !seen_ids.insert(agent.id.clone()) => {
                format!("duplicate agent id '{}'", agent.id)
            }
            Ok(agent) => {
                info!("loaded agent {} from team {}", agent.id, agent.team_name);
                agents.push(Arc::new(agent));
                if verbose {
                    println!("{GREEN}Ok{RESET}");
                }
                continue;
            }
            Err(e) => format!("{e:#}"),
        };

        warn!("cannot load agent from '{name}': {reason}");
        if verbose {
            println!("{RED}{reason}{RESET}");
        }
        excluded.push((name, reason));
    }

    if agents.len() < 2 {
        return Err(TournamentError::NotEnoughAgents {
            usable: agents.len(),
            total: sources.len(),
        });
    }

    Ok(Roster { agents, excluded })
}
