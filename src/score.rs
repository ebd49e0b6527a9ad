//! Scores, history and leaderboard, derived from the set of [`JobOutcome`]s.
//!
//! Folding is a sum of per-outcome contributions, so the result does not depend on the order in
//! which jobs finished. The leaderboard is always rebuilt from the full score table.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outcome::JobOutcome;

/// Who receives the points of a won game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreditPolicy {
    /// Only the agent whose move won the game.
    #[default]
    Winner,
    /// Both players: the maze is cooperative and the win belongs to the pair.
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub agent_id: String,
    pub score: u32,
}

impl fmt::Display for LeaderboardEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent_id, self.score)
    }
}

/// Per-agent cumulative score.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    credit: CreditPolicy,
    scores: BTreeMap<String, u32>,
}

impl ScoreAggregator {
    /// Aggregator where every agent of `agent_ids` starts at 0.
    pub fn new<I, S>(agent_ids: I, credit: CreditPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            credit,
            scores: agent_ids.into_iter().map(|id| (id.into(), 0)).collect(),
        }
    }

    /// Agents credited by `outcome` and the points each one gets.
    pub fn credits(&self, outcome: &JobOutcome) -> Vec<(String, u32)> {
        if !outcome.won || outcome.failure.is_some() {
            return vec![];
        }
        let points = outcome.level.points();
        match self.credit {
            CreditPolicy::Winner => outcome
                .winner
                .iter()
                .map(|winner| (winner.clone(), points))
                .collect(),
            CreditPolicy::Shared => vec![
                (outcome.agent_a.clone(), points),
                (outcome.agent_b.clone(), points),
            ],
        }
    }

    pub fn fold(&mut self, outcome: &JobOutcome) {
        // participants are always listed, even when they end up with 0
        for id in [&outcome.agent_a, &outcome.agent_b] {
            self.scores.entry(id.clone()).or_insert(0);
        }
        for (agent_id, points) in self.credits(outcome) {
            *self.scores.entry(agent_id).or_insert(0) += points;
        }
    }

    pub fn fold_all<'a>(mut self, outcomes: impl IntoIterator<Item = &'a JobOutcome>) -> Self {
        for outcome in outcomes {
            self.fold(outcome);
        }
        self
    }

    pub fn scores(&self) -> &BTreeMap<String, u32> {
        &self.scores
    }

    pub fn score(&self, agent_id: &str) -> Option<u32> {
        self.scores.get(agent_id).copied()
    }

    /// Score descending, then agent id ascending.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<_> = self
            .scores
            .iter()
            .map(|(agent_id, &score)| LeaderboardEntry {
                agent_id: agent_id.clone(),
                score,
            })
            .collect();
        // `scores` iterates in id order and the sort is stable
        entries.sort_by_key(|e| Reverse(e.score));
        entries
    }
}

/// Every outcome an agent took part in, by agent id.
///
/// Each outcome is listed under both of its players.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History(pub BTreeMap<String, Vec<JobOutcome>>);

impl History {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a JobOutcome>) -> Self {
        let mut history: BTreeMap<String, Vec<JobOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            for id in [&outcome.agent_a, &outcome.agent_b] {
                history.entry(id.clone()).or_default().push(outcome.clone());
            }
        }
        Self(history)
    }

    pub fn of(&self, agent_id: &str) -> &[JobOutcome] {
        self.0.get(agent_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Rebuild the scores from scratch. Outcomes listed twice count once.
    pub fn recompute(&self, credit: CreditPolicy) -> ScoreAggregator {
        let mut seen = BTreeSet::new();
        let unique = self
            .0
            .values()
            .flatten()
            .filter(|outcome| seen.insert(outcome.job_id));
        ScoreAggregator::new(self.0.keys().cloned(), credit).fold_all(unique)
    }
}
