//! Types shared with the optimizers: fitness strategy selection, episode
//! reports, and progress snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reward shaping strategy, selectable by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitnessKind {
    /// Rewards staying upright, forward speed and trunk height.
    #[default]
    AliveBonus,
    /// Rewards steady forward progress at a target speed in a straight line.
    ForwardBonus,
}

impl FitnessKind {
    pub const ALL: [FitnessKind; 2] = [FitnessKind::AliveBonus, FitnessKind::ForwardBonus];

    pub fn name(&self) -> &'static str {
        match self {
            FitnessKind::AliveBonus => "alive-bonus",
            FitnessKind::ForwardBonus => "forward-bonus",
        }
    }
}

impl fmt::Display for FitnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitnessKind {
    type Err = FitnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FitnessKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| FitnessError::UnknownStrategy(s.to_string()))
    }
}

/// Fitness strategy lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum FitnessError {
    #[error(
        "Fitness `{0}` is invalid, possible values are `alive-bonus`, `forward-bonus`"
    )]
    UnknownStrategy(String),
}

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Simulated time exceeded the configured duration.
    TimeLimit,
    /// The fitness strategy ended the episode (e.g. the creature fell).
    Fell,
    /// The interrupt handle was raised mid-episode.
    Interrupted,
}

/// Outcome of one complete (or interrupted) episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    /// Sum of the fitness components.
    pub fitness: f64,
    /// Named fitness components at episode end.
    pub components: BTreeMap<String, f64>,
    /// Number of control ticks executed.
    pub steps: usize,
    /// Simulated seconds at episode end.
    pub sim_time: f64,
    /// Net forward displacement of the trunk.
    pub distance: f64,
    /// Whether the episode was cut short by an interrupt.
    pub interrupted: bool,
    pub termination: Termination,
}

/// Progress snapshot for a population evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationProgress {
    /// Candidates evaluated so far.
    pub completed: usize,
    /// Candidates in the population.
    pub total: usize,
    /// Best fitness among completed candidates.
    pub best_fitness: Option<f64>,
    /// Candidates that failed with an error.
    pub failed: usize,
}

impl EvaluationProgress {
    #[inline]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
