//! Configuration types for walking simulation episodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FitnessKind;

fn default_timestep() -> f64 {
    0.01
}

fn default_duration() -> f64 {
    5.0
}

fn default_gain() -> f64 {
    1.0
}

fn default_joint_limit_threshold() -> f64 {
    0.99
}

/// Top-level episode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Body plan to spawn on every reset.
    #[serde(default)]
    pub creature: CreatureKind,
    /// Reward shaping strategy.
    #[serde(default)]
    pub fitness: FitnessKind,
    /// Simulated seconds advanced per control tick.
    #[serde(default = "default_timestep")]
    pub timestep: f64,
    /// Fixed episode length in simulated seconds.
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Multiplier applied to externally supplied actions.
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Fraction of a joint's rotation limit at which it counts as "at limit".
    #[serde(default = "default_joint_limit_threshold")]
    pub joint_limit_threshold: f64,
    /// Random seed for reproducible genome generation.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            creature: CreatureKind::default(),
            fitness: FitnessKind::default(),
            timestep: default_timestep(),
            duration: default_duration(),
            gain: default_gain(),
            joint_limit_threshold: default_joint_limit_threshold(),
            random_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Number of control intervals a genome spans for this episode length.
    #[inline]
    pub fn intervals(&self) -> usize {
        crate::compute::evolution::genome_intervals(self.duration, self.timestep)
    }

    /// Number of ticks after which the time limit is guaranteed to be exceeded.
    pub fn max_ticks(&self) -> usize {
        if self.timestep <= 0.0 || self.duration <= 0.0 {
            return 0;
        }
        (self.duration / self.timestep).floor() as usize + 1
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(ConfigError::InvalidTimeStep(self.timestep));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ConfigError::InvalidDuration(self.duration));
        }
        if !self.gain.is_finite() {
            return Err(ConfigError::InvalidGain(self.gain));
        }
        if !(self.joint_limit_threshold > 0.0 && self.joint_limit_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.joint_limit_threshold));
        }
        Ok(())
    }
}

/// Built-in body plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatureKind {
    /// Four legs, two motorized joints per leg.
    #[default]
    Quadrupede,
    /// Two legs with locked feet, two motorized joints per leg.
    Bipede,
}

impl CreatureKind {
    pub fn name(&self) -> &'static str {
        match self {
            CreatureKind::Quadrupede => "quadrupede",
            CreatureKind::Bipede => "bipede",
        }
    }
}

impl fmt::Display for CreatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CreatureKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quadrupede" => Ok(CreatureKind::Quadrupede),
            "bipede" => Ok(CreatureKind::Bipede),
            other => Err(ConfigError::UnknownCreature(other.to_string())),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("Duration must be non-negative and finite, got {0}")]
    InvalidDuration(f64),
    #[error("Gain must be finite, got {0}")]
    InvalidGain(f64),
    #[error("Joint limit threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("Unknown creature `{0}`, possible values are `quadrupede`, `bipede`")]
    UnknownCreature(String),
    #[error("Environment `{name}` could not be read: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Environment `{name}` is not valid JSON: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
