//! Reward shaping strategies.
//!
//! Each strategy accumulates a fixed set of named components from the
//! observation stream. The scalar fitness is always the sum of those
//! components, and both strategies end the episode when the time limit is
//! exceeded or a part that should stay off the ground touches it.

use std::collections::BTreeMap;

use crate::compute::environment::Observation;
use crate::schema::FitnessKind;

/// Target trunk speed for the forward-bonus strategy (3 km/h).
const TARGET_SPEED: f64 = 0.8333;

const ALIVE_KEYS: [&str; 5] = [
    "alive_bonus",
    "speed",
    "height_diff",
    "forces",
    "joints_at_limit",
];

const FORWARD_KEYS: [&str; 6] = [
    "forward_bonus",
    "alive_bonus",
    "speed",
    "speed_gap",
    "height_diff",
    "walk_straight",
];

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// `distance / time`, zero before any time has elapsed.
#[inline]
fn speed(distance: f64, time: f64) -> f64 {
    if time > 0.0 { distance / time } else { 0.0 }
}

/// Per-episode fitness accumulator.
#[derive(Debug, Clone)]
pub struct Fitness {
    kind: FitnessKind,
    duration: f64,
    timestep: f64,
    components: BTreeMap<&'static str, f64>,
    done: bool,
}

impl Fitness {
    pub fn new(kind: FitnessKind, duration: f64, timestep: f64) -> Self {
        let mut fitness = Self {
            kind,
            duration,
            timestep,
            components: BTreeMap::new(),
            done: false,
        };
        fitness.reset();
        fitness
    }

    /// Look a strategy up by name (`alive-bonus`, `forward-bonus`).
    pub fn from_name(
        name: &str,
        duration: f64,
        timestep: f64,
    ) -> Result<Self, crate::schema::FitnessError> {
        Ok(Self::new(name.parse()?, duration, timestep))
    }

    #[inline]
    pub fn kind(&self) -> FitnessKind {
        self.kind
    }

    fn keys(&self) -> &'static [&'static str] {
        match self.kind {
            FitnessKind::AliveBonus => &ALIVE_KEYS,
            FitnessKind::ForwardBonus => &FORWARD_KEYS,
        }
    }

    /// Zero every component and clear `done`.
    pub fn reset(&mut self) {
        self.components = self.keys().iter().map(|&key| (key, 0.0)).collect();
        self.done = false;
    }

    /// Named components.
    pub fn components(&self) -> &BTreeMap<&'static str, f64> {
        &self.components
    }

    pub fn component(&self, key: &str) -> Option<f64> {
        self.components.get(key).copied()
    }

    /// Sum of all components.
    pub fn fitness(&self) -> f64 {
        self.components.values().sum()
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Fold one tick into the components.
    ///
    /// `all` is the full history, ending with `last`; `forces` are the motor
    /// outputs applied during the tick and `time` is the elapsed simulated time.
    pub fn compute(&mut self, last: &Observation, all: &[Observation], forces: &[f64], time: f64) {
        let first = all.first().unwrap_or(last);
        match self.kind {
            FitnessKind::AliveBonus => self.alive_bonus(last, first, forces, time),
            FitnessKind::ForwardBonus => self.forward_bonus(last, first, all, time),
        }

        for value in self.components.values_mut() {
            *value = finite_or_zero(*value);
        }

        if time > self.duration || last.fell() {
            self.done = true;
        }
    }

    fn add(&mut self, key: &'static str, delta: f64) {
        *self.components.entry(key).or_insert(0.0) += finite_or_zero(delta);
    }

    fn set(&mut self, key: &'static str, value: f64) {
        self.components.insert(key, finite_or_zero(value));
    }

    fn alive_bonus(&mut self, last: &Observation, first: &Observation, forces: &[f64], time: f64) {
        if last.fell() {
            self.add("alive_bonus", -0.5);
        } else {
            self.add("alive_bonus", 0.5);
        }
        self.add("speed", speed(last.distance, time));
        self.add("height_diff", 0.1 * (last.position.y - first.position.y));
        self.set("forces", -0.2 * forces.iter().sum::<f64>().abs());
        self.set("joints_at_limit", -0.01 * last.joints_at_limit as f64);
    }

    fn forward_bonus(
        &mut self,
        last: &Observation,
        first: &Observation,
        all: &[Observation],
        time: f64,
    ) {
        if all.len() >= 2 {
            let previous = &all[all.len() - 2];
            if last.position.x > previous.position.x {
                self.add("forward_bonus", 0.02);
            } else {
                let remaining = if self.duration > 0.0 {
                    1.0 - time / self.duration
                } else {
                    0.0
                };
                self.add("forward_bonus", -0.05 * remaining);
            }
        }

        self.add("alive_bonus", self.timestep / 5.0);

        let current = speed(last.distance, time);
        self.set("speed", current);
        self.set("speed_gap", -3.0 * (TARGET_SPEED - current).abs());
        self.set("height_diff", -10.0 * (last.position.y - first.position.y).abs());
        let drift = last.position.z - first.position.z;
        self.set("walk_straight", -(drift * drift));
    }
}
