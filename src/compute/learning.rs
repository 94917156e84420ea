//! Step-wise reset/step interface for online learners.
//!
//! Every step returns the fitness components as the observation vector (in
//! key order) and the total fitness as the reward. An episode that ends on
//! the clock is reported as `truncated`, one the strategy ends early (a fall)
//! as `terminated`.

use std::collections::BTreeMap;

use super::environment::{EnvironmentError, Visualizer};
use super::physics::PhysicsWorld;
use super::simulation::Simulation;
use crate::schema::{ConfigError, EnvironmentProps, SimulationConfig};

/// Action gain used when a learner does not configure one.
pub const DEFAULT_LEARNING_GAIN: f64 = 1000.0;

/// Outcome of one learner step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: BTreeMap<String, f64>,
}

/// Gym-style wrapper around a [`Simulation`].
pub struct StepEnvironment<W: PhysicsWorld> {
    sim: Simulation<W>,
}

impl<W: PhysicsWorld> StepEnvironment<W> {
    /// Wrap a simulation, scaling actions by [`DEFAULT_LEARNING_GAIN`].
    pub fn new(
        world: W,
        config: SimulationConfig,
        props: EnvironmentProps,
    ) -> Result<Self, ConfigError> {
        Self::with_gain(world, config, props, DEFAULT_LEARNING_GAIN)
    }

    pub fn with_gain(
        world: W,
        config: SimulationConfig,
        props: EnvironmentProps,
        gain: f64,
    ) -> Result<Self, ConfigError> {
        let config = SimulationConfig { gain, ..config };
        Ok(Self {
            sim: Simulation::new(world, config, props)?,
        })
    }

    /// Render every step through `visualizer`.
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.sim = self.sim.with_visualizer(visualizer);
        self
    }

    pub fn simulation(&self) -> &Simulation<W> {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation<W> {
        &mut self.sim
    }

    /// Length of the action vector expected by [`StepEnvironment::step`].
    pub fn action_len(&self) -> usize {
        self.sim.motor_count()
    }

    /// Start a new episode and return the initial observation and info.
    pub fn reset(&mut self) -> Result<(Vec<f64>, BTreeMap<String, f64>), EnvironmentError> {
        self.sim.reset()?;
        Ok((self.observation(), self.info()))
    }

    pub fn step(&mut self, action: &[f64]) -> Result<StepResult, EnvironmentError> {
        self.sim.step(action)?;
        self.sim.render()?;

        let over = self.sim.is_over();
        let fell = self
            .sim
            .environment()
            .last_observation()
            .is_some_and(|o| o.fell());
        let terminated = over && fell;
        let truncated = over && !fell;
        if over {
            log::debug!(
                "learning episode over after {} steps, reward {:.4}",
                self.sim.steps(),
                self.sim.reward()
            );
        }

        Ok(StepResult {
            observation: self.observation(),
            reward: self.sim.reward(),
            terminated,
            truncated,
            info: self.info(),
        })
    }

    /// Push the current frame to the visualizer, if any.
    pub fn render(&mut self) -> Result<(), EnvironmentError> {
        self.sim.render()
    }

    /// Release the visualizer, if any.
    pub fn close(&mut self) {
        self.sim.close();
    }

    fn observation(&self) -> Vec<f64> {
        self.sim.components().map(|(_, v)| v).collect()
    }

    fn info(&self) -> BTreeMap<String, f64> {
        let mut info: BTreeMap<String, f64> = self
            .sim
            .components()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let env = self.sim.environment();
        info.insert("time".to_string(), env.time());
        info.insert(
            "distance".to_string(),
            env.last_observation().map_or(0.0, |o| o.distance),
        );
        info
    }
}
