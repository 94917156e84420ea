//! Episode driver coupling one environment with one fitness strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::environment::{EnvironmentError, EpisodeEnvironment, Visualizer};
use super::evolution::{ForceMatrix, Fitness};
use super::physics::PhysicsWorld;
use crate::schema::{ConfigError, EnvironmentProps, EpisodeReport, SimulationConfig, Termination};

/// A physics environment plus the settings and fitness of one episode.
pub struct Simulation<W: PhysicsWorld> {
    env: EpisodeEnvironment<W>,
    fitness: Fitness,
    config: SimulationConfig,
    props: EnvironmentProps,
    interrupt: Arc<AtomicBool>,
    steps: usize,
}

impl<W: PhysicsWorld> Simulation<W> {
    pub fn new(
        world: W,
        config: SimulationConfig,
        props: EnvironmentProps,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.duration == 0.0 {
            log::warn!("episode duration is zero, every episode ends immediately");
        }
        let env = EpisodeEnvironment::new(world, config.creature)
            .with_joint_limit_threshold(config.joint_limit_threshold);
        let fitness = Fitness::new(config.fitness, config.duration, config.timestep);
        Ok(Self {
            env,
            fitness,
            config,
            props,
            interrupt: Arc::new(AtomicBool::new(false)),
            steps: 0,
        })
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.env = self.env.with_visualizer(visualizer);
        self
    }

    /// Share an interrupt flag with other simulations.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Flag checked before every tick of [`Simulation::run_schedule`].
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn environment(&self) -> &EpisodeEnvironment<W> {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut EpisodeEnvironment<W> {
        &mut self.env
    }

    pub fn fitness(&self) -> &Fitness {
        &self.fitness
    }

    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Motors of the creature; zero before the first reset.
    pub fn motor_count(&self) -> usize {
        self.env.motor_count()
    }

    /// Start a new episode.
    pub fn reset(&mut self) -> Result<(), EnvironmentError> {
        self.env.reset(&self.props)?;
        self.fitness.reset();
        self.steps = 0;
        Ok(())
    }

    /// Apply one action per motor, scaled by the configured gain, and score
    /// the resulting tick.
    ///
    /// The tick that ends the episode also finishes the environment, so a
    /// further step fails with [`EnvironmentError::EpisodeFinished`].
    pub fn step(&mut self, action: &[f64]) -> Result<(), EnvironmentError> {
        let scaled: Vec<f64> = action.iter().map(|a| a * self.config.gain).collect();
        let applied = scaled[..self.env.motor_count().min(scaled.len())].to_vec();
        self.env.step(&scaled, self.config.timestep)?;
        self.score(&applied)?;
        if self.is_over() {
            self.env.finish();
        }
        Ok(())
    }

    /// Whether the fitness strategy or the clock ended the episode.
    pub fn is_over(&self) -> bool {
        self.fitness.done()
            || self.env.time() > self.config.duration
            || self.config.duration <= 0.0
    }

    /// Current total fitness.
    #[inline]
    pub fn reward(&self) -> f64 {
        self.fitness.fitness()
    }

    pub fn components(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.fitness.components().iter().map(|(&k, &v)| (k, v))
    }

    /// Why the current episode ended, assuming it is over.
    pub fn termination(&self) -> Termination {
        match self.env.last_observation() {
            Some(last) if last.fell() => Termination::Fell,
            _ => Termination::TimeLimit,
        }
    }

    /// Play a whole episode with `forces` installed as hold schedules.
    ///
    /// Raising the interrupt handle stops the episode before the next tick;
    /// the report then carries the partial fitness and `interrupted`.
    pub fn run_schedule(&mut self, forces: &ForceMatrix) -> Result<EpisodeReport, EnvironmentError> {
        self.reset()?;
        let window = if self.config.duration > 0.0 && forces.intervals() > 0 {
            self.config.duration / forces.intervals() as f64
        } else {
            self.config.timestep
        };
        self.env.install_schedule(forces, window)?;

        let max_ticks = self.config.max_ticks();
        while !self.is_over() && self.steps < max_ticks {
            if self.interrupt.load(Ordering::Relaxed) {
                log::warn!(
                    "episode interrupted after {} steps at t={:.3}",
                    self.steps,
                    self.env.time()
                );
                self.env.finish();
                return Ok(self.report(true));
            }

            let applied = self.env.applied_forces()?;
            self.env.advance(self.config.timestep)?;
            self.score(&applied)?;
            self.env.render()?;
        }

        self.env.finish();
        let report = self.report(false);
        log::debug!(
            "episode over: {:?} after {} steps, fitness {:.4}, distance {:.3}",
            report.termination,
            report.steps,
            report.fitness,
            report.distance
        );
        Ok(report)
    }

    /// Hand the current frame to the visualizer, if any.
    pub fn render(&mut self) -> Result<(), EnvironmentError> {
        self.env.render()
    }

    /// Release the visualizer, if any.
    pub fn close(&mut self) {
        self.env.close();
    }

    pub fn into_world(self) -> W {
        self.env.into_world()
    }

    fn score(&mut self, applied: &[f64]) -> Result<(), EnvironmentError> {
        let all = self.env.observations();
        let last = all.last().ok_or(EnvironmentError::NotReset)?;
        self.fitness.compute(last, all, applied, self.env.time());
        self.steps += 1;
        Ok(())
    }

    fn report(&self, interrupted: bool) -> EpisodeReport {
        EpisodeReport {
            fitness: self.fitness.fitness(),
            components: self
                .fitness
                .components()
                .iter()
                .map(|(&k, &v)| (k.to_string(), v))
                .collect(),
            steps: self.steps,
            sim_time: self.env.time(),
            distance: self.env.last_observation().map_or(0.0, |o| o.distance),
            interrupted,
            termination: if interrupted {
                Termination::Interrupted
            } else {
                self.termination()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::EpisodePhase;
    use crate::compute::evolution::decode;
    use crate::compute::physics::scripted::ScriptedWorld;
    use crate::schema::{CreatureKind, FitnessKind};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn config(timestep: f64, duration: f64) -> SimulationConfig {
        SimulationConfig {
            timestep,
            duration,
            ..Default::default()
        }
    }

    fn sim(world: ScriptedWorld, config: SimulationConfig) -> Simulation<ScriptedWorld> {
        Simulation::new(world, config, EnvironmentProps::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Simulation::new(
            ScriptedWorld::new(),
            config(-1.0, 5.0),
            EnvironmentProps::default(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidTimeStep(_))));
    }

    #[test]
    fn test_done_by_step_51() {
        let mut sim = sim(ScriptedWorld::new(), config(0.1, 5.0));
        sim.reset().unwrap();
        let mut steps = 0;
        while !sim.is_over() {
            sim.step(&[0.0; 8]).unwrap();
            steps += 1;
            assert!(steps <= 51, "still running after {steps} steps");
        }
        assert!(steps >= 50);
        assert!(sim.fitness().done());
    }

    #[test]
    fn test_reset_clears_done() {
        let mut sim = sim(ScriptedWorld::new().touch_at(1, 0.0), config(0.1, 5.0));
        sim.reset().unwrap();
        sim.step(&[0.0; 8]).unwrap();
        assert!(sim.is_over());
        assert_eq!(sim.termination(), Termination::Fell);

        sim.reset().unwrap();
        assert!(!sim.fitness().done());
        assert_eq!(sim.reward(), 0.0);
        assert_eq!(sim.steps(), 0);
    }

    #[test]
    fn test_zero_duration_is_over_immediately() {
        let mut sim = sim(ScriptedWorld::new(), config(0.1, 0.0));
        sim.reset().unwrap();
        assert!(sim.is_over());
        let report = sim.run_schedule(&decode(&[0.0; 8], 8, 1).unwrap()).unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.termination, Termination::TimeLimit);
    }

    #[test]
    fn test_step_after_fall_is_rejected() {
        let mut sim = sim(ScriptedWorld::new().touch_at(1, 0.0), config(0.1, 5.0));
        sim.reset().unwrap();
        sim.step(&[0.0; 8]).unwrap();
        assert!(sim.is_over());
        assert_eq!(sim.environment().phase(), EpisodePhase::Done);

        let reward = sim.reward();
        assert!(matches!(
            sim.step(&[0.0; 8]),
            Err(EnvironmentError::EpisodeFinished)
        ));
        assert_eq!(sim.reward(), reward);
        assert_eq!(sim.steps(), 1);
    }

    #[test]
    fn test_gain_scales_actions() {
        let mut cfg = config(0.1, 5.0);
        cfg.gain = 10.0;
        let mut sim = sim(ScriptedWorld::new(), cfg);
        sim.reset().unwrap();
        sim.step(&[1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let log = &sim.environment().world().forces_log;
        assert_eq!(log[0][0], 10.0);
        assert_eq!(log[0][1], 20.0);
        // forces term: -0.2 * |10 + 20|
        assert_relative_eq!(sim.fitness().component("forces").unwrap(), -6.0);
    }

    #[test]
    fn test_short_action_errors() {
        let mut sim = sim(ScriptedWorld::new(), config(0.1, 5.0));
        sim.reset().unwrap();
        assert!(matches!(
            sim.step(&[0.0; 3]),
            Err(EnvironmentError::InsufficientAction { .. })
        ));
        assert_eq!(sim.steps(), 0);
    }

    #[test]
    fn test_run_schedule_time_limit() {
        let world = ScriptedWorld::moving(Vector3::new(0.2, 0.0, 0.0));
        let mut cfg = config(0.1, 1.0);
        cfg.fitness = FitnessKind::ForwardBonus;
        let mut sim = sim(world, cfg);
        let genome = vec![100.0; 8 * sim.config().intervals()];
        let forces = decode(&genome, 8, sim.config().intervals()).unwrap();

        let report = sim.run_schedule(&forces).unwrap();
        assert_eq!(report.termination, Termination::TimeLimit);
        assert!(!report.interrupted);
        assert_eq!(report.steps, 11);
        assert!(report.sim_time > 1.0);
        assert_relative_eq!(report.distance, 0.2 * report.sim_time, epsilon = 1e-9);
        assert_eq!(report.components.len(), 6);
        assert_relative_eq!(report.fitness, report.components.values().sum::<f64>());
        assert!(sim.environment().world().forces_log.iter().all(|f| f == &vec![100.0; 8]));
    }

    #[test]
    fn test_run_schedule_stops_on_fall() {
        let world = ScriptedWorld::new().touch_at(1, 0.25);
        let mut sim = sim(world, config(0.1, 5.0));
        let forces = decode(&vec![0.0; 8 * 50], 8, 50).unwrap();
        let report = sim.run_schedule(&forces).unwrap();
        assert_eq!(report.termination, Termination::Fell);
        assert_eq!(report.steps, 3);
    }

    #[test]
    fn test_interrupt_returns_partial_report() {
        let mut sim = sim(ScriptedWorld::new(), config(0.1, 5.0));
        sim.interrupt_handle().store(true, Ordering::Relaxed);
        let forces = decode(&vec![0.0; 8 * 50], 8, 50).unwrap();
        let report = sim.run_schedule(&forces).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.termination, Termination::Interrupted);
        assert_eq!(report.steps, 0);
        assert!(matches!(
            sim.environment_mut().advance(0.1),
            Err(EnvironmentError::EpisodeFinished)
        ));
    }

    #[test]
    fn test_run_schedule_rejects_wrong_shape() {
        let mut sim = Simulation::new(
            ScriptedWorld::new(),
            SimulationConfig {
                creature: CreatureKind::Bipede,
                ..config(0.1, 1.0)
            },
            EnvironmentProps::default(),
        )
        .unwrap();
        let forces = decode(&[0.0; 80], 8, 10).unwrap();
        assert!(matches!(
            sim.run_schedule(&forces),
            Err(EnvironmentError::Genome(_))
        ));
    }
}
