//! Whole-episode evaluation for generational search.
//!
//! The genetic algorithm itself lives outside this crate; it hands genomes to
//! a [`GenerationalEvaluator`] (one at a time) or to [`evaluate_population`]
//! (a whole generation, fanned out across threads).

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::genome::{GenomeError, GenomeRng, decode};
use crate::compute::creature;
use crate::compute::environment::EnvironmentError;
use crate::compute::physics::PhysicsWorld;
use crate::compute::simulation::Simulation;
use crate::schema::{
    ConfigError, EnvironmentProps, EpisodeReport, EvaluationProgress, SimulationConfig,
};

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(&EvaluationProgress) + Send + Sync>;

/// Errors raised while evaluating a genome.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Invalid genome: {0}")]
    Genome(#[from] GenomeError),
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Genome length for a configuration: motors × control intervals.
pub fn genome_len(config: &SimulationConfig) -> usize {
    creature::motor_count(config.creature) * config.intervals()
}

/// Uniform random genome for a configuration.
pub fn random_genome(config: &SimulationConfig, rng: &mut GenomeRng, bound: f64) -> Vec<f64> {
    rng.random_genome(genome_len(config), bound)
}

/// Runs one full episode per genome on a single world.
pub struct GenerationalEvaluator<W: PhysicsWorld> {
    sim: Simulation<W>,
}

impl<W: PhysicsWorld> GenerationalEvaluator<W> {
    pub fn new(
        world: W,
        config: SimulationConfig,
        props: EnvironmentProps,
    ) -> Result<Self, EvaluationError> {
        Ok(Self {
            sim: Simulation::new(world, config, props)?,
        })
    }

    /// Share a cancellation flag, e.g. across a population.
    pub fn with_cancel_handle(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.sim = self.sim.with_interrupt(cancel);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.sim.interrupt_handle()
    }

    pub fn genome_len(&self) -> usize {
        genome_len(self.sim.config())
    }

    pub fn simulation(&self) -> &Simulation<W> {
        &self.sim
    }

    /// Fitness of `genome` after a complete episode.
    pub fn evaluate(&mut self, genome: &[f64]) -> Result<f64, EvaluationError> {
        Ok(self.evaluate_report(genome)?.fitness)
    }

    pub fn evaluate_report(&mut self, genome: &[f64]) -> Result<EpisodeReport, EvaluationError> {
        let config = self.sim.config();
        let joints = creature::motor_count(config.creature);
        let forces = decode(genome, joints, config.intervals())?;
        Ok(self.sim.run_schedule(&forces)?)
    }
}

struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
    best: Mutex<Option<f64>>,
    total: usize,
}

impl Tally {
    fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            best: Mutex::new(None),
            total,
        }
    }

    fn record(
        &self,
        result: &Result<EpisodeReport, EvaluationError>,
        progress: Option<&ProgressCallback>,
    ) {
        let best_fitness = {
            let mut best = self.best.lock().unwrap_or_else(|e| e.into_inner());
            match result {
                Ok(report) => {
                    if (*best).is_none_or(|b| report.fitness > b) {
                        *best = Some(report.fitness);
                    }
                }
                Err(err) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("candidate evaluation failed: {err}");
                }
            }
            *best
        };
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(callback) = progress {
            callback(&EvaluationProgress {
                completed,
                total: self.total,
                best_fitness,
                failed: self.failed.load(Ordering::Relaxed),
            });
        }
    }
}

/// Evaluate every genome in its own freshly built world.
///
/// Results come back in input order. A failing candidate yields its error
/// without affecting the others; `progress` is called once per finished
/// candidate, in completion order. Every episode watches `cancel`: once it
/// is raised, running and pending candidates return interrupted reports.
pub fn evaluate_population<W, F>(
    factory: F,
    config: &SimulationConfig,
    props: &EnvironmentProps,
    genomes: &[Vec<f64>],
    progress: Option<&ProgressCallback>,
    cancel: Option<&Arc<AtomicBool>>,
) -> Vec<Result<EpisodeReport, EvaluationError>>
where
    W: PhysicsWorld,
    F: Fn() -> W + Sync,
{
    let tally = Tally::new(genomes.len());
    let run = |genome: &Vec<f64>| {
        let result = GenerationalEvaluator::new(factory(), config.clone(), props.clone())
            .map(|evaluator| match cancel {
                Some(cancel) => evaluator.with_cancel_handle(Arc::clone(cancel)),
                None => evaluator,
            })
            .and_then(|mut evaluator| evaluator.evaluate_report(genome));
        tally.record(&result, progress);
        result
    };

    #[cfg(not(target_arch = "wasm32"))]
    let results: Vec<_> = genomes.par_iter().map(run).collect();
    #[cfg(target_arch = "wasm32")]
    let results: Vec<_> = genomes.iter().map(run).collect();

    log::debug!(
        "evaluated {} candidates, {} failed",
        genomes.len(),
        tally.failed.load(Ordering::Relaxed)
    );
    results
}
