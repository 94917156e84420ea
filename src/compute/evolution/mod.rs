//! Evolutionary search support for walking controllers.
//!
//! The optimizer itself is external; this module provides what it needs to
//! score candidates.
//!
//! # Overview
//!
//! - **Genome codec** (`genome`): flat force vectors to per-joint hold schedules
//! - **Fitness strategies** (`fitness`): named reward components and termination
//! - **Evaluation** (`search`): whole-episode scoring, one genome or a population
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "rapier")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use walking_sim::compute::RapierWorld;
//! use walking_sim::compute::evolution::{
//!     DEFAULT_FORCE_BOUND, GenerationalEvaluator, GenomeRng, random_genome,
//! };
//! use walking_sim::schema::{EnvironmentProps, SimulationConfig};
//!
//! let config = SimulationConfig::default();
//! let genome = random_genome(&config, &mut GenomeRng::new(42), DEFAULT_FORCE_BOUND);
//!
//! let mut evaluator =
//!     GenerationalEvaluator::new(RapierWorld::new(), config, EnvironmentProps::earth())?;
//! let report = evaluator.evaluate_report(&genome)?;
//! println!("fitness {:.3} after {} steps", report.fitness, report.steps);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rapier"))]
//! # fn main() {}
//! ```
//!
//! # Fitness strategies
//!
//! - `alive-bonus`: staying upright, speed, trunk height, effort and joint limits
//! - `forward-bonus`: steady forward progress near 3 km/h in a straight line

mod fitness;
mod genome;
mod search;

pub use fitness::Fitness;
pub use genome::{
    DEFAULT_FORCE_BOUND, ForceMatrix, GenomeError, GenomeRng, decode, encode, genome_intervals,
};
pub use search::{
    EvaluationError, GenerationalEvaluator, ProgressCallback, evaluate_population, genome_len,
    random_genome,
};
