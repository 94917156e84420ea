//! Walking Sim - evolving locomotion controllers for articulated creatures.
//!
//! This crate bridges a search procedure (a genetic algorithm proposing
//! genomes, or a learner proposing per-step actions) and a rigid-body physics
//! simulation. Creatures are trees of box segments connected by hinges;
//! genomes decode into per-joint force schedules; every control tick is
//! observed and folded into a named-component fitness.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, environment descriptions and report types
//! - `compute`: Morphology, actuation, physics boundary, episodes and fitness
//!
//! The rigid-body solver sits behind the [`compute::PhysicsWorld`] trait. A
//! `rapier3d` implementation is available with the `rapier` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "rapier")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use walking_sim::{
//!     compute::{RapierWorld, StepEnvironment},
//!     schema::{EnvironmentProps, SimulationConfig},
//! };
//!
//! let mut env = StepEnvironment::new(
//!     RapierWorld::new(),
//!     SimulationConfig::default(),
//!     EnvironmentProps::moon(),
//! )?;
//! let (observation, _info) = env.reset()?;
//! println!("{} fitness components", observation.len());
//!
//! let action = vec![0.1; env.action_len()];
//! loop {
//!     let result = env.step(&action)?;
//!     if result.terminated || result.truncated {
//!         println!("reward {:.3}", result.reward);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rapier"))]
//! # fn main() {}
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{EpisodeEnvironment, Observation, PhysicsWorld, Simulation, StepEnvironment};
pub use schema::{CreatureKind, EnvironmentProps, EpisodeReport, FitnessKind, SimulationConfig};
