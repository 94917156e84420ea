//! Compute module - creatures, physics stepping and episode evaluation.

mod actuation;
mod creature;
mod environment;
mod learning;
mod morphology;
mod simulation;

pub mod evolution;
pub mod physics;

pub use actuation::*;
pub use creature::*;
pub use environment::*;
pub use learning::*;
pub use morphology::*;
#[cfg(feature = "rapier")]
pub use physics::RapierWorld;
pub use physics::{
    BodyDesc, BodyHandle, EngineError, GROUND_FAMILY, JointLimits, LinkHandle, MotorHandle,
    MotorKind, PhysicsWorld,
};
pub use simulation::*;
