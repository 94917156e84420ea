//! Boundary to the rigid-body physics engine.
//!
//! The simulation core never talks to a solver directly. It drives a
//! [`PhysicsWorld`], which owns bodies, constraint links and motors, and
//! advances simulated time. A `rapier3d` backed implementation is available
//! behind the `rapier` feature.

use std::fmt;

use nalgebra::Vector3;

use super::actuation::ActuationDriver;

#[cfg(feature = "rapier")]
mod rapier;
#[cfg(test)]
pub(crate) mod scripted;

#[cfg(feature = "rapier")]
pub use rapier::RapierWorld;

/// Collision family of the ground plane.
pub const GROUND_FAMILY: u32 = 1;

/// Handle to a rigid body owned by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// Handle to a passive constraint link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkHandle(pub usize);

/// Handle to an actuated joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorHandle(pub usize);

/// Rotation limits about a joint's Z axis, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub min: f64,
    pub max: f64,
}

impl JointLimits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Symmetric limits `[-angle, angle]`.
    pub fn symmetric(angle: f64) -> Self {
        Self::new(-angle, angle)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Whether `angle` lies within `threshold` of either bound.
    #[inline]
    pub fn is_at_limit(&self, angle: f64, threshold: f64) -> bool {
        angle >= threshold * self.max || angle <= threshold * self.min
    }
}

impl fmt::Display for JointLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}] rad", self.min, self.max)
    }
}

/// How a motor interprets its driver's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotorKind {
    /// Driver value is a torque in N·m.
    #[default]
    Torque,
    /// Driver value is a target angle in radians.
    Angle,
}

/// Everything a backend needs to create a box-shaped rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    /// Full extents of the box.
    pub size: Vector3<f64>,
    /// Centre of mass in world coordinates.
    pub position: Vector3<f64>,
    /// Mass density in kg/m^3.
    pub density: f64,
    pub friction: f64,
    /// Bodies sharing a family do not collide with each other.
    pub family: u32,
    /// Fixed bodies never move.
    pub fixed: bool,
}

impl BodyDesc {
    /// Dynamic body with the default bone material.
    pub fn segment(size: Vector3<f64>, position: Vector3<f64>, family: u32) -> Self {
        Self {
            size,
            position,
            density: 1000.0,
            friction: 0.5,
            family,
            fixed: false,
        }
    }

    /// Fixed 100 x 5 x 200 ground slab whose top face sits at y = 0.
    pub fn ground() -> Self {
        Self {
            size: Vector3::new(100.0, 5.0, 200.0),
            position: Vector3::new(0.0, -2.5, 0.0),
            density: 4000.0,
            friction: 0.5,
            family: GROUND_FAMILY,
            fixed: true,
        }
    }
}

/// Failures raised by a physics backend.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Physics step failed: {0}")]
    StepFailed(String),
    #[error("Unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },
    #[error("Invalid timestep {0}")]
    InvalidTimestep(f64),
}

impl EngineError {
    pub fn unknown_body(handle: BodyHandle) -> Self {
        EngineError::UnknownHandle {
            kind: "body",
            index: handle.0,
        }
    }

    pub fn unknown_link(handle: LinkHandle) -> Self {
        EngineError::UnknownHandle {
            kind: "link",
            index: handle.0,
        }
    }

    pub fn unknown_motor(handle: MotorHandle) -> Self {
        EngineError::UnknownHandle {
            kind: "motor",
            index: handle.0,
        }
    }
}

/// A rigid-body world the simulation core can build into and step.
///
/// Handles are only valid until the next [`PhysicsWorld::clear`].
pub trait PhysicsWorld {
    /// Remove every body, link and motor and rewind time to zero.
    fn clear(&mut self);

    fn set_gravity(&mut self, gravity: Vector3<f64>);

    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, EngineError>;

    /// Connect two bodies at a world-space anchor. `None` locks them rigidly;
    /// `Some` creates a revolute hinge about Z restricted to the limits.
    fn create_link(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor: Vector3<f64>,
        limits: Option<JointLimits>,
    ) -> Result<LinkHandle, EngineError>;

    /// Actuate the rotation about Z between two bodies at a world-space anchor.
    fn create_motor(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor: Vector3<f64>,
        kind: MotorKind,
    ) -> Result<MotorHandle, EngineError>;

    fn set_motor_driver(
        &mut self,
        motor: MotorHandle,
        driver: ActuationDriver,
    ) -> Result<(), EngineError>;

    /// Current driver of a motor.
    fn motor_driver(&self, motor: MotorHandle) -> Result<&ActuationDriver, EngineError>;

    /// Advance simulated time by exactly `dt` seconds.
    fn step(&mut self, dt: f64) -> Result<(), EngineError>;

    /// Simulated seconds since the last clear.
    fn time(&self) -> f64;

    fn body_position(&self, body: BodyHandle) -> Result<Vector3<f64>, EngineError>;

    /// Magnitude of the external contact force on a body; zero when untouched.
    fn contact_force(&self, body: BodyHandle) -> Result<f64, EngineError>;

    /// Relative rotation about Z of a link, in radians.
    fn link_angle(&self, link: LinkHandle) -> Result<f64, EngineError>;

    /// Relative rotation about Z of a motor, in radians.
    fn motor_rotation(&self, motor: MotorHandle) -> Result<f64, EngineError>;
}
