//! `rapier3d` backend.
//!
//! Rapier runs in single precision with its own nalgebra version, so every
//! value crossing this boundary is converted component-wise. One control
//! step is split into substeps no longer than `max_substep`; motor drivers
//! are sampled once per substep.

use ::nalgebra::Vector3;
use rapier3d::prelude::*;

use super::{
    BodyDesc, BodyHandle, EngineError, JointLimits, LinkHandle, MotorHandle, MotorKind,
    PhysicsWorld,
};
use crate::compute::actuation::ActuationDriver;

/// Longest internal integration step, in seconds.
pub const DEFAULT_MAX_SUBSTEP: f64 = 1.0 / 240.0;

const ANGLE_MOTOR_STIFFNESS: Real = 800.0;
const ANGLE_MOTOR_DAMPING: Real = 40.0;

#[inline]
fn to_rapier(v: &Vector3<f64>) -> Vector<Real> {
    vector![v.x as Real, v.y as Real, v.z as Real]
}

#[inline]
fn from_rapier(v: &Vector<Real>) -> Vector3<f64> {
    Vector3::new(v.x as f64, v.y as f64, v.z as f64)
}

fn family_groups(family: u32) -> InteractionGroups {
    let own = Group::from_bits_truncate(1u32 << family.min(31));
    InteractionGroups::new(own, Group::ALL.difference(own), InteractionTestMode::And)
}

struct Link {
    joint: ImpulseJointHandle,
    a: BodyHandle,
    b: BodyHandle,
}

struct Motor {
    a: BodyHandle,
    b: BodyHandle,
    kind: MotorKind,
    driver: ActuationDriver,
    /// Hinge sharing this motor's bodies, if any.
    joint: Option<ImpulseJointHandle>,
}

/// [`PhysicsWorld`] backed by a rapier pipeline.
pub struct RapierWorld {
    gravity: Vector<Real>,
    max_substep: f64,
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    handles: Vec<(RigidBodyHandle, ColliderHandle)>,
    links: Vec<Link>,
    motors: Vec<Motor>,
    time: f64,
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            max_substep: DEFAULT_MAX_SUBSTEP,
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            handles: Vec::new(),
            links: Vec::new(),
            motors: Vec::new(),
            time: 0.0,
        }
    }

    /// Cap the internal integration step; non-positive values are ignored.
    pub fn with_max_substep(mut self, max_substep: f64) -> Self {
        if max_substep.is_finite() && max_substep > 0.0 {
            self.max_substep = max_substep;
        }
        self
    }

    fn rigid_body(&self, body: BodyHandle) -> Result<&RigidBody, EngineError> {
        self.handles
            .get(body.0)
            .and_then(|&(handle, _)| self.bodies.get(handle))
            .ok_or_else(|| EngineError::unknown_body(body))
    }

    /// Body-local anchor of a world-space point.
    fn local_anchor(&self, body: BodyHandle, anchor: &Vector3<f64>) -> Result<Point<Real>, EngineError> {
        let rb = self.rigid_body(body)?;
        let world = Point::from(to_rapier(anchor));
        Ok(rb.position().inverse_transform_point(&world))
    }

    /// Rotation of `b` relative to `a` about `a`'s Z axis.
    fn relative_angle(&self, a: BodyHandle, b: BodyHandle) -> Result<f64, EngineError> {
        let ra = self.rigid_body(a)?.rotation();
        let rb = self.rigid_body(b)?.rotation();
        Ok((ra.inverse() * rb).scaled_axis().z as f64)
    }

    fn apply_motors(&mut self, t: f64) -> Result<(), EngineError> {
        for &(handle, _) in &self.handles {
            if let Some(rb) = self.bodies.get_mut(handle) {
                rb.reset_torques(false);
            }
        }

        for motor in &self.motors {
            let value = motor.driver.force_at(t) as Real;
            match motor.kind {
                MotorKind::Torque => {
                    let (parent, _) = self.handles[motor.a.0];
                    let (child, _) = self.handles[motor.b.0];
                    let axis = self
                        .bodies
                        .get(parent)
                        .map(|rb| rb.rotation() * Vector::z())
                        .ok_or_else(|| EngineError::unknown_body(motor.a))?;
                    let torque = axis * value;
                    if let Some(rb) = self.bodies.get_mut(child) {
                        rb.add_torque(torque, true);
                    }
                    if let Some(rb) = self.bodies.get_mut(parent) {
                        rb.add_torque(-torque, true);
                    }
                }
                MotorKind::Angle => {
                    if let Some(handle) = motor.joint
                        && let Some(joint) = self.impulse_joints.get_mut(handle, true)
                    {
                        joint.data.set_motor_position(
                            JointAxis::AngX,
                            value,
                            ANGLE_MOTOR_STIFFNESS,
                            ANGLE_MOTOR_DAMPING,
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl PhysicsWorld for RapierWorld {
    fn clear(&mut self) {
        let gravity = self.gravity;
        let max_substep = self.max_substep;
        *self = Self::new();
        self.gravity = gravity;
        self.max_substep = max_substep;
    }

    fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = to_rapier(&gravity);
    }

    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, EngineError> {
        let builder = if desc.fixed {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let handle = self
            .bodies
            .insert(builder.translation(to_rapier(&desc.position)).build());

        let half = to_rapier(&(desc.size / 2.0));
        let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .density(desc.density as Real)
            .friction(desc.friction as Real)
            .collision_groups(family_groups(desc.family))
            .build();
        let collider = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.handles.push((handle, collider));
        Ok(BodyHandle(self.handles.len() - 1))
    }

    fn create_link(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor: Vector3<f64>,
        limits: Option<JointLimits>,
    ) -> Result<LinkHandle, EngineError> {
        let anchor1 = self.local_anchor(a, &anchor)?;
        let anchor2 = self.local_anchor(b, &anchor)?;
        let (parent, _) = self.handles[a.0];
        let (child, _) = self.handles[b.0];

        let joint = match limits {
            Some(limits) => {
                let mut joint: GenericJoint = RevoluteJointBuilder::new(Vector::z_axis())
                    .local_anchor1(anchor1)
                    .local_anchor2(anchor2)
                    .limits([limits.min as Real, limits.max as Real])
                    .contacts_enabled(false)
                    .build()
                    .into();
                joint.set_motor_model(JointAxis::AngX, MotorModel::ForceBased);
                joint
            }
            None => FixedJointBuilder::new()
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .contacts_enabled(false)
                .build()
                .into(),
        };

        let joint = self.impulse_joints.insert(parent, child, joint, true);
        self.links.push(Link { joint, a, b });
        Ok(LinkHandle(self.links.len() - 1))
    }

    fn create_motor(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        _anchor: Vector3<f64>,
        kind: MotorKind,
    ) -> Result<MotorHandle, EngineError> {
        self.rigid_body(a)?;
        self.rigid_body(b)?;
        let joint = self
            .links
            .iter()
            .find(|link| link.a == a && link.b == b)
            .map(|link| link.joint);
        if kind == MotorKind::Angle && joint.is_none() {
            log::warn!("angle motor between bodies {} and {} has no hinge", a.0, b.0);
        }
        self.motors.push(Motor {
            a,
            b,
            kind,
            driver: ActuationDriver::default(),
            joint,
        });
        Ok(MotorHandle(self.motors.len() - 1))
    }

    fn set_motor_driver(
        &mut self,
        motor: MotorHandle,
        driver: ActuationDriver,
    ) -> Result<(), EngineError> {
        let slot = self
            .motors
            .get_mut(motor.0)
            .ok_or_else(|| EngineError::unknown_motor(motor))?;
        slot.driver = driver;
        Ok(())
    }

    fn motor_driver(&self, motor: MotorHandle) -> Result<&ActuationDriver, EngineError> {
        self.motors
            .get(motor.0)
            .map(|m| &m.driver)
            .ok_or_else(|| EngineError::unknown_motor(motor))
    }

    fn step(&mut self, dt: f64) -> Result<(), EngineError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(EngineError::InvalidTimestep(dt));
        }

        let substeps = (dt / self.max_substep).ceil().max(1.0) as usize;
        let sub_dt = dt / substeps as f64;
        self.integration_parameters.dt = sub_dt as Real;

        for i in 0..substeps {
            self.apply_motors(self.time + i as f64 * sub_dt)?;
            self.pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &(),
            );
        }
        self.time += dt;

        for (index, &(handle, _)) in self.handles.iter().enumerate() {
            if let Some(rb) = self.bodies.get(handle)
                && !rb.translation().iter().all(|c| c.is_finite())
            {
                return Err(EngineError::StepFailed(format!(
                    "body {index} diverged at t={:.4}",
                    self.time
                )));
            }
        }
        Ok(())
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn body_position(&self, body: BodyHandle) -> Result<Vector3<f64>, EngineError> {
        Ok(from_rapier(self.rigid_body(body)?.translation()))
    }

    fn contact_force(&self, body: BodyHandle) -> Result<f64, EngineError> {
        let &(_, collider) = self
            .handles
            .get(body.0)
            .ok_or_else(|| EngineError::unknown_body(body))?;
        let impulse: Real = self
            .narrow_phase
            .contact_pairs_with(collider)
            .map(|pair| pair.total_impulse_magnitude())
            .sum();
        let dt = self.integration_parameters.dt;
        Ok(if dt > 0.0 { (impulse / dt) as f64 } else { 0.0 })
    }

    fn link_angle(&self, link: LinkHandle) -> Result<f64, EngineError> {
        let record = self
            .links
            .get(link.0)
            .ok_or_else(|| EngineError::unknown_link(link))?;
        let joint = self
            .impulse_joints
            .get(record.joint)
            .ok_or_else(|| EngineError::unknown_link(link))?;
        let Some(revolute) = joint.data.as_revolute() else {
            return Ok(0.0);
        };
        let r1 = self.rigid_body(record.a)?.rotation();
        let r2 = self.rigid_body(record.b)?.rotation();
        Ok(revolute.angle(r1, r2) as f64)
    }

    fn motor_rotation(&self, motor: MotorHandle) -> Result<f64, EngineError> {
        let m = self
            .motors
            .get(motor.0)
            .ok_or_else(|| EngineError::unknown_motor(motor))?;
        self.relative_angle(m.a, m.b)
    }
}
