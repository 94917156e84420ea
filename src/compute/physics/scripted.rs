//! Deterministic in-memory world for exercising the simulation core.
//!
//! Bodies drift with a fixed velocity, contacts and link angles follow a
//! script keyed by creation index, and every driver query is recorded. The
//! script survives `clear`, so it applies to every episode.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use super::{
    BodyDesc, BodyHandle, EngineError, JointLimits, LinkHandle, MotorHandle, MotorKind,
    PhysicsWorld,
};
use crate::compute::actuation::ActuationDriver;

#[derive(Debug, Clone)]
pub(crate) struct ScriptedBody {
    pub desc: BodyDesc,
    pub position: Vector3<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedLink {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub limits: Option<JointLimits>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedMotor {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub kind: MotorKind,
    pub driver: ActuationDriver,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedWorld {
    time: f64,
    pub gravity: Vector3<f64>,
    pub bodies: Vec<ScriptedBody>,
    pub links: Vec<ScriptedLink>,
    pub motors: Vec<ScriptedMotor>,

    /// Velocity applied to every dynamic body.
    pub velocity: Vector3<f64>,
    /// Driver samples per step.
    pub substeps: usize,
    /// Body index -> simulated time from which it reports contact.
    pub contacts: BTreeMap<usize, f64>,
    /// Link index -> reported angle.
    pub link_angles: BTreeMap<usize, f64>,
    /// Total step index (across episodes) at which `step` fails.
    pub fail_at_step: Option<usize>,

    pub steps: usize,
    pub clears: usize,
    pub driver_queries: usize,
    /// Motor forces sampled at the start of each step.
    pub forces_log: Vec<Vec<f64>>,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        Self {
            substeps: 1,
            ..Default::default()
        }
    }

    pub fn moving(velocity: Vector3<f64>) -> Self {
        Self {
            velocity,
            ..Self::new()
        }
    }

    pub fn touch_at(mut self, body_index: usize, time: f64) -> Self {
        self.contacts.insert(body_index, time);
        self
    }

    fn body(&self, handle: BodyHandle) -> Result<&ScriptedBody, EngineError> {
        self.bodies
            .get(handle.0)
            .ok_or_else(|| EngineError::unknown_body(handle))
    }
}

impl PhysicsWorld for ScriptedWorld {
    fn clear(&mut self) {
        self.bodies.clear();
        self.links.clear();
        self.motors.clear();
        self.time = 0.0;
        self.clears += 1;
    }

    fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = gravity;
    }

    fn create_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, EngineError> {
        self.bodies.push(ScriptedBody {
            desc: desc.clone(),
            position: desc.position,
        });
        Ok(BodyHandle(self.bodies.len() - 1))
    }

    fn create_link(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        _anchor: Vector3<f64>,
        limits: Option<JointLimits>,
    ) -> Result<LinkHandle, EngineError> {
        self.body(a)?;
        self.body(b)?;
        self.links.push(ScriptedLink { a, b, limits });
        Ok(LinkHandle(self.links.len() - 1))
    }

    fn create_motor(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        _anchor: Vector3<f64>,
        kind: MotorKind,
    ) -> Result<MotorHandle, EngineError> {
        self.body(a)?;
        self.body(b)?;
        self.motors.push(ScriptedMotor {
            a,
            b,
            kind,
            driver: ActuationDriver::default(),
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
        if self.fail_at_step == Some(self.steps) {
            return Err(EngineError::StepFailed(format!(
                "scripted failure at step {}",
                self.steps
            )));
        }

        let start = self.time;
        self.forces_log
            .push(self.motors.iter().map(|m| m.driver.force_at(start)).collect());

        let substeps = self.substeps.max(1);
        let sub_dt = dt / substeps as f64;
        for i in 0..substeps {
            let t = start + i as f64 * sub_dt;
            for motor in &self.motors {
                let _ = motor.driver.force_at(t);
                self.driver_queries += 1;
            }
        }

        for body in self.bodies.iter_mut().filter(|b| !b.desc.fixed) {
            body.position += self.velocity * dt;
        }
        self.time = start + dt;
        self.steps += 1;
        Ok(())
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn body_position(&self, body: BodyHandle) -> Result<Vector3<f64>, EngineError> {
        Ok(self.body(body)?.position)
    }

    fn contact_force(&self, body: BodyHandle) -> Result<f64, EngineError> {
        self.body(body)?;
        Ok(match self.contacts.get(&body.0) {
            Some(&from) if self.time >= from => 250.0,
            _ => 0.0,
        })
    }

    fn link_angle(&self, link: LinkHandle) -> Result<f64, EngineError> {
        if link.0 >= self.links.len() {
            return Err(EngineError::unknown_link(link));
        }
        Ok(self.link_angles.get(&link.0).copied().unwrap_or(0.0))
    }

    fn motor_rotation(&self, motor: MotorHandle) -> Result<f64, EngineError> {
        let m = self
            .motors
            .get(motor.0)
            .ok_or_else(|| EngineError::unknown_motor(motor))?;
        let link = self
            .links
            .iter()
            .position(|l| l.a == m.a && l.b == m.b);
        Ok(link
            .and_then(|i| self.link_angles.get(&i).copied())
            .unwrap_or(0.0))
    }
}
