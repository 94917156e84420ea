//! One physics world hosting one creature for one episode at a time.
//!
//! The environment moves through `Uninitialized → Ready → Running → Done`,
//! and back to `Ready` on the next reset. Every control tick appends one
//! [`Observation`]; the history is dropped on reset.

use nalgebra::Vector3;

use super::actuation::{ActuationDriver, HoldSchedule};
use super::creature::{ContactSensor, Creature, spawn_height};
use super::evolution::{ForceMatrix, GenomeError};
use super::morphology::{MorphologyError, MorphologyHandles};
use super::physics::{BodyDesc, EngineError, PhysicsWorld};
use crate::schema::{CreatureKind, EnvironmentProps};

/// Default fraction of a rotation limit at which a joint counts as at limit.
pub const DEFAULT_JOINT_LIMIT_THRESHOLD: f64 = 0.99;

/// Lifecycle of an [`EpisodeEnvironment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpisodePhase {
    #[default]
    Uninitialized,
    Ready,
    Running,
    Done,
}

/// Ground contact state of one tracked body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartContact {
    pub label: &'static str,
    pub ground_allowed: bool,
    pub touching: bool,
}

/// Snapshot recorded after every control tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Simulated seconds since reset.
    pub time: f64,
    /// Trunk centre.
    pub position: Vector3<f64>,
    /// Rotation of every motor, in motor order.
    pub joint_rotations: Vec<f64>,
    pub contacts: Vec<PartContact>,
    /// Net forward (x) displacement of the trunk since the first record.
    pub distance: f64,
    /// Links whose angle is within the threshold of a rotation limit.
    pub joints_at_limit: usize,
}

impl Observation {
    /// Whether a part that should stay off the ground is touching it.
    pub fn fell(&self) -> bool {
        self.contacts
            .iter()
            .any(|contact| contact.touching && !contact.ground_allowed)
    }

    pub fn touching(&self, label: &str) -> Option<bool> {
        self.contacts
            .iter()
            .find(|contact| contact.label == label)
            .map(|contact| contact.touching)
    }
}

/// Positions handed to a visualizer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub time: f64,
    /// Body centres in construction order, trunk first.
    pub bodies: Vec<Vector3<f64>>,
}

/// Sink for rendered frames.
pub trait Visualizer: Send {
    fn render(&mut self, frame: &Frame);

    fn close(&mut self) {}
}

/// Visualizer that writes the trunk position to the debug log.
#[derive(Debug, Default)]
pub struct LogVisualizer {
    frames: usize,
}

impl Visualizer for LogVisualizer {
    fn render(&mut self, frame: &Frame) {
        self.frames += 1;
        if let Some(trunk) = frame.bodies.first() {
            log::debug!(
                "frame {} t={:.3} trunk=({:.3}, {:.3}, {:.3})",
                self.frames,
                frame.time,
                trunk.x,
                trunk.y,
                trunk.z
            );
        }
    }

    fn close(&mut self) {
        log::debug!("visualizer closed after {} frames", self.frames);
    }
}

/// Errors raised while resetting or stepping an environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Forces for joints are not enough: expected {expected}, got {actual}")]
    InsufficientAction { expected: usize, actual: usize },
    #[error("Environment must be reset before stepping")]
    NotReset,
    #[error("Episode is finished, reset before stepping again")]
    EpisodeFinished,
    #[error("Invalid hold schedule window {0}")]
    InvalidSchedule(f64),
    #[error("Physics engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Morphology error: {0}")]
    Morphology(#[from] MorphologyError),
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),
}

/// Owns a physics world and the creature living in it.
pub struct EpisodeEnvironment<W: PhysicsWorld> {
    world: W,
    kind: CreatureKind,
    joint_limit_threshold: f64,
    sensors: Vec<ContactSensor>,
    handles: MorphologyHandles,
    observations: Vec<Observation>,
    phase: EpisodePhase,
    visualizer: Option<Box<dyn Visualizer>>,
}

impl<W: PhysicsWorld> EpisodeEnvironment<W> {
    pub fn new(world: W, kind: CreatureKind) -> Self {
        Self {
            world,
            kind,
            joint_limit_threshold: DEFAULT_JOINT_LIMIT_THRESHOLD,
            sensors: Vec::new(),
            handles: MorphologyHandles::default(),
            observations: Vec::new(),
            phase: EpisodePhase::Uninitialized,
            visualizer: None,
        }
    }

    pub fn with_joint_limit_threshold(mut self, threshold: f64) -> Self {
        self.joint_limit_threshold = threshold;
        self
    }

    /// Attach a visualizer; without one `render` does nothing.
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn into_world(self) -> W {
        self.world
    }

    #[inline]
    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn creature(&self) -> CreatureKind {
        self.kind
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn last_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Motors of the current creature; zero before the first reset.
    pub fn motor_count(&self) -> usize {
        self.handles.motors.len()
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.world.time()
    }

    /// Rebuild the world: gravity, ground, and a fresh creature at its spawn pose.
    pub fn reset(&mut self, props: &EnvironmentProps) -> Result<(), EnvironmentError> {
        self.world.clear();
        self.observations.clear();
        self.handles = MorphologyHandles::default();
        self.sensors.clear();
        self.phase = EpisodePhase::Uninitialized;

        self.world.set_gravity(props.gravity_vector());
        self.world.create_body(&BodyDesc::ground())?;

        let spawn = Vector3::new(0.0, spawn_height(self.kind), 0.0);
        let creature = Creature::build(self.kind, spawn)?;
        self.handles = creature.morphology.add_to_world(&mut self.world)?;
        self.sensors = creature.sensors;

        self.record_observation()?;
        self.phase = EpisodePhase::Ready;

        log::debug!(
            "reset {}: {} bodies, {} links, {} motors, gravity {:?}",
            self.kind,
            self.handles.body_count(),
            self.handles.links.len(),
            self.handles.motors.len(),
            props.gravity
        );
        Ok(())
    }

    /// Apply one instantaneous action per motor and advance by `timestep`.
    ///
    /// The action is validated before anything touches the world, so a short
    /// action leaves the world exactly as it was.
    pub fn step(&mut self, action: &[f64], timestep: f64) -> Result<(), EnvironmentError> {
        self.ensure_steppable()?;
        let expected = self.handles.motors.len();
        if action.len() < expected {
            return Err(EnvironmentError::InsufficientAction {
                expected,
                actual: action.len(),
            });
        }

        for (&motor, &value) in self.handles.motors.iter().zip(action) {
            self.world
                .set_motor_driver(motor, ActuationDriver::Direct(value))?;
        }
        self.advance(timestep)
    }

    /// Install one hold schedule per motor from a decoded genome.
    pub fn install_schedule(
        &mut self,
        forces: &ForceMatrix,
        window: f64,
    ) -> Result<(), EnvironmentError> {
        self.ensure_steppable()?;
        let joints = self.handles.motors.len();
        if forces.joints() != joints {
            return Err(GenomeError::ShapeMismatch {
                expected: joints * forces.intervals(),
                actual: forces.joints() * forces.intervals(),
                joints,
                intervals: forces.intervals(),
            }
            .into());
        }

        let mut schedules = Vec::with_capacity(joints);
        for row in forces.rows() {
            let schedule = HoldSchedule::new(row.to_vec(), window)
                .ok_or(EnvironmentError::InvalidSchedule(window))?;
            schedules.push(schedule);
        }
        for (&motor, schedule) in self.handles.motors.iter().zip(schedules) {
            self.world
                .set_motor_driver(motor, ActuationDriver::Hold(schedule))?;
        }
        Ok(())
    }

    /// Advance by `timestep` with the currently installed drivers.
    pub fn advance(&mut self, timestep: f64) -> Result<(), EnvironmentError> {
        self.ensure_steppable()?;
        self.world.step(timestep)?;
        self.phase = EpisodePhase::Running;
        self.record_observation()?;

        if let Some(last) = self.observations.last() {
            log::trace!(
                "t={:.3} pos=({:.3}, {:.3}, {:.3}) distance={:.3} at_limit={} fell={}",
                last.time,
                last.position.x,
                last.position.y,
                last.position.z,
                last.distance,
                last.joints_at_limit,
                last.fell()
            );
        }
        Ok(())
    }

    /// Driver output of every motor at the current simulated time.
    pub fn applied_forces(&self) -> Result<Vec<f64>, EnvironmentError> {
        let t = self.world.time();
        self.handles
            .motors
            .iter()
            .map(|&motor| -> Result<f64, EnvironmentError> {
                Ok(self.world.motor_driver(motor)?.force_at(t))
            })
            .collect()
    }

    /// Mark the episode as terminated; stepping fails until the next reset.
    pub fn finish(&mut self) {
        if self.phase != EpisodePhase::Uninitialized {
            self.phase = EpisodePhase::Done;
        }
    }

    /// Push the current body positions to the visualizer, if any.
    pub fn render(&mut self) -> Result<(), EnvironmentError> {
        let Some(visualizer) = self.visualizer.as_mut() else {
            return Ok(());
        };
        let bodies = self
            .handles
            .bodies()
            .map(|body| self.world.body_position(body))
            .collect::<Result<Vec<_>, _>>()?;
        visualizer.render(&Frame {
            time: self.world.time(),
            bodies,
        });
        Ok(())
    }

    /// Release the visualizer.
    pub fn close(&mut self) {
        if let Some(mut visualizer) = self.visualizer.take() {
            visualizer.close();
        }
    }

    fn ensure_steppable(&self) -> Result<(), EnvironmentError> {
        match self.phase {
            EpisodePhase::Uninitialized => Err(EnvironmentError::NotReset),
            EpisodePhase::Done => Err(EnvironmentError::EpisodeFinished),
            EpisodePhase::Ready | EpisodePhase::Running => Ok(()),
        }
    }

    fn record_observation(&mut self) -> Result<(), EnvironmentError> {
        let trunk = self.handles.root().ok_or(EnvironmentError::NotReset)?;
        let position = self.world.body_position(trunk)?;

        let joint_rotations = self
            .handles
            .motors
            .iter()
            .map(|&motor| self.world.motor_rotation(motor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut contacts = Vec::with_capacity(self.sensors.len());
        for sensor in &self.sensors {
            let body = self
                .handles
                .body(sensor.segment)
                .ok_or(MorphologyError::Unattached(sensor.segment.index()))?;
            contacts.push(PartContact {
                label: sensor.label,
                ground_allowed: sensor.ground_allowed,
                touching: self.world.contact_force(body)? != 0.0,
            });
        }

        let mut joints_at_limit = 0;
        for &(link, limits) in &self.handles.links {
            if let Some(limits) = limits
                && limits.is_at_limit(self.world.link_angle(link)?, self.joint_limit_threshold)
            {
                joints_at_limit += 1;
            }
        }

        let distance = self
            .observations
            .first()
            .map_or(0.0, |first| position.x - first.position.x);

        self.observations.push(Observation {
            time: self.world.time(),
            position,
            joint_rotations,
            contacts,
            distance,
            joints_at_limit,
        });
        Ok(())
    }
}
