//! Built-in body plans.
//!
//! Both creatures are plain branch/join descriptions over [`Morphology`]; they
//! only add a spawn height and the list of parts whose ground contact is
//! observed.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};

use nalgebra::Vector3;

use super::morphology::{Face, JointSpec, Morphology, MorphologyError, SegmentId};
use super::physics::{JointLimits, MotorKind};
use crate::schema::CreatureKind;

/// Collision family shared by every segment of a creature.
pub const CREATURE_FAMILY: u32 = 2;

const LEG_SIZE: [f64; 3] = [0.3, 0.7, 0.15];
const FOOT_SIZE: [f64; 3] = [0.4, 0.1, 0.4];

fn hip() -> JointLimits {
    JointLimits::symmetric(FRAC_PI_3)
}

fn knee() -> JointLimits {
    JointLimits::new(-0.05, FRAC_PI_2)
}

/// A body part whose ground contact is reported in every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactSensor {
    pub label: &'static str,
    pub segment: SegmentId,
    /// Whether touching the ground is part of normal gait.
    pub ground_allowed: bool,
}

/// A body plan ready to be added to a world.
#[derive(Debug, Clone)]
pub struct Creature {
    pub kind: CreatureKind,
    pub morphology: Morphology,
    pub sensors: Vec<ContactSensor>,
}

impl Creature {
    /// Build a fresh body plan with its trunk at `spawn`.
    pub fn build(kind: CreatureKind, spawn: Vector3<f64>) -> Result<Self, MorphologyError> {
        match kind {
            CreatureKind::Quadrupede => quadrupede(spawn),
            CreatureKind::Bipede => bipede(spawn),
        }
    }

    /// Build at the creature's default spawn height above the origin.
    pub fn spawn(kind: CreatureKind) -> Result<Self, MorphologyError> {
        Self::build(kind, Vector3::new(0.0, spawn_height(kind), 0.0))
    }

    pub fn motor_count(&self) -> usize {
        self.morphology.motors().len()
    }
}

/// Trunk height at which the lowest segment rests just above y = 0.
pub fn spawn_height(kind: CreatureKind) -> f64 {
    match kind {
        CreatureKind::Quadrupede => 1.7,
        CreatureKind::Bipede => 1.8,
    }
}

/// Number of motors of a body plan, without building it.
pub fn motor_count(kind: CreatureKind) -> usize {
    match kind {
        CreatureKind::Quadrupede => 8,
        CreatureKind::Bipede => 4,
    }
}

fn quadrupede(spawn: Vector3<f64>) -> Result<Creature, MorphologyError> {
    let trunk = Vector3::new(1.0, 0.5, 0.5);
    let mut morphology = Morphology::new(trunk, spawn, CREATURE_FAMILY);
    let mut sensors = vec![ContactSensor {
        label: "trunk",
        segment: morphology.root(),
        ground_allowed: false,
    }];

    let x = 0.8 * trunk.x / 2.0;
    let z = trunk.z / 2.0;
    let corners = [
        ("front_left_thigh", "front_left_shin", x, z),
        ("front_right_thigh", "front_right_shin", x, -z),
        ("back_left_thigh", "back_left_shin", -x, z),
        ("back_right_thigh", "back_right_shin", -x, -z),
    ];

    for (thigh_label, shin_label, x, z) in corners {
        let thigh = morphology
            .root_mut()
            .branch(Vector3::from(LEG_SIZE))
            .join(
                JointSpec::at(Face::Bottom)
                    .offset(x, 0.0, z)
                    .limits(hip())
                    .motor(MotorKind::Torque),
            )?;
        let thigh_id = thigh.id();
        let shin = thigh.branch(Vector3::from(LEG_SIZE)).join(
            JointSpec::at(Face::Bottom)
                .limits(knee())
                .motor(MotorKind::Torque),
        )?;
        let shin_id = shin.id();

        sensors.push(ContactSensor {
            label: thigh_label,
            segment: thigh_id,
            ground_allowed: false,
        });
        sensors.push(ContactSensor {
            label: shin_label,
            segment: shin_id,
            ground_allowed: true,
        });
    }

    Ok(Creature {
        kind: CreatureKind::Quadrupede,
        morphology,
        sensors,
    })
}

fn bipede(spawn: Vector3<f64>) -> Result<Creature, MorphologyError> {
    let trunk = Vector3::new(0.5, 0.5, 1.0);
    let mut morphology = Morphology::new(trunk, spawn, CREATURE_FAMILY);
    let mut sensors = vec![ContactSensor {
        label: "trunk",
        segment: morphology.root(),
        ground_allowed: false,
    }];

    let sides = [
        ("left_thigh", "left_foot", trunk.z / 2.0),
        ("right_thigh", "right_foot", -trunk.z / 2.0),
    ];

    for (thigh_label, foot_label, z) in sides {
        let thigh = morphology
            .root_mut()
            .branch(Vector3::from(LEG_SIZE))
            .join(
                JointSpec::at(Face::Bottom)
                    .offset(0.0, 0.0, z)
                    .limits(hip())
                    .motor(MotorKind::Torque),
            )?;
        let thigh_id = thigh.id();
        let foot = thigh
            .branch(Vector3::from(LEG_SIZE))
            .join(
                JointSpec::at(Face::Bottom)
                    .limits(JointLimits::new(-FRAC_PI_2, 0.05))
                    .motor(MotorKind::Torque),
            )?
            .branch(Vector3::from(FOOT_SIZE))
            .join(JointSpec::at(Face::Bottom))?;
        let foot_id = foot.id();

        sensors.push(ContactSensor {
            label: thigh_label,
            segment: thigh_id,
            ground_allowed: false,
        });
        sensors.push(ContactSensor {
            label: foot_label,
            segment: foot_id,
            ground_allowed: true,
        });
    }

    Ok(Creature {
        kind: CreatureKind::Bipede,
        morphology,
        sensors,
    })
}
