//! Tree-structured body plans built from branch/join calls.
//!
//! Segments live in an arena and refer to each other by [`SegmentId`]: a child
//! stores its parent's index, a parent stores the ordered indices of its
//! children. Construction is declarative:
//!
//! ```rust
//! use nalgebra::Vector3;
//! use walking_sim::compute::{Face, JointLimits, JointSpec, Morphology, MotorKind};
//!
//! let mut body = Morphology::new(Vector3::new(1.0, 0.5, 0.5), Vector3::new(0.0, 1.7, 0.0), 2);
//! body.root_mut()
//!     .branch(Vector3::new(0.3, 0.7, 0.15))
//!     .join(
//!         JointSpec::at(Face::Bottom)
//!             .offset(0.4, 0.0, 0.25)
//!             .limits(JointLimits::symmetric(std::f64::consts::FRAC_PI_3))
//!             .motor(MotorKind::Torque),
//!     )
//!     .unwrap();
//! assert_eq!(body.motors().len(), 1);
//! ```
//!
//! Registering the finished tree with a physics world is a separate step,
//! [`Morphology::add_to_world`].

use nalgebra::Vector3;

use super::physics::{
    BodyDesc, BodyHandle, EngineError, JointLimits, LinkHandle, MotorHandle, MotorKind,
    PhysicsWorld,
};

/// Index of a segment inside its [`Morphology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(usize);

impl SegmentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Face of a parent segment a child hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// +X
    Front,
    /// -X
    Back,
    /// +Y
    Top,
    /// -Y
    Bottom,
    /// +Z
    Left,
    /// -Z
    Right,
}

impl Face {
    /// Unit outward normal.
    pub fn normal(self) -> Vector3<f64> {
        match self {
            Face::Front => Vector3::x(),
            Face::Back => -Vector3::x(),
            Face::Top => Vector3::y(),
            Face::Bottom => -Vector3::y(),
            Face::Left => Vector3::z(),
            Face::Right => -Vector3::z(),
        }
    }

    #[inline]
    fn axis(self) -> usize {
        match self {
            Face::Front | Face::Back => 0,
            Face::Top | Face::Bottom => 1,
            Face::Left | Face::Right => 2,
        }
    }
}

/// Declarative description of how a child attaches to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSpec {
    pub face: Face,
    /// Shift of the anchor from the centre of the parent face.
    pub offset: Vector3<f64>,
    /// Hinge limits about Z; `None` locks the child rigidly.
    pub limits: Option<JointLimits>,
    pub motor: Option<MotorKind>,
}

impl JointSpec {
    /// Locked joint at the centre of `face`.
    pub fn at(face: Face) -> Self {
        Self {
            face,
            offset: Vector3::zeros(),
            limits: None,
            motor: None,
        }
    }

    pub fn offset(mut self, x: f64, y: f64, z: f64) -> Self {
        self.offset = Vector3::new(x, y, z);
        self
    }

    pub fn limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn motor(mut self, kind: MotorKind) -> Self {
        self.motor = Some(kind);
        self
    }
}

/// A resolved joint between a segment and its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    /// World-space anchor at spawn.
    pub anchor: Vector3<f64>,
    pub limits: Option<JointLimits>,
    pub motor: Option<MotorKind>,
}

/// One rigid box in the body plan.
#[derive(Debug, Clone)]
pub struct Segment {
    size: Vector3<f64>,
    family: u32,
    position: Option<Vector3<f64>>,
    parent: Option<SegmentId>,
    children: Vec<SegmentId>,
    joint: Option<Joint>,
}

impl Segment {
    /// Full box extents.
    pub fn size(&self) -> Vector3<f64> {
        self.size
    }

    /// Collision family; segments of one family never collide.
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Resolved centre, `None` until joined.
    pub fn position(&self) -> Option<Vector3<f64>> {
        self.position
    }

    pub fn parent(&self) -> Option<SegmentId> {
        self.parent
    }

    pub fn children(&self) -> &[SegmentId] {
        &self.children
    }

    pub fn joint(&self) -> Option<&Joint> {
        self.joint.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.position.is_some()
    }
}

/// Errors raised while building or registering a morphology.
#[derive(Debug, thiserror::Error)]
pub enum MorphologyError {
    #[error("Cannot create joint, segment {0} has no parent")]
    NoParent(usize),
    #[error("Segment {0} is already joined")]
    AlreadyJoined(usize),
    #[error("Segment {0} was never joined to its parent")]
    Unattached(usize),
    #[error("Unknown segment {0}")]
    UnknownSegment(usize),
    #[error("Invalid rotation limits {limits} on segment {segment}")]
    InvalidLimits { segment: usize, limits: JointLimits },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Arena of segments rooted at index 0.
#[derive(Debug, Clone)]
pub struct Morphology {
    segments: Vec<Segment>,
}

impl Morphology {
    /// Start a body plan from a root segment at a fixed position.
    pub fn new(root_size: Vector3<f64>, root_position: Vector3<f64>, family: u32) -> Self {
        Self {
            segments: vec![Segment {
                size: root_size,
                family,
                position: Some(root_position),
                parent: None,
                children: Vec::new(),
                joint: None,
            }],
        }
    }

    #[inline]
    pub fn root(&self) -> SegmentId {
        SegmentId(0)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    fn get(&self, id: SegmentId) -> Result<&Segment, MorphologyError> {
        self.segments
            .get(id.0)
            .ok_or(MorphologyError::UnknownSegment(id.0))
    }

    pub fn root_mut(&mut self) -> SegmentMut<'_> {
        SegmentMut {
            morphology: self,
            id: SegmentId(0),
        }
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Result<SegmentMut<'_>, MorphologyError> {
        self.get(id)?;
        Ok(SegmentMut {
            morphology: self,
            id,
        })
    }

    /// Create an unattached child of `parent` in the parent's family.
    pub fn branch(
        &mut self,
        parent: SegmentId,
        size: Vector3<f64>,
    ) -> Result<SegmentId, MorphologyError> {
        let family = self.get(parent)?.family;
        self.branch_in_family(parent, size, family)
    }

    pub fn branch_in_family(
        &mut self,
        parent: SegmentId,
        size: Vector3<f64>,
        family: u32,
    ) -> Result<SegmentId, MorphologyError> {
        self.get(parent)?;
        let id = SegmentId(self.segments.len());
        self.segments.push(Segment {
            size,
            family,
            position: None,
            parent: Some(parent),
            children: Vec::new(),
            joint: None,
        });
        self.segments[parent.0].children.push(id);
        Ok(id)
    }

    /// Attach `child` to its parent and resolve its position.
    ///
    /// The anchor sits on the parent's `face`, shifted by `offset`; the child's
    /// centre is pushed out from the anchor by half its own extent along the
    /// face normal.
    pub fn join(&mut self, child: SegmentId, spec: JointSpec) -> Result<SegmentId, MorphologyError> {
        let segment = self.get(child)?;
        let parent = segment.parent.ok_or(MorphologyError::NoParent(child.0))?;
        if segment.joint.is_some() {
            return Err(MorphologyError::AlreadyJoined(child.0));
        }
        if let Some(limits) = spec.limits
            && !limits.is_valid()
        {
            return Err(MorphologyError::InvalidLimits {
                segment: child.0,
                limits,
            });
        }

        let parent_segment = self.get(parent)?;
        let parent_position = parent_segment
            .position
            .ok_or(MorphologyError::Unattached(parent.0))?;

        let normal = spec.face.normal();
        let axis = spec.face.axis();
        let anchor =
            parent_position + normal * (parent_segment.size[axis] / 2.0) + spec.offset;
        let position = anchor + normal * (segment.size[axis] / 2.0);

        let slot = &mut self.segments[child.0];
        slot.position = Some(position);
        slot.joint = Some(Joint {
            anchor,
            limits: spec.limits,
            motor: spec.motor,
        });
        Ok(child)
    }

    /// Depth-first walk from the root, children in construction order.
    fn walk(&self) -> Vec<SegmentId> {
        let mut order = Vec::with_capacity(self.segments.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.segments[id.0].children.iter().rev().copied());
        }
        order
    }

    /// All segments, depth-first.
    pub fn bodies(&self) -> Vec<SegmentId> {
        self.walk()
    }

    /// Joined segments, each owning one constraint link to its parent.
    pub fn links(&self) -> Vec<SegmentId> {
        self.walk()
            .into_iter()
            .filter(|id| self.segments[id.0].joint.is_some())
            .collect()
    }

    /// Joined segments with a motor.
    pub fn motors(&self) -> Vec<SegmentId> {
        self.walk()
            .into_iter()
            .filter(|id| {
                self.segments[id.0]
                    .joint
                    .is_some_and(|joint| joint.motor.is_some())
            })
            .collect()
    }

    /// Check that every non-root segment has been joined.
    pub fn validate(&self) -> Result<(), MorphologyError> {
        match self.segments.iter().position(|s| !s.is_attached()) {
            Some(index) => Err(MorphologyError::Unattached(index)),
            None => Ok(()),
        }
    }

    /// Register every body, link and motor with `world`, in traversal order.
    pub fn add_to_world<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
    ) -> Result<MorphologyHandles, MorphologyError> {
        self.validate()?;

        let mut handles = MorphologyHandles {
            bodies: vec![None; self.segments.len()],
            links: Vec::new(),
            motors: Vec::new(),
        };

        for id in self.bodies() {
            let segment = &self.segments[id.0];
            let position = segment.position.ok_or(MorphologyError::Unattached(id.0))?;
            let desc = BodyDesc::segment(segment.size, position, segment.family);
            handles.bodies[id.0] = Some(world.create_body(&desc)?);
        }

        for id in self.links() {
            let (parent, child, joint) = self.connection(&handles, id)?;
            let link = world.create_link(parent, child, joint.anchor, joint.limits)?;
            handles.links.push((link, joint.limits));
        }

        for id in self.motors() {
            let (parent, child, joint) = self.connection(&handles, id)?;
            if let Some(kind) = joint.motor {
                handles
                    .motors
                    .push(world.create_motor(parent, child, joint.anchor, kind)?);
            }
        }

        Ok(handles)
    }

    fn connection(
        &self,
        handles: &MorphologyHandles,
        id: SegmentId,
    ) -> Result<(BodyHandle, BodyHandle, Joint), MorphologyError> {
        let segment = &self.segments[id.0];
        let parent = segment.parent.ok_or(MorphologyError::NoParent(id.0))?;
        let joint = segment.joint.ok_or(MorphologyError::Unattached(id.0))?;
        let parent_body = handles
            .body(parent)
            .ok_or(MorphologyError::Unattached(parent.0))?;
        let child_body = handles.body(id).ok_or(MorphologyError::Unattached(id.0))?;
        Ok((parent_body, child_body, joint))
    }
}

/// Cursor over one segment, for chained construction.
pub struct SegmentMut<'a> {
    morphology: &'a mut Morphology,
    id: SegmentId,
}

impl<'a> SegmentMut<'a> {
    #[inline]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn segment(&self) -> &Segment {
        &self.morphology.segments[self.id.0]
    }

    /// Create a pending child and move the cursor onto it.
    pub fn branch(self, size: Vector3<f64>) -> SegmentMut<'a> {
        let family = self.segment().family;
        self.branch_in_family(size, family)
    }

    pub fn branch_in_family(self, size: Vector3<f64>, family: u32) -> SegmentMut<'a> {
        let id = SegmentId(self.morphology.segments.len());
        self.morphology.segments.push(Segment {
            size,
            family,
            position: None,
            parent: Some(self.id),
            children: Vec::new(),
            joint: None,
        });
        self.morphology.segments[self.id.0].children.push(id);
        SegmentMut {
            morphology: self.morphology,
            id,
        }
    }

    /// Join the current segment to its parent.
    pub fn join(self, spec: JointSpec) -> Result<SegmentMut<'a>, MorphologyError> {
        self.morphology.join(self.id, spec)?;
        Ok(self)
    }
}

/// Physics handles of a registered morphology.
#[derive(Debug, Clone, Default)]
pub struct MorphologyHandles {
    bodies: Vec<Option<BodyHandle>>,
    /// Links in traversal order with their rotation limits.
    pub links: Vec<(LinkHandle, Option<JointLimits>)>,
    /// Motors in traversal order.
    pub motors: Vec<MotorHandle>,
}

impl MorphologyHandles {
    pub fn body(&self, id: SegmentId) -> Option<BodyHandle> {
        self.bodies.get(id.0).copied().flatten()
    }

    /// Trunk body.
    pub fn root(&self) -> Option<BodyHandle> {
        self.bodies.first().copied().flatten()
    }

    /// Body handles in construction order, trunk first.
    pub fn bodies(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.bodies.iter().flatten().copied()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }
}
