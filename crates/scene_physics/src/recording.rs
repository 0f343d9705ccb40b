//! Instrumented backend that records object lifecycles
//!
//! [`RecordingBackend`] runs no collision detection. It integrates free fall
//! for dynamic bodies, counts live objects and logs every create, destroy,
//! registration and step call in order. Useful for dry runs over large mesh
//! sets and for checking teardown order and resource parity.

use crate::backend::{PhysicsBackend, RigidBodyInfo, WorldParts};
use crate::mesh::{self, TriangleMesh};
use crate::motion::{DefaultMotionState, MotionState, Transform};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Kinds of objects the backend hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CollisionConfiguration,
    Dispatcher,
    Broadphase,
    Solver,
    PhysicsWorld,
    TriangleMesh,
    CollisionShape,
    MotionState,
    RigidBody,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollisionConfiguration => "collision configuration",
            Self::Dispatcher => "dispatcher",
            Self::Broadphase => "broadphase",
            Self::Solver => "solver",
            Self::PhysicsWorld => "physics world",
            Self::TriangleMesh => "triangle mesh",
            Self::CollisionShape => "collision shape",
            Self::MotionState => "motion state",
            Self::RigidBody => "rigid body",
        };
        f.write_str(name)
    }
}

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Object created
    Created(ResourceKind),
    /// Object dropped
    Destroyed(ResourceKind),
    /// World gravity set
    GravitySet([f32; 3]),
    /// Local inertia requested for this mass
    InertiaComputed { mass: f32 },
    /// Body registered with the world
    BodyAdded,
    /// Body unregistered from the world
    BodyRemoved,
    /// World stepped
    Stepped { time_step: f32, sub_iterations: u32 },
}

#[derive(Debug, Default)]
struct Journal {
    events: Vec<LifecycleEvent>,
    live: usize,
    next_body_id: u64,
}

type SharedJournal = Rc<RefCell<Journal>>;

/// Logs its creation and destruction into the journal
struct Probe {
    kind: ResourceKind,
    journal: SharedJournal,
}

impl Probe {
    fn new(kind: ResourceKind, journal: &SharedJournal) -> Self {
        {
            let mut j = journal.borrow_mut();
            j.events.push(LifecycleEvent::Created(kind));
            j.live += 1;
        }
        Self {
            kind,
            journal: Rc::clone(journal),
        }
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        let mut j = self.journal.borrow_mut();
        j.events.push(LifecycleEvent::Destroyed(self.kind));
        j.live = j.live.saturating_sub(1);
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Probe({})", self.kind)
    }
}

/// Backend that records instead of simulating collisions.
///
/// Clones share the same journal, so a test can keep one clone and hand
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    journal: SharedJournal,
}

impl RecordingBackend {
    /// Create a backend with an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.journal.borrow().events.clone()
    }

    /// Destroyed kinds, in drop order
    pub fn destruction_order(&self) -> Vec<ResourceKind> {
        self.journal
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Destroyed(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Created kinds, in creation order
    pub fn creation_order(&self) -> Vec<ResourceKind> {
        self.journal
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::Created(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Objects created and not yet dropped
    pub fn live_objects(&self) -> usize {
        self.journal.borrow().live
    }

    /// Number of step calls
    pub fn step_count(&self) -> usize {
        self.count(|e| matches!(e, LifecycleEvent::Stepped { .. }))
    }

    /// Sum of every step's timestep, in seconds
    pub fn elapsed(&self) -> f64 {
        self.journal
            .borrow()
            .events
            .iter()
            .map(|e| match e {
                LifecycleEvent::Stepped { time_step, .. } => f64::from(*time_step),
                _ => 0.0,
            })
            .sum()
    }

    /// Number of inertia computations requested
    pub fn inertia_computations(&self) -> usize {
        self.count(|e| matches!(e, LifecycleEvent::InertiaComputed { .. }))
    }

    /// Forget every recorded event. Live objects stay counted.
    pub fn clear(&self) {
        self.journal.borrow_mut().events.clear();
    }

    fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.journal.borrow().events.iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: LifecycleEvent) {
        self.journal.borrow_mut().events.push(event);
    }

    fn probe(&self, kind: ResourceKind) -> Probe {
        Probe::new(kind, &self.journal)
    }
}

/// Recorded collision configuration
#[derive(Debug)]
pub struct RecordedConfiguration {
    _probe: Probe,
}

/// Recorded dispatcher
#[derive(Debug)]
pub struct RecordedDispatcher {
    _probe: Probe,
}

/// Recorded broadphase
#[derive(Debug)]
pub struct RecordedBroadphase {
    _probe: Probe,
}

/// Recorded solver
#[derive(Debug)]
pub struct RecordedSolver {
    _probe: Probe,
}

#[derive(Debug, Clone, Copy)]
struct PointBody {
    transform: Transform,
    velocity: [f32; 3],
    dynamic: bool,
}

/// Recorded world. Holds its parts for its whole lifetime.
pub struct RecordedWorld<'a> {
    _parts: WorldParts<'a, RecordingBackend>,
    gravity: [f32; 3],
    elapsed: f64,
    bodies: HashMap<u64, PointBody>,
    _probe: Probe,
}

impl RecordedWorld<'_> {
    /// Simulated time so far
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Registered body count
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// Recorded triangle mesh
#[derive(Debug)]
pub struct RecordedTriangleMesh {
    mesh: TriangleMesh,
    _probe: Probe,
}

/// Recorded collision shape
#[derive(Debug)]
pub struct RecordedShape {
    bounds: Option<([f32; 3], [f32; 3])>,
    _probe: Probe,
}

/// Recorded motion state
#[derive(Debug)]
pub struct RecordedMotionState {
    inner: DefaultMotionState,
    _probe: Probe,
}

impl MotionState for RecordedMotionState {
    fn world_transform(&self) -> Transform {
        self.inner.world_transform()
    }

    fn set_world_transform(&mut self, transform: Transform) {
        self.inner.set_world_transform(transform);
    }
}

/// Recorded rigid body
#[derive(Debug)]
pub struct RecordedRigidBody {
    id: u64,
    mass: f32,
    local_inertia: [f32; 3],
    start: Transform,
    in_world: bool,
    _probe: Probe,
}

impl RecordedRigidBody {
    /// Inertia the body was built with
    pub fn local_inertia(&self) -> [f32; 3] {
        self.local_inertia
    }

    /// Whether the body is registered with a world
    pub fn is_in_world(&self) -> bool {
        self.in_world
    }
}

impl PhysicsBackend for RecordingBackend {
    type CollisionConfiguration = RecordedConfiguration;
    type Dispatcher = RecordedDispatcher;
    type Broadphase = RecordedBroadphase;
    type Solver = RecordedSolver;
    type World<'a> = RecordedWorld<'a> where Self: 'a;
    type TriangleMesh = RecordedTriangleMesh;
    type CollisionShape = RecordedShape;
    type MotionState = RecordedMotionState;
    type RigidBody = RecordedRigidBody;

    fn name(&self) -> &'static str {
        "recording"
    }

    fn create_collision_configuration(&self) -> RecordedConfiguration {
        RecordedConfiguration {
            _probe: self.probe(ResourceKind::CollisionConfiguration),
        }
    }

    fn create_dispatcher(&self, _configuration: &RecordedConfiguration) -> RecordedDispatcher {
        RecordedDispatcher {
            _probe: self.probe(ResourceKind::Dispatcher),
        }
    }

    fn create_broadphase(&self) -> RecordedBroadphase {
        RecordedBroadphase {
            _probe: self.probe(ResourceKind::Broadphase),
        }
    }

    fn create_solver(&self) -> RecordedSolver {
        RecordedSolver {
            _probe: self.probe(ResourceKind::Solver),
        }
    }

    fn create_world<'a>(&self, parts: WorldParts<'a, Self>) -> RecordedWorld<'a>
    where
        Self: 'a,
    {
        RecordedWorld {
            _parts: parts,
            gravity: [0.0; 3],
            elapsed: 0.0,
            bodies: HashMap::new(),
            _probe: self.probe(ResourceKind::PhysicsWorld),
        }
    }

    fn set_gravity(&self, world: &mut RecordedWorld<'_>, gravity: [f32; 3]) {
        world.gravity = gravity;
        self.record(LifecycleEvent::GravitySet(gravity));
    }

    fn create_triangle_mesh(&self, mesh: TriangleMesh) -> RecordedTriangleMesh {
        RecordedTriangleMesh {
            mesh,
            _probe: self.probe(ResourceKind::TriangleMesh),
        }
    }

    fn create_bvh_triangle_mesh_shape(&self, mesh: &RecordedTriangleMesh) -> RecordedShape {
        RecordedShape {
            bounds: mesh.mesh.bounds(),
            _probe: self.probe(ResourceKind::CollisionShape),
        }
    }

    fn calculate_local_inertia(&self, shape: &RecordedShape, mass: f32) -> [f32; 3] {
        self.record(LifecycleEvent::InertiaComputed { mass });

        shape
            .bounds
            .map_or([0.0; 3], |(mins, maxs)| mesh::box_inertia(mins, maxs, mass))
    }

    fn create_motion_state(&self, transform: Transform) -> RecordedMotionState {
        RecordedMotionState {
            inner: DefaultMotionState::new(transform),
            _probe: self.probe(ResourceKind::MotionState),
        }
    }

    fn create_rigid_body(&self, info: RigidBodyInfo<'_, Self>) -> RecordedRigidBody {
        let id = {
            let mut j = self.journal.borrow_mut();
            j.next_body_id += 1;
            j.next_body_id
        };
        RecordedRigidBody {
            id,
            mass: info.mass,
            local_inertia: info.local_inertia,
            start: info.motion_state.world_transform(),
            in_world: false,
            _probe: self.probe(ResourceKind::RigidBody),
        }
    }

    fn add_rigid_body(&self, world: &mut RecordedWorld<'_>, body: &mut RecordedRigidBody) {
        world.bodies.insert(
            body.id,
            PointBody {
                transform: body.start,
                velocity: [0.0; 3],
                dynamic: body.mass != 0.0,
            },
        );
        body.in_world = true;
        self.record(LifecycleEvent::BodyAdded);
    }

    fn remove_rigid_body(&self, world: &mut RecordedWorld<'_>, body: &mut RecordedRigidBody) {
        if world.bodies.remove(&body.id).is_some() {
            body.in_world = false;
            self.record(LifecycleEvent::BodyRemoved);
        }
    }

    fn step_simulation(&self, world: &mut RecordedWorld<'_>, time_step: f32, sub_iterations: u32) {
        let g = world.gravity;
        for body in world.bodies.values_mut().filter(|b| b.dynamic) {
            for i in 0..3 {
                body.velocity[i] += g[i] * time_step;
                body.transform.position[i] += body.velocity[i] * time_step;
            }
        }
        world.elapsed += f64::from(time_step);
        self.record(LifecycleEvent::Stepped {
            time_step,
            sub_iterations,
        });
    }

    fn body_transform(&self, world: &RecordedWorld<'_>, body: &RecordedRigidBody) -> Transform {
        world
            .bodies
            .get(&body.id)
            .map(|b| b.transform)
            .unwrap_or(body.start)
    }
}
