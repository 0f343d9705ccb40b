//! Physics backend interface
//!
//! The bootstrapper never talks to a physics engine directly. Every object it
//! needs is produced by a [`PhysicsBackend`], which lets the same orchestration
//! drive rapier ([`crate::rapier_backend::RapierBackend`]) or an instrumented
//! fake ([`crate::recording::RecordingBackend`]).
//!
//! Ownership mirrors the dependency graph: the world mutably borrows the
//! dispatcher, broadphase and solver for its whole lifetime, so it cannot
//! outlive them. Everything else is owned by the caller and released in
//! reverse creation order.

use crate::mesh::TriangleMesh;
use crate::motion::{MotionState, Transform};

/// The capability objects a world is built from
pub struct WorldParts<'a, B: PhysicsBackend + ?Sized> {
    /// Collision algorithm registry
    pub configuration: &'a B::CollisionConfiguration,
    /// Pairwise collision dispatcher
    pub dispatcher: &'a mut B::Dispatcher,
    /// Broadphase overlap structure
    pub broadphase: &'a mut B::Broadphase,
    /// Constraint solver
    pub solver: &'a mut B::Solver,
}

/// Everything needed to construct a rigid body
pub struct RigidBodyInfo<'a, B: PhysicsBackend + ?Sized> {
    /// Body mass; zero means static
    pub mass: f32,
    /// Motion state the body starts from
    pub motion_state: &'a B::MotionState,
    /// Collision shape of the body
    pub shape: &'a B::CollisionShape,
    /// Principal inertia in body space
    pub local_inertia: [f32; 3],
}

/// A physics engine as seen by the scene bootstrapper
pub trait PhysicsBackend {
    /// Collision algorithm registry
    type CollisionConfiguration;
    /// Pairwise collision dispatch
    type Dispatcher;
    /// Broadphase overlap structure
    type Broadphase;
    /// Constraint solver
    type Solver;
    /// Dynamics world borrowing the four capability objects
    type World<'a>
    where
        Self: 'a;
    /// Backend-side triangle buffer
    type TriangleMesh;
    /// BVH collision shape built over a triangle mesh
    type CollisionShape;
    /// Motion state attached to a rigid body
    type MotionState: MotionState;
    /// Rigid body
    type RigidBody;

    /// Human readable backend name
    fn name(&self) -> &'static str;

    /// Create the collision configuration
    fn create_collision_configuration(&self) -> Self::CollisionConfiguration;

    /// Create a dispatcher bound to `configuration`
    fn create_dispatcher(&self, configuration: &Self::CollisionConfiguration) -> Self::Dispatcher;

    /// Create the broadphase
    fn create_broadphase(&self) -> Self::Broadphase;

    /// Create the constraint solver
    fn create_solver(&self) -> Self::Solver;

    /// Create a dynamics world over the given parts
    fn create_world<'a>(&self, parts: WorldParts<'a, Self>) -> Self::World<'a>
    where
        Self: 'a;

    /// Set the world gravity
    fn set_gravity(&self, world: &mut Self::World<'_>, gravity: [f32; 3]);

    /// Move a loaded mesh into a backend triangle buffer
    fn create_triangle_mesh(&self, mesh: TriangleMesh) -> Self::TriangleMesh;

    /// Build a BVH triangle-mesh shape, constructed eagerly for static queries
    fn create_bvh_triangle_mesh_shape(&self, mesh: &Self::TriangleMesh) -> Self::CollisionShape;

    /// Local inertia of `shape` for `mass`. Never called with a zero mass.
    fn calculate_local_inertia(&self, shape: &Self::CollisionShape, mass: f32) -> [f32; 3];

    /// Create a motion state at `transform`
    fn create_motion_state(&self, transform: Transform) -> Self::MotionState;

    /// Create a rigid body (not yet part of any world)
    fn create_rigid_body(&self, info: RigidBodyInfo<'_, Self>) -> Self::RigidBody;

    /// Register `body` with `world`
    fn add_rigid_body(&self, world: &mut Self::World<'_>, body: &mut Self::RigidBody);

    /// Unregister `body` from `world`
    fn remove_rigid_body(&self, world: &mut Self::World<'_>, body: &mut Self::RigidBody);

    /// Advance the world by one fixed step
    fn step_simulation(&self, world: &mut Self::World<'_>, time_step: f32, sub_iterations: u32);

    /// Current world transform of `body`
    fn body_transform(&self, world: &Self::World<'_>, body: &Self::RigidBody) -> Transform;
}
