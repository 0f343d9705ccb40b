//! Rapier 3D implementation of [`PhysicsBackend`]
//!
//! Mapping of the backend roles onto rapier:
//!
//! | role                    | rapier                                        |
//! |-------------------------|-----------------------------------------------|
//! | collision configuration | default `IntegrationParameters`               |
//! | dispatcher              | `NarrowPhase` over parry's query dispatcher   |
//! | broadphase              | `DefaultBroadPhase`                           |
//! | solver                  | `PhysicsPipeline` + `CCDSolver`               |
//! | world                   | islands, body/collider/joint sets, gravity    |
//! | collision shape         | `SharedShape::trimesh` (BVH built eagerly)    |
//! | rigid body              | body + collider handles once registered       |

use crate::backend::{PhysicsBackend, RigidBodyInfo, WorldParts};
use crate::mesh::{self, TriangleMesh};
use crate::motion::{DefaultMotionState, MotionState, Transform};
use rapier3d::parry::query::DefaultQueryDispatcher;
use rapier3d::prelude as rapier;
use std::num::NonZeroUsize;

/// Rapier backend. Stateless; every world it creates is independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RapierBackend;

impl RapierBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

/// Integration defaults shared by every step of a world
pub struct RapierCollisionConfiguration {
    integration: rapier::IntegrationParameters,
}

/// Narrow phase: contact pair dispatch
pub struct RapierDispatcher {
    narrow_phase: rapier::NarrowPhase,
}

/// Broad phase
pub struct RapierBroadphase {
    broad_phase: rapier::DefaultBroadPhase,
}

/// Physics pipeline and CCD solver
pub struct RapierSolver {
    pipeline: rapier::PhysicsPipeline,
    ccd_solver: rapier::CCDSolver,
}

/// Rapier dynamics world
pub struct RapierWorld<'a> {
    /// Integration parameters, seeded from the configuration
    integration_params: rapier::IntegrationParameters,

    /// Narrow phase
    dispatcher: &'a mut RapierDispatcher,

    /// Broad phase
    broadphase: &'a mut RapierBroadphase,

    /// Pipeline and CCD
    solver: &'a mut RapierSolver,

    /// Gravity
    gravity: rapier::Vector<f32>,

    /// Island manager
    islands: rapier::IslandManager,

    /// Rigid body set
    bodies: rapier::RigidBodySet,

    /// Collider set
    colliders: rapier::ColliderSet,

    /// Impulse joint set
    impulse_joints: rapier::ImpulseJointSet,

    /// Multibody joint set
    multibody_joints: rapier::MultibodyJointSet,
}

impl RapierWorld<'_> {
    /// Get number of rigid bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get number of colliders
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Get gravity
    pub fn gravity(&self) -> [f32; 3] {
        [self.gravity.x, self.gravity.y, self.gravity.z]
    }
}

/// Triangle buffer in rapier's point type
pub struct RapierTriangleMesh {
    vertices: Vec<rapier::Point<f32>>,
    indices: Vec<[u32; 3]>,
}

/// BVH triangle mesh shape
pub struct RapierCollisionShape {
    shape: rapier::SharedShape,
}

impl RapierCollisionShape {
    /// Local bounds as (mins, maxs)
    pub fn local_bounds(&self) -> ([f32; 3], [f32; 3]) {
        let aabb = self.shape.compute_local_aabb();
        (
            [aabb.mins.x, aabb.mins.y, aabb.mins.z],
            [aabb.maxs.x, aabb.maxs.y, aabb.maxs.z],
        )
    }
}

/// A rigid body description plus its handles once added to a world
pub struct RapierRigidBody {
    mass: f32,
    local_inertia: [f32; 3],
    start: Transform,
    shape: rapier::SharedShape,
    handle: Option<rapier::RigidBodyHandle>,
    collider: Option<rapier::ColliderHandle>,
}

impl RapierRigidBody {
    /// Whether the body is registered with a world
    pub fn is_in_world(&self) -> bool {
        self.handle.is_some()
    }

    /// Zero mass bodies are fixed
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    fn to_rapier_builder(&self) -> rapier::RigidBodyBuilder {
        if self.is_static() {
            return rapier::RigidBodyBuilder::fixed().position(self.start.to_isometry());
        }

        let [ix, iy, iz] = self.local_inertia;
        rapier::RigidBodyBuilder::dynamic()
            .position(self.start.to_isometry())
            .additional_mass_properties(rapier::MassProperties::new(
                rapier::Point::origin(),
                self.mass,
                rapier::Vector::new(ix, iy, iz),
            ))
    }

    fn to_collider_builder(&self) -> rapier::ColliderBuilder {
        // Mass comes from the body's explicit properties only.
        rapier::ColliderBuilder::new(self.shape.clone()).density(0.0)
    }
}

impl PhysicsBackend for RapierBackend {
    type CollisionConfiguration = RapierCollisionConfiguration;
    type Dispatcher = RapierDispatcher;
    type Broadphase = RapierBroadphase;
    type Solver = RapierSolver;
    type World<'a> = RapierWorld<'a> where Self: 'a;
    type TriangleMesh = RapierTriangleMesh;
    type CollisionShape = RapierCollisionShape;
    type MotionState = DefaultMotionState;
    type RigidBody = RapierRigidBody;

    fn name(&self) -> &'static str {
        "rapier"
    }

    fn create_collision_configuration(&self) -> RapierCollisionConfiguration {
        RapierCollisionConfiguration {
            integration: rapier::IntegrationParameters::default(),
        }
    }

    fn create_dispatcher(&self, _configuration: &RapierCollisionConfiguration) -> RapierDispatcher {
        RapierDispatcher {
            narrow_phase: rapier::NarrowPhase::with_query_dispatcher(DefaultQueryDispatcher),
        }
    }

    fn create_broadphase(&self) -> RapierBroadphase {
        RapierBroadphase {
            broad_phase: rapier::DefaultBroadPhase::new(),
        }
    }

    fn create_solver(&self) -> RapierSolver {
        RapierSolver {
            pipeline: rapier::PhysicsPipeline::new(),
            ccd_solver: rapier::CCDSolver::new(),
        }
    }

    fn create_world<'a>(&self, parts: WorldParts<'a, Self>) -> RapierWorld<'a>
    where
        Self: 'a,
    {
        RapierWorld {
            integration_params: parts.configuration.integration,
            dispatcher: parts.dispatcher,
            broadphase: parts.broadphase,
            solver: parts.solver,
            gravity: rapier::Vector::zeros(),
            islands: rapier::IslandManager::new(),
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
        }
    }

    fn set_gravity(&self, world: &mut RapierWorld<'_>, gravity: [f32; 3]) {
        world.gravity = rapier::Vector::new(gravity[0], gravity[1], gravity[2]);
    }

    fn create_triangle_mesh(&self, mesh: TriangleMesh) -> RapierTriangleMesh {
        RapierTriangleMesh {
            vertices: mesh
                .vertices
                .iter()
                .map(|v| rapier::Point::new(v[0], v[1], v[2]))
                .collect(),
            indices: mesh.indices,
        }
    }

    fn create_bvh_triangle_mesh_shape(&self, mesh: &RapierTriangleMesh) -> RapierCollisionShape {
        RapierCollisionShape {
            shape: rapier::SharedShape::trimesh(mesh.vertices.clone(), mesh.indices.clone()),
        }
    }

    /// Solid box approximation over the shape's local AABB
    fn calculate_local_inertia(&self, shape: &RapierCollisionShape, mass: f32) -> [f32; 3] {
        let (mins, maxs) = shape.local_bounds();
        mesh::box_inertia(mins, maxs, mass)
    }

    fn create_motion_state(&self, transform: Transform) -> DefaultMotionState {
        DefaultMotionState::new(transform)
    }

    fn create_rigid_body(&self, info: RigidBodyInfo<'_, Self>) -> RapierRigidBody {
        RapierRigidBody {
            mass: info.mass,
            local_inertia: info.local_inertia,
            start: info.motion_state.world_transform(),
            shape: info.shape.shape.clone(),
            handle: None,
            collider: None,
        }
    }

    fn add_rigid_body(&self, world: &mut RapierWorld<'_>, body: &mut RapierRigidBody) {
        if body.is_in_world() {
            log::warn!("Rigid body is already registered, skipping");
            return;
        }

        let handle = world.bodies.insert(body.to_rapier_builder());
        let collider =
            world
                .colliders
                .insert_with_parent(body.to_collider_builder(), handle, &mut world.bodies);

        body.handle = Some(handle);
        body.collider = Some(collider);
    }

    fn remove_rigid_body(&self, world: &mut RapierWorld<'_>, body: &mut RapierRigidBody) {
        let Some(handle) = body.handle.take() else {
            return;
        };

        world.bodies.remove(
            handle,
            &mut world.islands,
            &mut world.colliders,
            &mut world.impulse_joints,
            &mut world.multibody_joints,
            true, // Remove attached colliders
        );
        body.collider = None;
    }

    fn step_simulation(&self, world: &mut RapierWorld<'_>, time_step: f32, sub_iterations: u32) {
        world.integration_params.dt = time_step;
        world.integration_params.num_solver_iterations =
            NonZeroUsize::new(sub_iterations as usize).unwrap_or(NonZeroUsize::MIN);

        let solver = &mut *world.solver;
        solver.pipeline.step(
            &world.gravity,
            &world.integration_params,
            &mut world.islands,
            &mut world.broadphase.broad_phase,
            &mut world.dispatcher.narrow_phase,
            &mut world.bodies,
            &mut world.colliders,
            &mut world.impulse_joints,
            &mut world.multibody_joints,
            &mut solver.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    fn body_transform(&self, world: &RapierWorld<'_>, body: &RapierRigidBody) -> Transform {
        body.handle
            .and_then(|handle| world.bodies.get(handle))
            .map(|b| Transform::from_isometry(b.position()))
            .unwrap_or(body.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> TriangleMesh {
        let vertices = vec![
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        TriangleMesh::new(vertices, indices)
    }

    #[test]
    fn test_box_inertia_of_unit_cube() {
        let backend = RapierBackend::new();
        let mesh = backend.create_triangle_mesh(unit_cube());
        let shape = backend.create_bvh_triangle_mesh_shape(&mesh);

        let inertia = backend.calculate_local_inertia(&shape, 12.0);
        for i in inertia {
            assert_relative_eq!(i, 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_add_and_remove_body() {
        let backend = RapierBackend::new();
        let configuration = backend.create_collision_configuration();
        let mut dispatcher = backend.create_dispatcher(&configuration);
        let mut broadphase = backend.create_broadphase();
        let mut solver = backend.create_solver();
        let mut world = backend.create_world(WorldParts {
            configuration: &configuration,
            dispatcher: &mut dispatcher,
            broadphase: &mut broadphase,
            solver: &mut solver,
        });

        let mesh = backend.create_triangle_mesh(unit_cube());
        let shape = backend.create_bvh_triangle_mesh_shape(&mesh);
        let motion_state = backend.create_motion_state(Transform::IDENTITY);
        let mut body = backend.create_rigid_body(RigidBodyInfo {
            mass: 1.0,
            motion_state: &motion_state,
            shape: &shape,
            local_inertia: [1.0, 1.0, 1.0],
        });

        backend.add_rigid_body(&mut world, &mut body);
        assert!(body.is_in_world());
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.collider_count(), 1);

        backend.remove_rigid_body(&mut world, &mut body);
        assert!(!body.is_in_world());
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.collider_count(), 0);
    }

    #[test]
    fn test_gravity_fall() {
        let backend = RapierBackend::new();
        let configuration = backend.create_collision_configuration();
        let mut dispatcher = backend.create_dispatcher(&configuration);
        let mut broadphase = backend.create_broadphase();
        let mut solver = backend.create_solver();
        let mut world = backend.create_world(WorldParts {
            configuration: &configuration,
            dispatcher: &mut dispatcher,
            broadphase: &mut broadphase,
            solver: &mut solver,
        });
        backend.set_gravity(&mut world, [0.0, -9.81, 0.0]);
        assert_eq!(world.gravity(), [0.0, -9.81, 0.0]);

        let mesh = backend.create_triangle_mesh(unit_cube());
        let shape = backend.create_bvh_triangle_mesh_shape(&mesh);
        let inertia = backend.calculate_local_inertia(&shape, 1.0);
        let motion_state = backend.create_motion_state(Transform::from_position(0.0, 10.0, 0.0));
        let mut body = backend.create_rigid_body(RigidBodyInfo {
            mass: 1.0,
            motion_state: &motion_state,
            shape: &shape,
            local_inertia: inertia,
        });
        backend.add_rigid_body(&mut world, &mut body);

        for _ in 0..60 {
            backend.step_simulation(&mut world, 1.0 / 60.0, 10);
        }

        let y = backend.body_transform(&world, &body).position[1];
        assert!(y < 10.0, "Body should fall due to gravity");

        backend.remove_rigid_body(&mut world, &mut body);
    }

    #[test]
    fn test_step_applies_timestep_and_solver_iterations() {
        let backend = RapierBackend::new();
        let configuration = backend.create_collision_configuration();
        let mut dispatcher = backend.create_dispatcher(&configuration);
        let mut broadphase = backend.create_broadphase();
        let mut solver = backend.create_solver();
        let mut world = backend.create_world(WorldParts {
            configuration: &configuration,
            dispatcher: &mut dispatcher,
            broadphase: &mut broadphase,
            solver: &mut solver,
        });

        backend.step_simulation(&mut world, 1.0 / 120.0, 7);
        assert_eq!(world.integration_params.dt, 1.0 / 120.0);
        assert_eq!(world.integration_params.num_solver_iterations.get(), 7);

        backend.step_simulation(&mut world, 1.0 / 60.0, 0);
        assert_eq!(world.integration_params.num_solver_iterations.get(), 1);
    }

    #[test]
    fn test_zero_mass_body_is_fixed() {
        let backend = RapierBackend::new();
        let configuration = backend.create_collision_configuration();
        let mut dispatcher = backend.create_dispatcher(&configuration);
        let mut broadphase = backend.create_broadphase();
        let mut solver = backend.create_solver();
        let mut world = backend.create_world(WorldParts {
            configuration: &configuration,
            dispatcher: &mut dispatcher,
            broadphase: &mut broadphase,
            solver: &mut solver,
        });
        backend.set_gravity(&mut world, [0.0, -9.81, 0.0]);

        let mesh = backend.create_triangle_mesh(unit_cube());
        let shape = backend.create_bvh_triangle_mesh_shape(&mesh);
        let motion_state = backend.create_motion_state(Transform::from_position(0.0, 3.0, 0.0));
        let mut body = backend.create_rigid_body(RigidBodyInfo {
            mass: 0.0,
            motion_state: &motion_state,
            shape: &shape,
            local_inertia: [0.0; 3],
        });
        assert!(body.is_static());
        backend.add_rigid_body(&mut world, &mut body);

        for _ in 0..30 {
            backend.step_simulation(&mut world, 1.0 / 60.0, 10);
        }

        assert_eq!(backend.body_transform(&world, &body).position, [0.0, 3.0, 0.0]);
        backend.remove_rigid_body(&mut world, &mut body);
    }
}
