//! Scene bootstrapper: mesh file in, simulated rigid body out
//!
//! [`SceneBootstrapper::build_and_simulate`] builds a complete world around one
//! mesh, steps it, and tears everything down before returning. Objects are
//! held in locals declared in creation order, so they drop in exactly the
//! reverse order on every exit path:
//!
//! ```text
//! create:  configuration → dispatcher → broadphase → solver → world
//!          → triangle mesh → shape → motion state → body
//! destroy: body → motion state → shape → triangle mesh
//!          → world → solver → broadphase → dispatcher → configuration
//! ```

use crate::backend::{PhysicsBackend, RigidBodyInfo, WorldParts};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::mesh::{self, MeshLoadError, TriangleMesh};
use crate::motion::{MotionState, Transform};
use crate::rapier_backend::RapierBackend;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// State handed to a [`StepObserver`] after each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    /// 1-based index of the step that just ran
    pub step: u32,
    /// Total simulated time so far, in seconds
    pub elapsed: f64,
    /// Timestep of this step
    pub time_step: f32,
    /// Body transform after this step
    pub transform: Transform,
}

/// Hook called after every simulation step.
///
/// Returning [`ControlFlow::Break`] stops the loop early; teardown is the same
/// as for a full run.
pub trait StepObserver {
    /// Inspect the state after a step
    fn on_step(&mut self, info: &StepInfo) -> ControlFlow<()>;
}

impl<F> StepObserver for F
where
    F: FnMut(&StepInfo) -> ControlFlow<()>,
{
    fn on_step(&mut self, info: &StepInfo) -> ControlFlow<()> {
        self(info)
    }
}

/// Observer that never interrupts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&mut self, _info: &StepInfo) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Outcome of one simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// Mesh file the body was built from
    pub mesh_path: PathBuf,
    /// Backend that ran the simulation
    pub backend: &'static str,
    /// Triangles in the loaded mesh
    pub triangle_count: usize,
    /// Vertices in the loaded mesh
    pub vertex_count: usize,
    /// Body mass
    pub mass: f32,
    /// Local inertia the body was built with
    pub local_inertia: [f32; 3],
    /// Steps actually run
    pub steps_run: u32,
    /// Simulated time, in seconds
    pub simulated_time: f64,
    /// Body transform after the last step
    pub final_transform: Transform,
    /// False when an observer stopped the run early
    pub completed: bool,
}

/// Builds and simulates single-body mesh scenes
#[derive(Debug, Clone, Default)]
pub struct SceneBootstrapper {
    config: SimulationConfig,
}

impl SceneBootstrapper {
    /// Create a bootstrapper with `config`
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Get the simulation configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Build a world around the mesh at `mesh_path`, simulate it, tear it down
    pub fn build_and_simulate<B: PhysicsBackend>(
        &self,
        backend: &B,
        mesh_path: impl AsRef<Path>,
    ) -> Result<SimulationReport> {
        self.build_and_simulate_with_observer(backend, mesh_path, &mut NoopObserver)
    }

    /// Like [`Self::build_and_simulate`], calling `observer` after each step
    pub fn build_and_simulate_with_observer<B, O>(
        &self,
        backend: &B,
        mesh_path: impl AsRef<Path>,
        observer: &mut O,
    ) -> Result<SimulationReport>
    where
        B: PhysicsBackend,
        O: StepObserver + ?Sized,
    {
        let config = &self.config;
        config.validate()?;
        let mesh_path = mesh_path.as_ref();

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
        backend.set_gravity(&mut world, config.gravity);
        log::debug!(
            "Created {} world with gravity {:?}",
            backend.name(),
            config.gravity
        );

        let loaded = match load_scaled(mesh_path, config.mesh_scale) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("Aborting scene for {}: {}", mesh_path.display(), e);
                return Err(e.into());
            }
        };
        let triangle_count = loaded.triangle_count();
        let vertex_count = loaded.vertex_count();
        log::info!(
            "Loaded {} ({} triangles, {} vertices)",
            mesh_path.display(),
            triangle_count,
            vertex_count
        );

        let triangle_mesh = backend.create_triangle_mesh(loaded);
        let shape = backend.create_bvh_triangle_mesh_shape(&triangle_mesh);

        let local_inertia = if config.mass != 0.0 {
            backend.calculate_local_inertia(&shape, config.mass)
        } else {
            log::debug!("Zero mass: body is static, inertia left at zero");
            [0.0; 3]
        };
        if local_inertia.iter().any(|i| !i.is_finite()) {
            let e = MeshLoadError::InvalidGeometry {
                path: mesh_path.to_path_buf(),
                message: format!("mesh is too large for a finite inertia {:?}", local_inertia),
            };
            log::warn!("Aborting scene for {}: {}", mesh_path.display(), e);
            return Err(e.into());
        }

        let mut motion_state = backend.create_motion_state(config.initial_transform);
        let mut body = backend.create_rigid_body(RigidBodyInfo {
            mass: config.mass,
            motion_state: &motion_state,
            shape: &shape,
            local_inertia,
        });
        backend.add_rigid_body(&mut world, &mut body);

        let mut steps_run = 0;
        let mut elapsed = 0.0f64;
        for step in 1..=config.step_count {
            backend.step_simulation(&mut world, config.timestep, config.sub_iterations);
            steps_run = step;
            elapsed += f64::from(config.timestep);
            motion_state.set_world_transform(backend.body_transform(&world, &body));

            let info = StepInfo {
                step,
                elapsed,
                time_step: config.timestep,
                transform: motion_state.world_transform(),
            };
            log::trace!("step {} t={:.4} pos={:?}", step, elapsed, info.transform.position);

            if observer.on_step(&info).is_break() {
                log::info!("Observer stopped the simulation after step {}", step);
                break;
            }
        }

        let report = SimulationReport {
            mesh_path: mesh_path.to_path_buf(),
            backend: backend.name(),
            triangle_count,
            vertex_count,
            mass: config.mass,
            local_inertia,
            steps_run,
            simulated_time: elapsed,
            final_transform: motion_state.world_transform(),
            completed: steps_run == config.step_count,
        };

        backend.remove_rigid_body(&mut world, &mut body);
        log::info!(
            "Simulated {} for {} steps ({:.3}s), final position {:?}",
            mesh_path.display(),
            report.steps_run,
            report.simulated_time,
            report.final_transform.position
        );
        log::debug!("Releasing scene for {}", mesh_path.display());

        Ok(report)
    }
}

fn load_scaled(path: &Path, scale: [f32; 3]) -> std::result::Result<TriangleMesh, MeshLoadError> {
    let mut mesh = mesh::load_obj(path)?;
    if scale != [1.0, 1.0, 1.0] {
        mesh.scale(scale);
        // Scaling can overflow positions that loaded fine.
        mesh.validate(path)?;
    }
    Ok(mesh)
}

/// Run the default scene (rapier, default configuration) for `mesh_path`
pub fn build_and_simulate(mesh_path: impl AsRef<Path>) -> Result<SimulationReport> {
    SceneBootstrapper::default().build_and_simulate(&RapierBackend::new(), mesh_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SceneError;
    use crate::recording::{LifecycleEvent, RecordingBackend, ResourceKind};
    use std::io::Write;

    fn write_triangle() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();
        file
    }

    #[test]
    fn test_invalid_config_builds_nothing() {
        let backend = RecordingBackend::new();
        let bootstrapper = SceneBootstrapper::new(SimulationConfig::default().with_timestep(0.0));
        let file = write_triangle();

        let err = bootstrapper.build_and_simulate(&backend, file.path()).unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig(_)));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_gravity_is_set_before_loading() {
        let backend = RecordingBackend::new();
        let _ = SceneBootstrapper::default().build_and_simulate(&backend, "missing.obj");

        let events = backend.events();
        let gravity = events
            .iter()
            .position(|e| matches!(e, LifecycleEvent::GravitySet(_)))
            .unwrap();
        let world = events
            .iter()
            .position(|e| *e == LifecycleEvent::Created(ResourceKind::PhysicsWorld))
            .unwrap();
        assert!(world < gravity);
        assert_eq!(events[gravity], LifecycleEvent::GravitySet([0.0, -9.81, 0.0]));
    }

    #[test]
    fn test_observer_can_stop_early() {
        let backend = RecordingBackend::new();
        let file = write_triangle();
        let mut seen = Vec::new();
        let mut observer = |info: &StepInfo| {
            seen.push(info.step);
            if info.step == 5 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let report = SceneBootstrapper::default()
            .build_and_simulate_with_observer(&backend, file.path(), &mut observer)
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.steps_run, 5);
        assert!(!report.completed);
        assert_eq!(backend.step_count(), 5);
        assert_eq!(backend.live_objects(), 0);
        assert_eq!(backend.destruction_order()[0], ResourceKind::RigidBody);
    }

    #[test]
    fn test_motion_state_follows_body() {
        let backend = RecordingBackend::new();
        let file = write_triangle();
        let mut heights = Vec::new();
        let mut observer = |info: &StepInfo| {
            heights.push(info.transform.position[1]);
            ControlFlow::Continue(())
        };

        let report = SceneBootstrapper::new(SimulationConfig::default().with_step_count(10))
            .build_and_simulate_with_observer(&backend, file.path(), &mut observer)
            .unwrap();

        assert_eq!(heights.len(), 10);
        assert!(heights.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(report.final_transform.position[1], heights[9]);
    }

    #[test]
    fn test_zero_steps() {
        let backend = RecordingBackend::new();
        let file = write_triangle();
        let report = SceneBootstrapper::new(SimulationConfig::default().with_step_count(0))
            .build_and_simulate(&backend, file.path())
            .unwrap();

        assert_eq!(report.steps_run, 0);
        assert!(report.completed);
        assert!(report.final_transform.is_identity());
        assert_eq!(backend.step_count(), 0);
    }

    #[test]
    fn test_mesh_scale_is_applied() {
        let backend = RecordingBackend::new();
        let file = write_triangle();
        let unscaled = SceneBootstrapper::default()
            .build_and_simulate(&backend, file.path())
            .unwrap();
        let scaled = SceneBootstrapper::new(SimulationConfig::default().with_mesh_scale(2.0, 2.0, 2.0))
            .build_and_simulate(&backend, file.path())
            .unwrap();

        // Box inertia grows with the square of the extents.
        for i in 0..3 {
            assert!((scaled.local_inertia[i] - 4.0 * unscaled.local_inertia[i]).abs() < 1e-5);
        }
    }

    fn write_obj(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_scale_overflow_is_invalid_geometry() {
        let file = write_obj("v 0 0 0\nv 1e30 0 0\nv 0 1e30 0\nf 1 2 3\n");
        let config = SimulationConfig::default().with_mesh_scale(1e10, 1e10, 1e10);

        let recording = RecordingBackend::new();
        let err = SceneBootstrapper::new(config.clone())
            .build_and_simulate(&recording, file.path())
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::MeshLoad(MeshLoadError::InvalidGeometry { .. })
        ));
        assert_eq!(recording.live_objects(), 0);
        assert!(!recording
            .creation_order()
            .contains(&ResourceKind::TriangleMesh));

        let err = SceneBootstrapper::new(config)
            .build_and_simulate(&RapierBackend::new(), file.path())
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::MeshLoad(MeshLoadError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_infinite_inertia_is_rejected() {
        let file = write_obj("v 0 0 0\nv 1e25 0 0\nv 0 1e25 0\nf 1 2 3\n");

        let recording = RecordingBackend::new();
        let err = SceneBootstrapper::default()
            .build_and_simulate(&recording, file.path())
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::MeshLoad(MeshLoadError::InvalidGeometry { .. })
        ));
        assert_eq!(recording.inertia_computations(), 1);
        assert!(!recording.creation_order().contains(&ResourceKind::RigidBody));
        assert_eq!(recording.live_objects(), 0);
        assert_eq!(
            recording.destruction_order(),
            vec![
                ResourceKind::CollisionShape,
                ResourceKind::TriangleMesh,
                ResourceKind::PhysicsWorld,
                ResourceKind::Solver,
                ResourceKind::Broadphase,
                ResourceKind::Dispatcher,
                ResourceKind::CollisionConfiguration,
            ]
        );

        let err = SceneBootstrapper::default()
            .build_and_simulate(&RapierBackend::new(), file.path())
            .unwrap_err();
        assert!(err.is_mesh_load());
    }

    #[test]
    fn test_large_mesh_without_mass_is_accepted() {
        let file = write_obj("v 0 0 0\nv 1e25 0 0\nv 0 1e25 0\nf 1 2 3\n");
        let report = SceneBootstrapper::new(SimulationConfig::fixed_body().with_step_count(1))
            .build_and_simulate(&RecordingBackend::new(), file.path())
            .unwrap();
        assert_eq!(report.local_inertia, [0.0; 3]);
    }

    #[test]
    fn test_default_rapier_run() {
        let file = write_triangle();
        let report = build_and_simulate(file.path()).unwrap();

        assert_eq!(report.backend, "rapier");
        assert_eq!(report.steps_run, 100);
        assert!(report.completed);
        assert_eq!(report.triangle_count, 1);
        assert!(report.final_transform.position[1] < 0.0);
    }
}
