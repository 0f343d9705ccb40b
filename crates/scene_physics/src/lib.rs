//! Scene Physics - mesh scenes on top of Rapier 3D
//!
//! Loads a Wavefront OBJ mesh, wraps it in a BVH triangle-mesh shape, drops it
//! into a fresh physics world as a single rigid body, runs a fixed number of
//! fixed-timestep steps and releases everything again.
//!
//! # Features
//!
//! - OBJ loading with triangulation and multi-object merging
//! - Pluggable physics backends (rapier, or a recording fake for dry runs)
//! - Configurable gravity, mass, initial transform, step count and timestep
//! - Per-step observers with early termination
//! - Batch runs over directories of meshes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                SceneBootstrapper                 │
//! │   SimulationConfig ──► build_and_simulate()      │
//! └──────────────────────────────────────────────────┘
//!                        │ PhysicsBackend
//!         ┌──────────────┴──────────────┐
//!         ▼                             ▼
//!   ┌──────────────┐            ┌─────────────────┐
//!   │RapierBackend │            │RecordingBackend │
//!   └──────────────┘            └─────────────────┘
//!         │
//!   ┌─────┴──────────────────────────────────────┐
//!   │ NarrowPhase · BroadPhase · PhysicsPipeline │
//!   │ RigidBodySet · ColliderSet · TriMesh       │
//!   └────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scene_physics::prelude::*;
//!
//! let bootstrapper = SceneBootstrapper::new(SimulationConfig::default().with_mass(2.0));
//! let report = bootstrapper.build_and_simulate(&RapierBackend::new(), "bowl.obj")?;
//! println!("body ended at {:?}", report.final_transform.position);
//! # Ok::<(), SceneError>(())
//! ```

pub mod backend;
pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod mesh;
pub mod motion;
pub mod rapier_backend;
pub mod recording;

pub mod prelude {
    //! Common imports for scene simulation
    pub use crate::backend::{PhysicsBackend, RigidBodyInfo, WorldParts};
    pub use crate::batch::{run_batch, run_files, BatchEntry, BatchSummary};
    pub use crate::bootstrap::{
        build_and_simulate, NoopObserver, SceneBootstrapper, SimulationReport, StepInfo,
        StepObserver,
    };
    pub use crate::config::SimulationConfig;
    pub use crate::error::{Result, SceneError};
    pub use crate::mesh::{load_obj, MeshLoadError, TriangleMesh};
    pub use crate::motion::{DefaultMotionState, MotionState, Transform};
    pub use crate::rapier_backend::RapierBackend;
    pub use crate::recording::{LifecycleEvent, RecordingBackend, ResourceKind};
}

pub use prelude::*;
