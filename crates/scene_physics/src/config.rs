//! Simulation configuration

use crate::error::{Result, SceneError};
use crate::motion::Transform;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of a single mesh simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gravity vector (default: -9.81 in Y)
    pub gravity: [f32; 3],

    /// Body mass. Zero makes the body static and skips inertia computation.
    pub mass: f32,

    /// Initial body transform
    pub initial_transform: Transform,

    /// Number of simulation steps to run
    pub step_count: u32,

    /// Fixed timestep per step, in seconds
    pub timestep: f32,

    /// Constraint solver sub-iterations per step
    pub sub_iterations: u32,

    /// Component-wise scale applied to the mesh at load time
    pub mesh_scale: [f32; 3],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            mass: 1.0,
            initial_transform: Transform::IDENTITY,
            step_count: 100,
            timestep: 1.0 / 60.0,
            sub_iterations: 10,
            mesh_scale: [1.0, 1.0, 1.0],
        }
    }
}

impl SimulationConfig {
    /// Configuration for a static (zero mass) body
    pub fn fixed_body() -> Self {
        Self {
            mass: 0.0,
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set mass
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set the initial transform
    pub fn with_initial_transform(mut self, transform: Transform) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Set the number of steps
    pub fn with_step_count(mut self, step_count: u32) -> Self {
        self.step_count = step_count;
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set solver sub-iterations
    pub fn with_sub_iterations(mut self, sub_iterations: u32) -> Self {
        self.sub_iterations = sub_iterations;
        self
    }

    /// Set the mesh scale
    pub fn with_mesh_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.mesh_scale = [x, y, z];
        self
    }

    /// Total simulated time if every step runs
    pub fn total_time(&self) -> f64 {
        f64::from(self.step_count) * f64::from(self.timestep)
    }

    /// Reject values the physics backend cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(invalid(format!("gravity must be finite, got {:?}", self.gravity)));
        }
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(invalid(format!("mass must be finite and >= 0, got {}", self.mass)));
        }
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(invalid(format!("timestep must be > 0, got {}", self.timestep)));
        }
        if self.sub_iterations == 0 {
            return Err(invalid("sub_iterations must be at least 1".to_string()));
        }
        if self
            .mesh_scale
            .iter()
            .any(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(invalid(format!(
                "mesh_scale must be finite and non-zero, got {:?}",
                self.mesh_scale
            )));
        }

        let t = &self.initial_transform;
        if t.position.iter().chain(&t.rotation).any(|c| !c.is_finite()) {
            return Err(invalid("initial_transform must be finite".to_string()));
        }
        if t.rotation_norm_squared() < f32::EPSILON {
            return Err(invalid("initial_transform rotation has zero length".to_string()));
        }

        Ok(())
    }

    /// Parse a TOML document. Missing keys take their default value.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SceneError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }
}

fn invalid(message: String) -> SceneError {
    SceneError::InvalidConfig(message)
}
