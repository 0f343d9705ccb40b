//! Run Configuration
//!
//! Decides which backend runs the meshes and with which simulation
//! parameters.
//!
//! # Configuration Sources (in priority order, last wins)
//!
//! 1. Config file given with `--config`
//! 2. Environment variables: `SCENE_BACKEND`, `SCENE_STEPS`, `SCENE_MASS`
//! 3. Command line flags
//!
//! # Example Config File
//!
//! ```toml
//! backend = "rapier"   # rapier, recording
//! inputs = ["meshes/"]
//!
//! [simulation]
//! mass = 2.0
//! step_count = 240
//! gravity = [0.0, -9.81, 0.0]
//! ```

use anyhow::{Context, Result};
use scene_physics::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Physics backend used for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Rapier 3D, real dynamics
    #[default]
    Rapier,

    /// No physics, records object lifecycles only
    Recording,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rapier => write!(f, "rapier"),
            Self::Recording => write!(f, "recording"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rapier" | "rapier3d" => Ok(Self::Rapier),
            "recording" | "record" | "dry-run" => Ok(Self::Recording),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Backend to simulate with
    pub backend: Backend,
    /// Mesh files or directories of mesh files
    pub inputs: Vec<PathBuf>,
    /// Parameters shared by every mesh
    pub simulation: SimulationConfig,
}

impl RunConfig {
    /// Load the config file if one is given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid run config {}", path.display()))?;
        log::info!("Loaded run config from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    /// Override fields from `SCENE_*` variables looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = var("SCENE_BACKEND") {
            self.backend = backend
                .parse()
                .map_err(anyhow::Error::msg)
                .context("SCENE_BACKEND")?;
            log::info!("Backend from env: {}", self.backend);
        }

        if let Some(steps) = var("SCENE_STEPS") {
            self.simulation.step_count = steps
                .trim()
                .parse()
                .with_context(|| format!("SCENE_STEPS is not a step count: {:?}", steps))?;
        }

        if let Some(mass) = var("SCENE_MASS") {
            self.simulation.mass = mass
                .trim()
                .parse()
                .with_context(|| format!("SCENE_MASS is not a number: {:?}", mass))?;
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let sim = &self.simulation;
        log::info!("Run configuration:");
        log::info!("  Backend: {}", self.backend);
        log::info!("  Inputs: {}", self.inputs.len());
        log::info!("  Gravity: {:?}", sim.gravity);
        log::info!("  Mass: {}", sim.mass);
        log::info!(
            "  Steps: {} x {:.5}s ({} sub-iterations)",
            sim.step_count,
            sim.timestep,
            sim.sub_iterations
        );
    }
}
