//! Error types for scene construction

use crate::mesh::MeshLoadError;
use std::path::PathBuf;
use thiserror::Error;

/// Scene bootstrap errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// The mesh file could not be turned into a triangle mesh
    #[error(transparent)]
    MeshLoad(#[from] MeshLoadError),

    /// Invalid configuration
    #[error("Invalid simulation configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::config::SimulationConfig`]
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A batch input directory could not be listed
    #[error("Failed to list mesh directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SceneError {
    /// Whether this error came from loading the mesh
    pub fn is_mesh_load(&self) -> bool {
        matches!(self, Self::MeshLoad(_))
    }
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
