//! Triangle meshes and Wavefront OBJ loading
//!
//! OBJ parsing goes through `tobj`. Every model of the file is merged into a
//! single [`TriangleMesh`]; polygons are triangulated, points and lines are
//! dropped. Only positions are kept since the mesh only feeds collision.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while loading a mesh file
#[derive(Debug, Error)]
pub enum MeshLoadError {
    /// The file does not exist
    #[error("Mesh file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read
    #[error("Failed to read mesh file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OBJ parser rejected the content
    #[error("Failed to parse OBJ file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The file parsed but holds no triangle
    #[error("Mesh file {} contains no triangles", path.display())]
    Empty { path: PathBuf },

    /// Indices or positions that cannot form a triangle mesh
    #[error("Invalid geometry in {}: {message}", path.display())]
    InvalidGeometry { path: PathBuf, message: String },
}

impl MeshLoadError {
    /// Path of the file that failed to load
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Empty { path }
            | Self::InvalidGeometry { path, .. } => path,
        }
    }
}

/// Indexed triangle soup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions
    pub vertices: Vec<[f32; 3]>,
    /// Triangles as vertex indices
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a mesh from raw buffers
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True when there is nothing to collide with
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over triangles as vertex positions
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.iter().map(move |tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Axis-aligned bounds of the referenced vertices as (mins, maxs)
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut iter = self.triangles().flatten();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(mut mins, mut maxs), p| {
            for i in 0..3 {
                mins[i] = mins[i].min(p[i]);
                maxs[i] = maxs[i].max(p[i]);
            }
            (mins, maxs)
        }))
    }

    /// Scale every vertex component-wise
    pub fn scale(&mut self, scale: [f32; 3]) {
        for v in &mut self.vertices {
            v[0] *= scale[0];
            v[1] *= scale[1];
            v[2] *= scale[2];
        }
    }

    /// Check that the mesh is non-empty, indices are in range and positions finite
    pub fn validate(&self, path: &Path) -> Result<(), MeshLoadError> {
        if self.is_empty() {
            return Err(MeshLoadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let vertex_count = self.vertices.len();
        if let Some(tri) = self
            .indices
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= vertex_count))
        {
            return Err(MeshLoadError::InvalidGeometry {
                path: path.to_path_buf(),
                message: format!(
                    "triangle {:?} references a vertex past the {} loaded",
                    tri, vertex_count
                ),
            });
        }

        if let Some(v) = self.vertices.iter().find(|v| v.iter().any(|c| !c.is_finite())) {
            return Err(MeshLoadError::InvalidGeometry {
                path: path.to_path_buf(),
                message: format!("non-finite vertex {:?}", v),
            });
        }

        Ok(())
    }
}

/// Principal inertia of a solid box spanning `mins..maxs`.
///
/// Triangle meshes have no well defined volume, so their bounding box stands
/// in for it. Very large extents overflow to infinity; callers check.
pub fn box_inertia(mins: [f32; 3], maxs: [f32; 3], mass: f32) -> [f32; 3] {
    let [ex, ey, ez] = [maxs[0] - mins[0], maxs[1] - mins[1], maxs[2] - mins[2]];
    let k = mass / 12.0;
    [
        k * (ey * ey + ez * ez),
        k * (ex * ex + ez * ez),
        k * (ex * ex + ey * ey),
    ]
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Load an OBJ file from disk
pub fn load_obj(path: impl AsRef<Path>) -> Result<TriangleMesh, MeshLoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            MeshLoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            MeshLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let mut reader = BufReader::new(file);
    load_obj_from_reader(&mut reader, path)
}

/// Load OBJ content from any buffered reader.
///
/// `path` is only used to label errors. Material libraries are never read.
pub fn load_obj_from_reader<R: BufRead>(
    reader: &mut R,
    path: &Path,
) -> Result<TriangleMesh, MeshLoadError> {
    let (models, _materials) = tobj::load_obj_buf(reader, &load_options(), |_| {
        Ok(Default::default())
    })
    .map_err(|e| MeshLoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut mesh = TriangleMesh::default();
    for model in &models {
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]]),
        );
        mesh.indices.extend(
            model
                .mesh
                .indices
                .chunks_exact(3)
                .map(|t| [base + t[0], base + t[1], base + t[2]]),
        );
    }

    mesh.validate(path)?;

    log::debug!(
        "Parsed {}: {} model(s), {} vertices, {} triangles",
        path.display(),
        models.len(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    Ok(mesh)
}
