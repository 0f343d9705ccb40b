//! Batch runs over a directory of OBJ files
//!
//! Each file gets its own world; a failing file is recorded and the batch
//! moves on.

use crate::backend::PhysicsBackend;
use crate::bootstrap::{SceneBootstrapper, SimulationReport};
use crate::error::{Result, SceneError};
use std::path::{Path, PathBuf};

/// One file of a batch
#[derive(Debug)]
pub struct BatchEntry {
    /// Mesh file
    pub path: PathBuf,
    /// Outcome of its simulation
    pub result: Result<SimulationReport>,
}

/// All outcomes of a batch, in file name order
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-file outcomes
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    /// Files that simulated successfully
    pub fn succeeded(&self) -> impl Iterator<Item = &SimulationReport> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok())
    }

    /// Files that failed, with their error
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &SceneError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.path.as_path(), err)))
    }

    /// Number of failed files
    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// True when every file succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Whether `path` looks like a Wavefront OBJ file
pub fn is_obj_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("obj"))
}

/// List the OBJ files directly inside `dir`, sorted by name
pub fn collect_mesh_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let read_dir = std::fs::read_dir(dir).map_err(|source| SceneError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| SceneError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_obj_file(&path) {
            files.push(path);
        } else {
            log::debug!("Skipping {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

/// Simulate every file in `paths`
pub fn run_files<B, I>(bootstrapper: &SceneBootstrapper, backend: &B, paths: I) -> BatchSummary
where
    B: PhysicsBackend,
    I: IntoIterator<Item = PathBuf>,
{
    let entries = paths
        .into_iter()
        .map(|path| {
            let result = bootstrapper.build_and_simulate(backend, &path);
            if let Err(e) = &result {
                log::error!("{}: {}", path.display(), e);
            }
            BatchEntry { path, result }
        })
        .collect();

    BatchSummary { entries }
}

/// Simulate every OBJ file in `dir`
pub fn run_batch<B: PhysicsBackend>(
    bootstrapper: &SceneBootstrapper,
    backend: &B,
    dir: impl AsRef<Path>,
) -> Result<BatchSummary> {
    let files = collect_mesh_files(&dir)?;
    log::info!(
        "Found {} mesh file(s) in {}",
        files.len(),
        dir.as_ref().display()
    );
    Ok(run_files(bootstrapper, backend, files))
}
