//! Scene simulation runner
//!
//! Loads OBJ meshes, drops each one into its own physics world as a single
//! rigid body and steps it under gravity. Directories are expanded to the
//! `.obj` files they contain.
//!
//! Run with: cargo run -p scene_runner -- meshes/
//!       or: cargo run --bin scene-sim -- bowl.obj --mass 0

mod run_config;

use anyhow::{bail, Result};
use clap::Parser;
use run_config::{Backend, RunConfig};
use scene_physics::batch::{collect_mesh_files, BatchSummary};
use scene_physics::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scene-sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Simulate OBJ meshes as rigid bodies", long_about = None)]
struct Cli {
    /// Mesh files or directories of mesh files
    inputs: Vec<PathBuf>,

    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulation steps
    #[arg(short, long)]
    steps: Option<u32>,

    /// Body mass (0 makes the body static)
    #[arg(short, long)]
    mass: Option<f32>,

    /// Fixed timestep in seconds
    #[arg(short, long)]
    timestep: Option<f32>,

    /// Physics backend: rapier or recording
    #[arg(short, long)]
    backend: Option<Backend>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli) {
        Ok(summary) if summary.all_succeeded() => ExitCode::SUCCESS,
        Ok(summary) => {
            log::error!(
                "{} of {} mesh(es) failed",
                summary.failure_count(),
                summary.entries.len()
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<BatchSummary> {
    let config = resolve_config(cli)?;
    config.print_summary();

    let files = expand_inputs(&config.inputs)?;
    if files.is_empty() {
        bail!("No mesh files to simulate");
    }

    let bootstrapper = SceneBootstrapper::new(config.simulation);
    let summary = match config.backend {
        Backend::Rapier => run_files(&bootstrapper, &RapierBackend::new(), files),
        Backend::Recording => {
            let backend = RecordingBackend::new();
            let summary = run_files(&bootstrapper, &backend, files);
            log::debug!(
                "Recorded {} lifecycle events, {} object(s) still live",
                backend.events().len(),
                backend.live_objects()
            );
            summary
        }
    };

    print_summary(&summary);
    Ok(summary)
}

/// Layer command line flags over the file and environment configuration
fn resolve_config(cli: Cli) -> Result<RunConfig> {
    let mut config = RunConfig::load(cli.config.as_deref())?;

    if !cli.inputs.is_empty() {
        config.inputs = cli.inputs;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(steps) = cli.steps {
        config.simulation.step_count = steps;
    }
    if let Some(mass) = cli.mass {
        config.simulation.mass = mass;
    }
    if let Some(timestep) = cli.timestep {
        config.simulation.timestep = timestep;
    }

    config.simulation.validate()?;
    Ok(config)
}

/// Replace directories by the mesh files they contain
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = collect_mesh_files(input)?;
            log::info!("Found {} mesh file(s) in {}", found.len(), input.display());
            files.extend(found);
        } else {
            // Missing files are kept so they are reported as load failures.
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_summary(summary: &BatchSummary) {
    for entry in &summary.entries {
        match &entry.result {
            Ok(report) => {
                let [x, y, z] = report.final_transform.position;
                println!(
                    "ok    {} [{}] {} tris, {} steps, {:.3}s, final ({:.4}, {:.4}, {:.4})",
                    entry.path.display(),
                    report.backend,
                    report.triangle_count,
                    report.steps_run,
                    report.simulated_time,
                    x,
                    y,
                    z
                );
            }
            Err(e) => println!("FAIL  {}: {}", entry.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "scene-sim",
            "meshes",
            "bowl.obj",
            "--steps",
            "10",
            "--mass",
            "0",
            "--backend",
            "recording",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.steps, Some(10));
        assert_eq!(cli.mass, Some(0.0));
        assert_eq!(cli.backend, Some(Backend::Recording));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["scene-sim", "--backend", "havok"]).is_err());
    }

    #[test]
    fn test_expand_inputs_mixes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.obj"), TRIANGLE).unwrap();
        fs::write(dir.path().join("a.obj"), TRIANGLE).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let single = PathBuf::from("elsewhere/single.obj");

        let files = expand_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("a.obj"));
        assert!(files[1].ends_with("b.obj"));
        assert_eq!(files[2], single);
    }

    #[test]
    fn test_run_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.obj"), TRIANGLE).unwrap();
        let cli = Cli::try_parse_from([
            "scene-sim".into(),
            dir.path().join("good.obj"),
            dir.path().join("missing.obj"),
            "--backend".into(),
            "recording".into(),
            "--steps".into(),
            "3".into(),
        ])
        .unwrap();

        let summary = run(cli).unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.succeeded().next().unwrap().steps_run, 3);
    }

    #[test]
    fn test_run_rejects_invalid_timestep() {
        let cli = Cli::try_parse_from(["scene-sim", "a.obj", "--timestep=-1"]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("timestep"));
    }
}
