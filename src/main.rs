//! Generate particle images from a scene file.
//!
//! Run with: `cargo run -- scenes/demo.json`
//!
//! Set `RUST_LOG=particle_core=debug` to trace individual placement attempts.

use particle_core::{PlacementNotice, StdRandom, SynthRng};
use particle_studio::{build_session, load_scene, save_duplicates, save_images, SceneIoResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: particle_studio <scene.json>");
        return ExitCode::FAILURE;
    };

    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(path: &Path) -> SceneIoResult<()> {
    let scene = load_scene(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let rng: Box<dyn SynthRng> = match scene.seed {
        Some(seed) => Box::new(StdRandom::from_u64_seed(seed)),
        None => Box::new(StdRandom::from_entropy()),
    };

    let mut session = build_session(&scene, base_dir, rng)?;
    let output_dir = base_dir.join(&scene.output_dir);

    let images = session.images()?;
    let written = save_images(images, &scene.images, &output_dir)?;
    for notice in session.notices() {
        match notice {
            PlacementNotice::RulesIgnored { particle, attempts } => {
                info!(particle, attempts, "placement rules were relaxed")
            }
        }
    }
    info!(
        particles = session.store().len(),
        files = written.len(),
        dir = %output_dir.display(),
        "images saved"
    );

    if scene.duplicates > 0 {
        let clock = chrono::Local::now();
        save_duplicates(
            &mut session,
            scene.duplicate_kind,
            scene.duplicates,
            &output_dir,
            &clock,
        )?;
    }
    Ok(())
}
