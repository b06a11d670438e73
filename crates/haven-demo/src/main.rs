//! Demo binary that builds a haven in a noise-generated world.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p haven-demo -- --seed 7 --start-x -300`.
//!
//! Chunks are only delivered between generation passes, and the generator is
//! periodically persisted to disk and restored, so every resumable path runs.

mod terrain;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use haven_config::{CliArgs, HavenConfig, default_config_dir};
use haven_math::TerrainHeightLinReg;
use haven_placement::{HavenGenerator, layout_schematics};
use haven_world::{BlockRegistry, ChunkColumnCoord, MemoryWorld, PersistError, Persistent, Progress};
use tracing::{debug, error, info, warn};

use crate::terrain::{TerrainParams, noise_world};

/// Name of the generator snapshot inside the state directory.
const SNAPSHOT_FILE: &str = "haven.state";

/// Passes without a single chunk request before the run is declared stuck.
const MAX_IDLE_PASSES: u32 = 3;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut config = HavenConfig::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        HavenConfig::default()
    });
    config.apply_cli_overrides(&args);

    let state_dir = args.state_dir.clone().unwrap_or_else(|| config_dir.clone());
    haven_log::init_logging(Some(&state_dir.join("logs")), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::from(2);
    }

    match run(&config, &state_dir) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!(error = %e, "haven generation aborted");
            ExitCode::from(1)
        }
    }
}

/// Generates one haven. Returns whether a site was found.
fn run(config: &HavenConfig, state_dir: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let mut registry = BlockRegistry::with_defaults();
    registry.set_prunable(&config.pruner.prunable)?;
    let params = TerrainParams {
        seed: config.world.seed,
        ..Default::default()
    };
    let world = Arc::new(noise_world(registry, params));

    let schematics = layout_schematics(&config.layout, world.registry(), config.zone.probe_band)?;
    info!(
        seed = config.world.seed,
        start_x = config.world.start_x,
        start_z = config.world.start_z,
        structures = schematics.len(),
        "starting haven generation"
    );
    let mut generator = HavenGenerator::new(config, schematics, world.clone(), world.clone());
    let mut accessor = world.accessor();

    let snapshot = state_dir.join(SNAPSHOT_FILE);
    let mut passes = 0u32;
    let mut idle = 0u32;
    while generator.generate(&mut accessor) == Progress::Incomplete {
        passes += 1;
        let loaded = world.load_pending();
        debug!(pass = passes, loaded, stage = ?generator.stage(), "generation pass");

        idle = if loaded == 0 { idle + 1 } else { 0 };
        if idle >= MAX_IDLE_PASSES {
            warn!(passes, "generation stalled without chunk requests");
            return Ok(false);
        }

        let every = config.debug.snapshot_every;
        if every > 0 && passes % every == 0 {
            generator = round_trip(&generator, &snapshot, &world)?;
        }
    }

    if generator.is_failed() {
        warn!(passes, attempts = generator.locator().attempts(), "no haven site found");
        return Ok(false);
    }

    generator.commit(&mut accessor);
    summarize(&generator, &world, passes);
    Ok(true)
}

/// Persists the generator, reads it back and re-attaches the world.
fn round_trip(
    generator: &HavenGenerator,
    path: &Path,
    world: &Arc<MemoryWorld>,
) -> Result<HavenGenerator, PersistError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    generator.save_to(path)?;
    let mut restored = HavenGenerator::load_from(path)?;
    restored.attach(world.clone(), world.clone());
    debug!(path = %path.display(), stage = ?restored.stage(), "generator restored from snapshot");
    Ok(restored)
}

fn summarize(generator: &HavenGenerator, world: &MemoryWorld, passes: u32) {
    let (Some(zone), Some(pruner)) = (generator.zone(), generator.pruner()) else {
        return;
    };
    let center = zone.center();
    info!(
        center = %center,
        radius = zone.radius(),
        passes,
        chunks_surveyed = generator.survey().len(),
        blocks_pruned = pruner.cleared(),
        entities = world.entities().len(),
        "haven complete"
    );
    for placer in generator.placers() {
        info!(
            id = placer.id(),
            schematic = placer.schematic().name(),
            offset = %placer.offset(),
            attempts = placer.attempts(),
            "structure placed"
        );
    }

    // Fit a plane to the surveyed ground of the zone.
    let mut fit = TerrainHeightLinReg::new();
    let r = zone.radius().ceil() as i32;
    for dz in -r..=r {
        for dx in -r..=r {
            if dx * dx + dz * dz > r * r {
                continue;
            }
            let (x, z) = (center.x + dx, center.z + dz);
            let coord = ChunkColumnCoord::from_block(x, z);
            let (ox, oz) = coord.origin();
            if let Some(chunk) = generator.survey().cached(coord) {
                fit.add(x, z, chunk.height(x - ox, z - oz));
            }
        }
    }
    if !fit.is_empty() {
        info!(
            samples = fit.len(),
            slope_x = fit.x_param(),
            slope_z = fit.z_param(),
            variance = fit.variance(),
            r_squared = fit.r_squared(),
            "zone ground plane"
        );
    }
}
