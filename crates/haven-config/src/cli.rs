//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::HavenConfig;

/// Haven generator command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "haven", about = "Locate and build a haven in a generated world")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Block X where the search starts.
    #[arg(long, allow_hyphen_values = true)]
    pub start_x: Option<i32>,

    /// Block Z where the search starts.
    #[arg(long, allow_hyphen_values = true)]
    pub start_z: Option<i32>,

    /// Radius of the flat area to look for.
    #[arg(long)]
    pub radius: Option<i32>,

    /// Spiral steps before the search gives up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for state snapshots and logs (defaults to the config directory).
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

impl HavenConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(x) = args.start_x {
            self.world.start_x = x;
        }
        if let Some(z) = args.start_z {
            self.world.start_z = z;
        }
        if let Some(r) = args.radius {
            self.locator.radius = r;
        }
        if let Some(n) = args.max_attempts {
            self.locator.max_attempts = n;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
