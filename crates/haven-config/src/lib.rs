//! Configuration for haven generation.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section defaults independently, so older or partial
//! files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, DebugConfig, HavenConfig, LayoutConfig, LocatorConfig, PrunerConfig, StructureConfig,
    WorldConfig, ZoneConfig, default_config_dir,
};
pub use error::ConfigError;
