//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level haven generation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HavenConfig {
    /// World seed and search origin.
    pub world: WorldConfig,
    /// Flat-area search settings.
    pub locator: LocatorConfig,
    /// Resource zone and structure placement settings.
    pub zone: ZoneConfig,
    /// Terrain clutter removal settings.
    pub pruner: PrunerConfig,
    /// Structures making up a haven.
    pub layout: LayoutConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World seed and search origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for terrain noise and zone layout.
    pub seed: u64,
    /// Block X where the haven search starts.
    pub start_x: i32,
    /// Block Z where the haven search starts.
    pub start_z: i32,
}

/// Settings for locating a flat, dry area.
///
/// Thresholds are per surveyed column, so they do not depend on `radius`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocatorConfig {
    /// Radius of the area in blocks.
    pub radius: i32,
    /// Largest accepted roughness divided by the number of columns.
    pub max_roughness: f64,
    /// Smallest accepted fraction of columns with solid ground.
    pub min_land_ratio: f64,
    /// Spiral steps tried before giving up.
    pub max_attempts: u32,
}

/// Resource zone and structure placement settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZoneConfig {
    /// Radius the zone starts with before structures are packed into it.
    pub min_radius: i32,
    /// Allowed deviation of each probe from the structure's base height.
    pub probe_band: i32,
    /// Failed probe attempts between two search diagnostics.
    pub diagnostic_interval: u32,
}

/// Terrain clutter removal settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrunerConfig {
    /// Block type names cleared from the resource zone.
    pub prunable: Vec<String>,
}

/// One kind of structure and how many copies a haven gets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureConfig {
    /// Name used in logs.
    pub name: String,
    /// Size along X.
    pub width: i32,
    /// Size along Z.
    pub depth: i32,
    /// Wall height.
    pub height: i32,
    /// Number of copies.
    pub count: u32,
}

/// Structures making up a haven.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub structures: Vec<StructureConfig>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a state snapshot after this many generation passes (0 = never).
    pub snapshot_every: u32,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_x: 0,
            start_z: 0,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            radius: 24,
            max_roughness: 1.0,
            min_land_ratio: 0.9,
            max_attempts: 256,
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_radius: 8,
            probe_band: 2,
            diagnostic_interval: 20,
        }
    }
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self {
            prunable: vec!["log".to_string(), "leaves".to_string(), "tallgrass".to_string()],
        }
    }
}

impl StructureConfig {
    fn new(name: &str, width: i32, depth: i32, height: i32, count: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            depth,
            height,
            count,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            structures: vec![
                StructureConfig::new("hall", 9, 7, 5, 1),
                StructureConfig::new("hut", 5, 5, 4, 3),
                StructureConfig::new("well", 3, 3, 3, 1),
            ],
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            snapshot_every: 4,
        }
    }
}

/// Platform config directory for haven tools, `None` if it cannot be determined.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("haven"))
}

// --- Load / Save / Reload / Validate ---

/// File name of the persisted config inside its directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<HavenConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl HavenConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let config = HavenConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }

        let config = read_config(&config_path)?;
        log::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Save config to the given directory as [`CONFIG_FILE_NAME`].
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let write_error = |source| ConfigError::Write {
            path: config_path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_error)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, serialized).map_err(write_error)
    }

    /// Re-read the file. `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Config reloaded with changes");
        Ok(Some(fresh))
    }

    /// Checks that values are usable for generation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.locator.radius < 4 {
            return Err(invalid("locator.radius", "must be at least 4"));
        }
        if !(0.0..=1.0).contains(&self.locator.min_land_ratio) {
            return Err(invalid("locator.min_land_ratio", "must lie in 0..=1"));
        }
        if self.locator.max_roughness < 0.0 {
            return Err(invalid("locator.max_roughness", "must not be negative"));
        }
        if self.zone.min_radius < 1 {
            return Err(invalid("zone.min_radius", "must be positive"));
        }
        if self.zone.probe_band < 0 {
            return Err(invalid("zone.probe_band", "must not be negative"));
        }
        if self.zone.diagnostic_interval == 0 {
            return Err(invalid("zone.diagnostic_interval", "must be positive"));
        }
        for s in &self.layout.structures {
            if s.width < 1 || s.depth < 1 || s.height < 1 {
                return Err(invalid(
                    "layout.structures",
                    format!("structure `{}` has an empty size", s.name),
                ));
            }
        }
        Ok(())
    }
}
