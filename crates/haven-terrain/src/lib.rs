//! Terrain surveying and flat-area search on top of lazily loaded chunks.
//!
//! [`TerrainSurvey`] caches per-chunk surface statistics and aggregates them
//! over disks; [`FlatAreaLocator`] walks a square spiral until it finds an
//! area that is flat and dry enough.

mod chunk;
mod locator;
mod survey;

pub use chunk::{ChunkColumnSurvey, INCOMPLETE_ROUGHNESS, TerrainStats};
pub use locator::{AreaShape, FlatAreaLocator};
pub use survey::TerrainSurvey;
