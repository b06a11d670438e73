//! Surface statistics of a single chunk column.

use std::ops::AddAssign;

use haven_world::{CHUNK_AREA, CHUNK_SIZE, ChunkColumnCoord, ColumnHeights};
use serde::{Deserialize, Serialize};

/// Roughness value of a chunk whose west or north neighbor was not available.
pub const INCOMPLETE_ROUGHNESS: i64 = -1;

/// Aggregated surface measurements over some set of columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainStats {
    /// Sum of absolute height differences between adjacent columns.
    pub roughness: i64,
    /// Columns whose surface can carry a structure.
    pub solid_count: u32,
    /// Sum of surface heights.
    pub sum_height: i64,
    /// Number of columns measured.
    pub column_count: u32,
}

impl TerrainStats {
    /// Mean surface height rounded to the nearest block, `None` if empty.
    pub fn mean_height(&self) -> Option<i32> {
        if self.column_count == 0 {
            return None;
        }
        Some((self.sum_height as f64 / self.column_count as f64).round() as i32)
    }

    /// Fraction of columns with solid ground; 0 if empty.
    pub fn land_ratio(&self) -> f64 {
        if self.column_count == 0 {
            return 0.0;
        }
        self.solid_count as f64 / self.column_count as f64
    }
}

impl AddAssign for TerrainStats {
    fn add_assign(&mut self, rhs: Self) {
        self.roughness += rhs.roughness;
        self.solid_count += rhs.solid_count;
        self.sum_height += rhs.sum_height;
        self.column_count += rhs.column_count;
    }
}

/// Heights, solidity and aggregate statistics of one chunk column.
///
/// Roughness covers every adjacent pair inside the chunk plus the border
/// against the west and north neighbors. The east and south borders belong
/// to those neighbors, so every pair in the world is counted exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkColumnSurvey {
    coord: ChunkColumnCoord,
    heights: Vec<i32>,
    solid: Vec<bool>,
    roughness: i64,
    solid_count: u32,
    sum_height: i64,
}

impl ChunkColumnSurvey {
    /// Builds the survey of `coord` from its raw column data.
    ///
    /// `west` and `north` are the already built neighbors, if any. When
    /// either is missing the roughness is [`INCOMPLETE_ROUGHNESS`] until
    /// [`recalculate_roughness`](Self::recalculate_roughness) succeeds.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold exactly one entry per column.
    pub fn new(
        coord: ChunkColumnCoord,
        data: ColumnHeights,
        west: Option<&ChunkColumnSurvey>,
        north: Option<&ChunkColumnSurvey>,
    ) -> Self {
        assert!(
            data.heights.len() == CHUNK_AREA && data.solid.len() == CHUNK_AREA,
            "column data for {coord:?} must have {CHUNK_AREA} entries"
        );
        let solid_count = data.solid.iter().filter(|&&s| s).count() as u32;
        let sum_height = data.heights.iter().map(|&h| h as i64).sum();
        let mut survey = Self {
            coord,
            heights: data.heights,
            solid: data.solid,
            roughness: INCOMPLETE_ROUGHNESS,
            solid_count,
            sum_height,
        };
        survey.recalculate_roughness(west, north);
        survey
    }

    /// Chunk column this survey describes.
    pub fn coord(&self) -> ChunkColumnCoord {
        self.coord
    }

    /// Surface height at local column `(lx, lz)`.
    pub fn height(&self, lx: i32, lz: i32) -> i32 {
        self.heights[ChunkColumnCoord::local_index(lx, lz)]
    }

    /// Whether the surface at local column `(lx, lz)` is solid.
    pub fn is_solid(&self, lx: i32, lz: i32) -> bool {
        self.solid[ChunkColumnCoord::local_index(lx, lz)]
    }

    /// Roughness, or [`INCOMPLETE_ROUGHNESS`].
    pub fn roughness(&self) -> i64 {
        self.roughness
    }

    pub fn is_roughness_complete(&self) -> bool {
        self.roughness != INCOMPLETE_ROUGHNESS
    }

    /// Whole-chunk statistics. An incomplete roughness counts as zero.
    pub fn stats(&self) -> TerrainStats {
        TerrainStats {
            roughness: self.roughness.max(0),
            solid_count: self.solid_count,
            sum_height: self.sum_height,
            column_count: CHUNK_AREA as u32,
        }
    }

    /// Recompute roughness from scratch against the given neighbors.
    ///
    /// The result only depends on the three chunks involved, so calling
    /// this repeatedly or in any neighbor order gives the same value.
    pub fn recalculate_roughness(
        &mut self,
        west: Option<&ChunkColumnSurvey>,
        north: Option<&ChunkColumnSurvey>,
    ) {
        self.roughness = self.compute_roughness(west, north);
    }

    pub(crate) fn compute_roughness(
        &self,
        west: Option<&ChunkColumnSurvey>,
        north: Option<&ChunkColumnSurvey>,
    ) -> i64 {
        let (Some(west), Some(north)) = (west, north) else {
            return INCOMPLETE_ROUGHNESS;
        };
        debug_assert_eq!(west.coord, self.coord.west());
        debug_assert_eq!(north.coord, self.coord.north());

        let last = CHUNK_SIZE - 1;
        let mut total = 0i64;
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let h = self.height(lx, lz);
                let west_h = if lx > 0 { self.height(lx - 1, lz) } else { west.height(last, lz) };
                let north_h = if lz > 0 { self.height(lx, lz - 1) } else { north.height(lx, last) };
                total += (h - west_h).abs() as i64 + (h - north_h).abs() as i64;
            }
        }
        total
    }

    pub(crate) fn set_roughness(&mut self, roughness: i64) {
        self.roughness = roughness;
    }
}
