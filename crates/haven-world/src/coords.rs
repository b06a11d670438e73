//! Chunk-grid coordinates.
//!
//! A chunk column is `CHUNK_SIZE x CHUNK_SIZE` block columns spanning the full
//! world height. North is -Z and west is -X.

use haven_math::Vec3i;
use serde::{Deserialize, Serialize};

/// Side length of a chunk in blocks.
pub const CHUNK_SIZE: i32 = 32;

/// Number of block columns in one chunk column.
pub const CHUNK_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Identifies a chunk column by its horizontal chunk-grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkColumnCoord {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkColumnCoord {
    /// Creates a new chunk column coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk column containing block column `(x, z)`.
    pub fn from_block(x: i32, z: i32) -> Self {
        Self::new(x.div_euclid(CHUNK_SIZE), z.div_euclid(CHUNK_SIZE))
    }

    /// Returns the column offset by `(dx, dz)` chunks.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Neighbor to the west (-X).
    pub fn west(self) -> Self {
        self.offset(-1, 0)
    }

    /// Neighbor to the north (-Z).
    pub fn north(self) -> Self {
        self.offset(0, -1)
    }

    /// Neighbor to the east (+X).
    pub fn east(self) -> Self {
        self.offset(1, 0)
    }

    /// Neighbor to the south (+Z).
    pub fn south(self) -> Self {
        self.offset(0, 1)
    }

    /// Block coordinates `(x, z)` of the north-west corner column.
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.z * CHUNK_SIZE)
    }

    /// True if block column `(x, z)` lies in this chunk column.
    pub fn contains_block(self, x: i32, z: i32) -> bool {
        Self::from_block(x, z) == self
    }

    /// Index of local column `(lx, lz)` in a row-major `CHUNK_AREA` array.
    pub fn local_index(lx: i32, lz: i32) -> usize {
        (lz * CHUNK_SIZE + lx) as usize
    }

    /// All chunk columns overlapping the inclusive block range.
    pub fn covering(min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> impl Iterator<Item = Self> {
        let lo = Self::from_block(min_x, min_z);
        let hi = Self::from_block(max_x, max_z);
        (lo.z..=hi.z).flat_map(move |z| (lo.x..=hi.x).map(move |x| Self::new(x, z)))
    }
}

/// Identifies a single cubic chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing block `pos`.
    pub fn from_block(pos: Vec3i) -> Self {
        Self::new(
            pos.x.div_euclid(CHUNK_SIZE),
            pos.y.div_euclid(CHUNK_SIZE),
            pos.z.div_euclid(CHUNK_SIZE),
        )
    }

    /// The chunk column this chunk belongs to.
    pub fn column(self) -> ChunkColumnCoord {
        ChunkColumnCoord::new(self.x, self.z)
    }
}
