//! Collaborator interfaces the placement engine talks to.
//!
//! None of these are serialized. Objects that hold one keep it behind
//! `#[serde(skip)]` and get it back through an explicit `attach` call after
//! deserialization.

use haven_math::Vec3i;
use serde::{Deserialize, Serialize};

use crate::coords::{ChunkColumnCoord, ChunkCoord};
use crate::registry::{BlockId, BlockRegistry};

/// Surface heights and solidity for every column of one chunk column.
///
/// Both vectors are `CHUNK_AREA` long and indexed by
/// [`ChunkColumnCoord::local_index`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnHeights {
    /// Y of the topmost ground block of each column.
    pub heights: Vec<i32>,
    /// Whether the surface block of each column can carry a structure.
    pub solid: Vec<bool>,
}

/// Supplies terrain surface data per chunk column.
pub trait HeightSource: Send + Sync {
    /// Heights and solidity of `coord`, or `None` if the chunk is not
    /// generated far enough yet. Implementations may start loading it as a
    /// side effect.
    fn heights(&self, coord: ChunkColumnCoord) -> Option<ColumnHeights>;
}

/// Requests chunk loads. Requests are fire-and-forget and may be repeated.
pub trait ChunkLoader: Send + Sync {
    /// Request every chunk of a chunk column.
    fn load_chunk_column(&self, coord: ChunkColumnCoord);

    /// Request a single chunk.
    fn load_chunk(&self, coord: ChunkCoord);
}

/// Something to be spawned once the blocks of a structure exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityPlacement {
    /// A free entity such as a villager or a cart.
    Entity { kind: String, pos: Vec3i },
    /// Extra data bound to a block, such as chest contents.
    BlockEntity { pos: Vec3i, tag: String },
}

impl EntityPlacement {
    /// World position of the placement.
    pub fn pos(&self) -> Vec3i {
        match self {
            Self::Entity { pos, .. } | Self::BlockEntity { pos, .. } => *pos,
        }
    }

    /// Copy moved by `offset`.
    pub fn translated(&self, offset: Vec3i) -> Self {
        match self {
            Self::Entity { kind, pos } => Self::Entity {
                kind: kind.clone(),
                pos: *pos + offset,
            },
            Self::BlockEntity { pos, tag } => Self::BlockEntity {
                pos: *pos + offset,
                tag: tag.clone(),
            },
        }
    }
}

/// Read/write access to loaded world blocks.
///
/// A generation pass runs against exactly one accessor, either the live
/// world or a revertible one that buffers edits and defers entity spawning
/// until its changes are applied.
pub trait BlockAccessor {
    /// Block type metadata.
    fn registry(&self) -> &BlockRegistry;

    /// Block at `pos`, or `None` if its chunk is not loaded.
    fn block(&self, pos: Vec3i) -> Option<BlockId>;

    /// Write a block. Returns `false` if the chunk is not loaded.
    fn set_block(&mut self, pos: Vec3i, id: BlockId) -> bool;

    /// Y of the first air block above the highest non-air block of the
    /// map column, or `None` if the column is not loaded.
    fn rain_height(&self, x: i32, z: i32) -> Option<i32>;

    /// Whether the chunk is loaded.
    fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool;

    /// Whether every chunk of the column is loaded.
    fn is_column_loaded(&self, coord: ChunkColumnCoord) -> bool;

    /// True for accessors that defer entity placement until commit.
    fn is_revertible(&self) -> bool {
        false
    }

    /// Spawn an entity or attach a block entity.
    fn place_entity(&mut self, placement: &EntityPlacement);
}
