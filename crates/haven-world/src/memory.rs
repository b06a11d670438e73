//! In-memory world with deferred chunk loading.
//!
//! Terrain is produced per block column by a caller-supplied function. A
//! chunk column only becomes readable after it has been requested and
//! [`MemoryWorld::load_pending`] has run, which mirrors an asynchronous
//! loader delivering chunks between generation passes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use haven_math::Vec3i;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::coords::{CHUNK_AREA, CHUNK_SIZE, ChunkColumnCoord, ChunkCoord};
use crate::registry::{BlockId, BlockRegistry};
use crate::source::{BlockAccessor, ChunkLoader, ColumnHeights, EntityPlacement, HeightSource};

// ---------------------------------------------------------------------------
// Terrain description
// ---------------------------------------------------------------------------

/// Generated content of one block column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Y of the surface block.
    pub height: i32,
    /// The surface block itself.
    pub surface: BlockId,
    /// Block filling everything from y = 0 up to the surface.
    pub fill: BlockId,
    /// Blocks stacked directly on top of the surface, bottom first.
    pub decoration: Vec<BlockId>,
}

impl ColumnSpec {
    /// Plain column without decoration.
    pub fn new(height: i32, surface: BlockId, fill: BlockId) -> Self {
        Self {
            height,
            surface,
            fill,
            decoration: Vec::new(),
        }
    }

    /// Adds decoration on top of the surface.
    pub fn with_decoration(mut self, decoration: Vec<BlockId>) -> Self {
        self.decoration = decoration;
        self
    }

    fn build(&self) -> Vec<BlockId> {
        let height = self.height.max(0) as usize;
        let mut blocks = vec![self.fill; height];
        blocks.push(self.surface);
        blocks.extend_from_slice(&self.decoration);
        blocks
    }
}

type TerrainFn = dyn Fn(&BlockRegistry, i32, i32) -> ColumnSpec + Send + Sync;

/// Blocks and surface survey of one loaded chunk column.
struct LoadedColumn {
    /// Per block column, the blocks from y = 0 upward. Above the end is air.
    blocks: Vec<Vec<BlockId>>,
    heights: Vec<i32>,
    solid: Vec<bool>,
}

#[derive(Default)]
struct WorldState {
    loaded: FxHashMap<ChunkColumnCoord, LoadedColumn>,
    queue: Vec<ChunkColumnCoord>,
    queued: FxHashSet<ChunkColumnCoord>,
    entities: Vec<EntityPlacement>,
    requests: u64,
}

impl WorldState {
    fn request(&mut self, coord: ChunkColumnCoord) {
        self.requests += 1;
        if !self.loaded.contains_key(&coord) && self.queued.insert(coord) {
            self.queue.push(coord);
        }
    }

    fn column(&self, x: i32, z: i32) -> Option<&Vec<BlockId>> {
        let coord = ChunkColumnCoord::from_block(x, z);
        let (ox, oz) = coord.origin();
        self.loaded
            .get(&coord)
            .map(|c| &c.blocks[ChunkColumnCoord::local_index(x - ox, z - oz)])
    }

    fn column_mut(&mut self, x: i32, z: i32) -> Option<&mut Vec<BlockId>> {
        let coord = ChunkColumnCoord::from_block(x, z);
        let (ox, oz) = coord.origin();
        self.loaded
            .get_mut(&coord)
            .map(|c| &mut c.blocks[ChunkColumnCoord::local_index(x - ox, z - oz)])
    }
}

// ---------------------------------------------------------------------------
// MemoryWorld
// ---------------------------------------------------------------------------

/// A world held entirely in memory.
///
/// Shared through `Arc`; all mutation goes through an internal lock so the
/// world can serve as height source, chunk loader and block store at once.
pub struct MemoryWorld {
    registry: BlockRegistry,
    terrain: Box<TerrainFn>,
    state: Mutex<WorldState>,
}

impl MemoryWorld {
    /// Creates a world whose columns are produced by `terrain`.
    pub fn new(
        registry: BlockRegistry,
        terrain: impl Fn(&BlockRegistry, i32, i32) -> ColumnSpec + Send + Sync + 'static,
    ) -> Self {
        Self {
            registry,
            terrain: Box::new(terrain),
            state: Mutex::new(WorldState::default()),
        }
    }

    /// Grass-covered flat world with its surface at `height`.
    pub fn flat(height: i32) -> Self {
        let registry = BlockRegistry::with_defaults();
        let grass = registry.id_of("grass").unwrap_or_default();
        let dirt = registry.id_of("dirt").unwrap_or_default();
        Self::new(registry, move |_, _, _| ColumnSpec::new(height, grass, dirt))
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block type metadata.
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Generates every chunk column requested so far. Returns how many were
    /// loaded.
    pub fn load_pending(&self) -> usize {
        let queue = {
            let mut state = self.state();
            state.queued.clear();
            std::mem::take(&mut state.queue)
        };
        let count = queue.len();
        for coord in queue {
            self.load_now(coord);
        }
        if count > 0 {
            trace!(count, "memory world loaded chunk columns");
        }
        count
    }

    /// Generates `coord` immediately if it is not loaded yet.
    pub fn load_now(&self, coord: ChunkColumnCoord) {
        if self.is_loaded(coord) {
            return;
        }
        let column = self.generate(coord);
        self.state().loaded.entry(coord).or_insert(column);
    }

    fn generate(&self, coord: ChunkColumnCoord) -> LoadedColumn {
        let (ox, oz) = coord.origin();
        let mut blocks = Vec::with_capacity(CHUNK_AREA);
        let mut heights = Vec::with_capacity(CHUNK_AREA);
        let mut solid = Vec::with_capacity(CHUNK_AREA);
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let spec = (self.terrain)(&self.registry, ox + lx, oz + lz);
                heights.push(spec.height);
                solid.push(self.registry.is_solid(spec.surface));
                blocks.push(spec.build());
            }
        }
        LoadedColumn {
            blocks,
            heights,
            solid,
        }
    }

    /// Whether the chunk column has been generated.
    pub fn is_loaded(&self, coord: ChunkColumnCoord) -> bool {
        self.state().loaded.contains_key(&coord)
    }

    /// Number of chunk columns waiting for [`load_pending`](Self::load_pending).
    pub fn pending_count(&self) -> usize {
        self.state().queue.len()
    }

    /// Number of load requests received, including duplicates.
    pub fn request_count(&self) -> u64 {
        self.state().requests
    }

    /// Block at `pos`, or `None` if its chunk column is not loaded.
    pub fn block(&self, pos: Vec3i) -> Option<BlockId> {
        let state = self.state();
        let column = state.column(pos.x, pos.z)?;
        let id = match pos.y {
            y if y < 0 => column.first().copied().unwrap_or(BlockId::AIR),
            y => column.get(y as usize).copied().unwrap_or(BlockId::AIR),
        };
        Some(id)
    }

    /// Entities placed through a non-revertible accessor or applied from a
    /// revertible one.
    pub fn entities(&self) -> Vec<EntityPlacement> {
        self.state().entities.clone()
    }

    /// Accessor writing straight into the world.
    pub fn accessor(self: &Arc<Self>) -> MemoryAccessor {
        MemoryAccessor::new(Arc::clone(self), false)
    }

    /// Accessor that holds entity placements back until
    /// [`MemoryAccessor::apply`].
    pub fn revertible_accessor(self: &Arc<Self>) -> MemoryAccessor {
        MemoryAccessor::new(Arc::clone(self), true)
    }
}

impl HeightSource for MemoryWorld {
    fn heights(&self, coord: ChunkColumnCoord) -> Option<ColumnHeights> {
        let mut state = self.state();
        if let Some(column) = state.loaded.get(&coord) {
            return Some(ColumnHeights {
                heights: column.heights.clone(),
                solid: column.solid.clone(),
            });
        }
        state.request(coord);
        None
    }
}

impl ChunkLoader for MemoryWorld {
    fn load_chunk_column(&self, coord: ChunkColumnCoord) {
        self.state().request(coord);
    }

    fn load_chunk(&self, coord: ChunkCoord) {
        self.state().request(coord.column());
    }
}

// ---------------------------------------------------------------------------
// MemoryAccessor
// ---------------------------------------------------------------------------

/// [`BlockAccessor`] over a shared [`MemoryWorld`].
pub struct MemoryAccessor {
    world: Arc<MemoryWorld>,
    revertible: bool,
    deferred: Vec<EntityPlacement>,
}

impl MemoryAccessor {
    fn new(world: Arc<MemoryWorld>, revertible: bool) -> Self {
        Self {
            world,
            revertible,
            deferred: Vec::new(),
        }
    }

    /// Entity placements held back by a revertible accessor.
    pub fn deferred(&self) -> &[EntityPlacement] {
        &self.deferred
    }

    /// Hands deferred entity placements to the world.
    pub fn apply(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        self.world.state().entities.extend(deferred);
    }
}

impl BlockAccessor for MemoryAccessor {
    fn registry(&self) -> &BlockRegistry {
        &self.world.registry
    }

    fn block(&self, pos: Vec3i) -> Option<BlockId> {
        self.world.block(pos)
    }

    fn set_block(&mut self, pos: Vec3i, id: BlockId) -> bool {
        if pos.y < 0 {
            return false;
        }
        let mut state = self.world.state();
        let Some(column) = state.column_mut(pos.x, pos.z) else {
            return false;
        };
        let y = pos.y as usize;
        if y >= column.len() {
            if id.is_air() {
                return true;
            }
            column.resize(y + 1, BlockId::AIR);
        }
        column[y] = id;
        while column.last().is_some_and(|b| b.is_air()) {
            column.pop();
        }
        true
    }

    fn rain_height(&self, x: i32, z: i32) -> Option<i32> {
        let state = self.world.state();
        state.column(x, z).map(|c| c.len() as i32)
    }

    fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.world.is_loaded(coord.column())
    }

    fn is_column_loaded(&self, coord: ChunkColumnCoord) -> bool {
        self.world.is_loaded(coord)
    }

    fn is_revertible(&self) -> bool {
        self.revertible
    }

    fn place_entity(&mut self, placement: &EntityPlacement) {
        if self.revertible {
            self.deferred.push(placement.clone());
        } else {
            self.world.state().entities.push(placement.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heights_unavailable_until_loaded() {
        let world = MemoryWorld::flat(64);
        let coord = ChunkColumnCoord::new(2, -1);
        assert!(world.heights(coord).is_none());
        assert_eq!(world.pending_count(), 1);

        // Repeated requests are deduplicated.
        assert!(world.heights(coord).is_none());
        world.load_chunk_column(coord);
        assert_eq!(world.pending_count(), 1);
        assert_eq!(world.request_count(), 3);

        assert_eq!(world.load_pending(), 1);
        let heights = world.heights(coord).unwrap();
        assert_eq!(heights.heights.len(), CHUNK_AREA);
        assert!(heights.heights.iter().all(|&h| h == 64));
        assert!(heights.solid.iter().all(|&s| s));
    }

    #[test]
    fn test_blocks_and_rain_height() {
        let registry = BlockRegistry::with_defaults();
        let grass = registry.id_of("grass").unwrap();
        let dirt = registry.id_of("dirt").unwrap();
        let log = registry.id_of("log").unwrap();
        let leaves = registry.id_of("leaves").unwrap();
        let world = Arc::new(MemoryWorld::new(registry, move |_, x, z| {
            let spec = ColumnSpec::new(10, grass, dirt);
            if (x, z) == (5, 5) {
                spec.with_decoration(vec![log, log, leaves])
            } else {
                spec
            }
        }));
        world.load_now(ChunkColumnCoord::new(0, 0));
        let accessor = world.accessor();

        assert_eq!(accessor.block(Vec3i::new(5, 10, 5)), Some(grass));
        assert_eq!(accessor.block(Vec3i::new(5, 11, 5)), Some(log));
        assert_eq!(accessor.block(Vec3i::new(5, 13, 5)), Some(leaves));
        assert_eq!(accessor.block(Vec3i::new(5, 14, 5)), Some(BlockId::AIR));
        assert_eq!(accessor.block(Vec3i::new(5, 3, 5)), Some(dirt));
        assert_eq!(accessor.rain_height(5, 5), Some(14));
        assert_eq!(accessor.rain_height(6, 5), Some(11));
        assert_eq!(accessor.block(Vec3i::new(40, 10, 5)), None);
        assert_eq!(accessor.rain_height(40, 5), None);

        // The survey height ignores decoration.
        let heights = world.heights(ChunkColumnCoord::new(0, 0)).unwrap();
        assert_eq!(heights.heights[ChunkColumnCoord::local_index(5, 5)], 10);
    }

    #[test]
    fn test_set_block_updates_rain_height() {
        let world = Arc::new(MemoryWorld::flat(20));
        world.load_now(ChunkColumnCoord::new(0, 0));
        let mut accessor = world.accessor();
        let stone = accessor.registry().id_of("stone").unwrap();

        assert!(accessor.set_block(Vec3i::new(1, 25, 1), stone));
        assert_eq!(accessor.rain_height(1, 1), Some(26));
        assert_eq!(accessor.block(Vec3i::new(1, 23, 1)), Some(BlockId::AIR));

        assert!(accessor.set_block(Vec3i::new(1, 25, 1), BlockId::AIR));
        assert_eq!(accessor.rain_height(1, 1), Some(21));

        assert!(!accessor.set_block(Vec3i::new(100, 25, 1), stone));
        assert!(!accessor.set_block(Vec3i::new(1, -1, 1), stone));
    }

    #[test]
    fn test_revertible_accessor_defers_entities() {
        let world = Arc::new(MemoryWorld::flat(20));
        let entity = EntityPlacement::Entity {
            kind: "villager".into(),
            pos: Vec3i::new(1, 21, 1),
        };

        let mut live = world.accessor();
        live.place_entity(&entity);
        assert_eq!(world.entities().len(), 1);

        let mut revertible = world.revertible_accessor();
        assert!(revertible.is_revertible());
        revertible.place_entity(&entity);
        assert_eq!(revertible.deferred().len(), 1);
        assert_eq!(world.entities().len(), 1);

        revertible.apply();
        assert!(revertible.deferred().is_empty());
        assert_eq!(world.entities().len(), 2);
    }

    #[test]
    fn test_chunk_load_requests_whole_column() {
        let world = Arc::new(MemoryWorld::flat(20));
        world.load_chunk(ChunkCoord::new(3, 5, 3));
        world.load_chunk(ChunkCoord::new(3, 0, 3));
        assert_eq!(world.pending_count(), 1);
        world.load_pending();
        let accessor = world.accessor();
        assert!(accessor.is_chunk_loaded(ChunkCoord::new(3, -2, 3)));
        assert!(accessor.is_column_loaded(ChunkColumnCoord::new(3, 3)));
    }
}
