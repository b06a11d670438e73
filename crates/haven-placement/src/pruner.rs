//! Clearing vegetation and other clutter out of the resource zone.
//!
//! The pruner works on an annulus: everything within `radius` of the
//! center that lies outside the previously cleared disk. Between the
//! surveyed ground surface and the top of each map column, every prunable
//! block becomes air. Growing the radius is queued and only takes effect
//! when the current annulus is finished, so columns touched by anything
//! else in between are never cleared twice.

use std::fmt;
use std::sync::Arc;

use haven_math::Vec3i;
use haven_terrain::{ChunkColumnSurvey, TerrainSurvey};
use haven_world::{BlockAccessor, BlockId, CHUNK_SIZE, ChunkColumnCoord, ChunkLoader, Persistent, Progress};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Resumable clutter removal over an expanding disk.
#[derive(Serialize, Deserialize)]
pub struct DiskPruner {
    center_x: i32,
    center_z: i32,
    radius: i32,
    /// Radius of the disk already cleared by earlier annuli.
    inner_radius: Option<i32>,
    pending: Option<i32>,
    /// Chunk columns finished for the current annulus.
    finished: FxHashSet<ChunkColumnCoord>,
    done: bool,
    cleared: u64,
    #[serde(skip)]
    loader: Option<Arc<dyn ChunkLoader>>,
}

impl fmt::Debug for DiskPruner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskPruner")
            .field("center", &(self.center_x, self.center_z))
            .field("radius", &self.radius)
            .field("inner_radius", &self.inner_radius)
            .field("pending", &self.pending)
            .field("finished", &self.finished.len())
            .field("done", &self.done)
            .field("cleared", &self.cleared)
            .finish()
    }
}

impl DiskPruner {
    pub fn new(center_x: i32, center_z: i32, radius: i32, loader: Arc<dyn ChunkLoader>) -> Self {
        Self {
            center_x,
            center_z,
            radius: radius.max(0),
            inner_radius: None,
            pending: None,
            finished: FxHashSet::default(),
            done: false,
            cleared: 0,
            loader: Some(loader),
        }
    }

    /// Re-inject the chunk loader after deserialization.
    ///
    /// # Panics
    ///
    /// Panics if a loader is already attached.
    pub fn attach(&mut self, loader: Arc<dyn ChunkLoader>) {
        assert!(self.loader.is_none(), "DiskPruner already has a chunk loader");
        self.loader = Some(loader);
    }

    pub fn is_attached(&self) -> bool {
        self.loader.is_some()
    }

    fn loader(&self) -> &Arc<dyn ChunkLoader> {
        match &self.loader {
            Some(loader) => loader,
            None => panic!("DiskPruner used before a chunk loader was attached"),
        }
    }

    /// Radius of the annulus currently being cleared.
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Radius the pruner will have cleared once every queued expansion ran.
    pub fn target_radius(&self) -> i32 {
        self.pending.map_or(self.radius, |p| p.max(self.radius))
    }

    /// Queue growing the cleared disk to `radius`. Smaller values are
    /// ignored.
    pub fn expand(&mut self, radius: i32) {
        if radius > self.target_radius() {
            debug!(from = self.radius, to = radius, "pruner expansion queued");
            self.pending = Some(radius);
        }
    }

    /// True when the full target disk has been cleared.
    pub fn is_done(&self) -> bool {
        self.done && self.pending.is_none()
    }

    /// Number of blocks removed so far.
    pub fn cleared(&self) -> u64 {
        self.cleared
    }

    fn in_annulus(&self, x: i32, z: i32) -> bool {
        let dx = (x - self.center_x) as i64;
        let dz = (z - self.center_z) as i64;
        let d2 = dx * dx + dz * dz;
        let r = self.radius as i64;
        d2 <= r * r && self.inner_radius.is_none_or(|inner| d2 > inner as i64 * inner as i64)
    }

    /// Whether any column of `coord` can lie in the annulus.
    fn touches_annulus(&self, coord: ChunkColumnCoord) -> bool {
        let (ox, oz) = coord.origin();
        let nearest_x = self.center_x.clamp(ox, ox + CHUNK_SIZE - 1);
        let nearest_z = self.center_z.clamp(oz, oz + CHUNK_SIZE - 1);
        let near = dist2(nearest_x - self.center_x, nearest_z - self.center_z);
        let far_x = (ox - self.center_x).abs().max((ox + CHUNK_SIZE - 1 - self.center_x).abs());
        let far_z = (oz - self.center_z).abs().max((oz + CHUNK_SIZE - 1 - self.center_z).abs());
        let far = dist2(far_x, far_z);

        let r = self.radius as i64;
        near <= r * r && self.inner_radius.is_none_or(|inner| far > inner as i64 * inner as i64)
    }

    /// Clear as much of the target disk as loaded chunks allow.
    ///
    /// # Panics
    ///
    /// Panics if a chunk is missing and no loader is attached.
    pub fn generate(&mut self, survey: &mut TerrainSurvey, accessor: &mut dyn BlockAccessor) -> Progress {
        loop {
            if !self.done {
                if self.clear_annulus(survey, accessor) == Progress::Incomplete {
                    return Progress::Incomplete;
                }
                self.done = true;
                debug!(
                    center_x = self.center_x,
                    center_z = self.center_z,
                    radius = self.radius,
                    cleared = self.cleared,
                    "pruning annulus finished"
                );
            }

            match self.pending.take() {
                Some(next) if next > self.radius => {
                    self.inner_radius = Some(self.radius);
                    self.radius = next;
                    self.finished.clear();
                    self.done = false;
                }
                _ => return Progress::Complete,
            }
        }
    }

    fn clear_annulus(&mut self, survey: &mut TerrainSurvey, accessor: &mut dyn BlockAccessor) -> Progress {
        let r = self.radius;
        let mut progress = Progress::Complete;
        let coords: Vec<ChunkColumnCoord> = ChunkColumnCoord::covering(
            self.center_x - r,
            self.center_z - r,
            self.center_x + r,
            self.center_z + r,
        )
        .filter(|c| !self.finished.contains(c) && self.touches_annulus(*c))
        .collect();

        for coord in coords {
            let Some(chunk) = survey.get_chunk(coord) else {
                progress = Progress::Incomplete;
                continue;
            };
            if !accessor.is_column_loaded(coord) {
                self.loader().load_chunk_column(coord);
                progress = Progress::Incomplete;
                continue;
            }
            let removed = self.clear_chunk(chunk, accessor);
            trace!(x = coord.x, z = coord.z, removed, "pruned chunk column");
            self.finished.insert(coord);
        }
        progress
    }

    fn clear_chunk(&mut self, chunk: &ChunkColumnSurvey, accessor: &mut dyn BlockAccessor) -> u64 {
        let (ox, oz) = chunk.coord().origin();
        let mut removed = 0;
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let (x, z) = (ox + lx, oz + lz);
                if !self.in_annulus(x, z) {
                    continue;
                }
                let Some(top) = accessor.rain_height(x, z) else {
                    continue;
                };
                for y in (chunk.height(lx, lz) + 1)..top {
                    let pos = Vec3i::new(x, y, z);
                    let prunable = accessor
                        .block(pos)
                        .is_some_and(|id| accessor.registry().is_prunable(id));
                    if prunable && accessor.set_block(pos, BlockId::AIR) {
                        removed += 1;
                    }
                }
            }
        }
        self.cleared += removed;
        removed
    }
}

fn dist2(dx: i32, dz: i32) -> i64 {
    dx as i64 * dx as i64 + dz as i64 * dz as i64
}

impl Persistent for DiskPruner {}
