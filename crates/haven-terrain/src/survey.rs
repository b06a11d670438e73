//! Cached terrain survey with disk and circle aggregation.
//!
//! Chunk surveys are built on first use from the attached [`HeightSource`]
//! and kept for the lifetime of the survey. A chunk whose data is not ready
//! makes the aggregate [`Completeness::Incomplete`] without stopping the
//! scan, so later calls only wait for what is still missing.

use std::fmt;
use std::sync::Arc;

use haven_world::{CHUNK_SIZE, ChunkColumnCoord, Completeness, HeightSource, Persistent};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::chunk::{ChunkColumnSurvey, TerrainStats};

/// Cache of chunk column surveys keyed by chunk coordinate.
#[derive(Default, Serialize, Deserialize)]
pub struct TerrainSurvey {
    chunks: FxHashMap<ChunkColumnCoord, ChunkColumnSurvey>,
    #[serde(skip)]
    source: Option<Arc<dyn HeightSource>>,
}

impl fmt::Debug for TerrainSurvey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerrainSurvey")
            .field("chunks", &self.chunks.len())
            .field("attached", &self.source.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Disk geometry
// ---------------------------------------------------------------------------

/// How much of a chunk column a disk covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coverage {
    None,
    Partial,
    Full,
}

/// Block columns `(x, z)` with `(x - cx)² + (z - cz)² <= r²`.
#[derive(Clone, Copy, Debug)]
struct Disk {
    cx: i32,
    cz: i32,
    radius: i32,
}

impl Disk {
    fn contains(&self, x: i32, z: i32) -> bool {
        let dx = (x - self.cx) as i64;
        let dz = (z - self.cz) as i64;
        let r = self.radius as i64;
        dx * dx + dz * dz <= r * r
    }

    fn chunks(&self) -> impl Iterator<Item = ChunkColumnCoord> {
        ChunkColumnCoord::covering(
            self.cx - self.radius,
            self.cz - self.radius,
            self.cx + self.radius,
            self.cz + self.radius,
        )
    }

    fn coverage(&self, coord: ChunkColumnCoord) -> Coverage {
        let (x0, z0) = coord.origin();
        let (x1, z1) = (x0 + CHUNK_SIZE - 1, z0 + CHUNK_SIZE - 1);
        if [(x0, z0), (x1, z0), (x0, z1), (x1, z1)]
            .iter()
            .all(|&(x, z)| self.contains(x, z))
        {
            return Coverage::Full;
        }
        let nx = self.cx.clamp(x0, x1);
        let nz = self.cz.clamp(z0, z1);
        if self.contains(nx, nz) {
            Coverage::Partial
        } else {
            Coverage::None
        }
    }
}

// ---------------------------------------------------------------------------
// TerrainSurvey
// ---------------------------------------------------------------------------

impl TerrainSurvey {
    /// Empty survey reading from `source`.
    pub fn new(source: Arc<dyn HeightSource>) -> Self {
        Self {
            chunks: FxHashMap::default(),
            source: Some(source),
        }
    }

    /// Re-inject the height source after deserialization.
    ///
    /// # Panics
    ///
    /// Panics if a source is already attached.
    pub fn attach(&mut self, source: Arc<dyn HeightSource>) {
        assert!(
            self.source.is_none(),
            "TerrainSurvey::attach called on a survey that already has a height source"
        );
        self.source = Some(source);
    }

    /// Whether a height source is attached.
    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    fn source(&self) -> &dyn HeightSource {
        match &self.source {
            Some(source) => source.as_ref(),
            None => panic!("TerrainSurvey used before a height source was attached"),
        }
    }

    /// Number of cached chunk surveys.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Cached survey of `coord` without loading anything.
    pub fn cached(&self, coord: ChunkColumnCoord) -> Option<&ChunkColumnSurvey> {
        self.chunks.get(&coord)
    }

    /// Survey of `coord`, building it from the height source if needed.
    ///
    /// Returns `None` while the chunk is unavailable. Building a chunk also
    /// completes the roughness of cached east and south neighbors that were
    /// waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if no height source is attached and `coord` is not cached.
    pub fn get_chunk(&mut self, coord: ChunkColumnCoord) -> Option<&ChunkColumnSurvey> {
        if !self.chunks.contains_key(&coord) {
            let data = self.source().heights(coord)?;
            let survey = ChunkColumnSurvey::new(
                coord,
                data,
                self.chunks.get(&coord.west()),
                self.chunks.get(&coord.north()),
            );
            trace!(x = coord.x, z = coord.z, roughness = survey.roughness(), "surveyed chunk column");
            self.chunks.insert(coord, survey);
            self.refresh_roughness(coord.east());
            self.refresh_roughness(coord.south());
        }
        self.refresh_roughness(coord);
        self.chunks.get(&coord)
    }

    /// Recompute an incomplete roughness from cached neighbors.
    fn refresh_roughness(&mut self, coord: ChunkColumnCoord) {
        let Some(chunk) = self.chunks.get(&coord) else {
            return;
        };
        if chunk.is_roughness_complete() {
            return;
        }
        let roughness = chunk.compute_roughness(
            self.chunks.get(&coord.west()),
            self.chunks.get(&coord.north()),
        );
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.set_roughness(roughness);
        }
    }

    /// Loads the west and north neighbors of a cached chunk until its
    /// roughness is known. Returns whether it is.
    fn ensure_roughness(&mut self, coord: ChunkColumnCoord) -> bool {
        if self.chunks.get(&coord).is_some_and(ChunkColumnSurvey::is_roughness_complete) {
            return true;
        }
        let west = self.get_chunk(coord.west()).is_some();
        let north = self.get_chunk(coord.north()).is_some();
        if !(west && north) {
            return false;
        }
        self.refresh_roughness(coord);
        self.chunks.get(&coord).is_some_and(ChunkColumnSurvey::is_roughness_complete)
    }

    /// Surface height and solidity of block column `(x, z)`.
    pub fn column(&mut self, x: i32, z: i32) -> Option<(i32, bool)> {
        let coord = ChunkColumnCoord::from_block(x, z);
        let (ox, oz) = coord.origin();
        let chunk = self.get_chunk(coord)?;
        Some((chunk.height(x - ox, z - oz), chunk.is_solid(x - ox, z - oz)))
    }

    /// Surface height of block column `(x, z)`.
    pub fn height_at(&mut self, x: i32, z: i32) -> Option<i32> {
        self.column(x, z).map(|(h, _)| h)
    }

    fn cached_height(&self, x: i32, z: i32) -> Option<i32> {
        let coord = ChunkColumnCoord::from_block(x, z);
        let (ox, oz) = coord.origin();
        self.chunks.get(&coord).map(|c| c.height(x - ox, z - oz))
    }

    /// Statistics over the disk of `radius` around block column `(cx, cz)`.
    ///
    /// Chunks fully inside the disk contribute their cached statistics.
    /// Chunks cut by the edge are rescanned column by column; their
    /// roughness only counts pairs with both columns inside the disk.
    pub fn disk_stats(&mut self, cx: i32, cz: i32, radius: i32) -> (TerrainStats, Completeness) {
        let disk = Disk { cx, cz, radius };
        let mut completeness = Completeness::Complete;
        let mut visits = Vec::new();

        for coord in disk.chunks() {
            let coverage = disk.coverage(coord);
            if coverage == Coverage::None {
                continue;
            }
            if self.get_chunk(coord).is_none() {
                completeness.degrade();
                continue;
            }
            if coverage == Coverage::Full && !self.ensure_roughness(coord) {
                completeness.degrade();
            }
            visits.push((coord, coverage));
        }

        let mut stats = TerrainStats::default();
        for (coord, coverage) in visits {
            stats += match coverage {
                Coverage::Full => self.chunks[&coord].stats(),
                _ => self.scan_partial(coord, &disk),
            };
        }
        (stats, completeness)
    }

    /// Column-by-column statistics of the part of `coord` inside `disk`.
    fn scan_partial(&self, coord: ChunkColumnCoord, disk: &Disk) -> TerrainStats {
        let chunk = &self.chunks[&coord];
        let (ox, oz) = coord.origin();
        let mut stats = TerrainStats::default();

        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let (x, z) = (ox + lx, oz + lz);
                if !disk.contains(x, z) {
                    continue;
                }
                let h = chunk.height(lx, lz);
                stats.column_count += 1;
                stats.sum_height += h as i64;
                if chunk.is_solid(lx, lz) {
                    stats.solid_count += 1;
                }
                for (nx, nz) in [(x - 1, z), (x, z - 1)] {
                    if !disk.contains(nx, nz) {
                        continue;
                    }
                    // A neighbor in another unavailable chunk was already
                    // reported as incomplete.
                    if let Some(nh) = self.cached_height(nx, nz) {
                        stats.roughness += (h - nh).abs() as i64;
                    }
                }
            }
        }
        stats
    }

    /// Chunk-granular statistics over the circle of `radius` around `(cx, cz)`.
    ///
    /// Every chunk whose center lies within the radius contributes its whole
    /// cached statistics; the chunk holding the center always does.
    pub fn rough_circle_stats(&mut self, cx: i32, cz: i32, radius: i32) -> (TerrainStats, Completeness) {
        let disk = Disk { cx, cz, radius };
        let home = ChunkColumnCoord::from_block(cx, cz);
        let half = CHUNK_SIZE / 2;
        let mut completeness = Completeness::Complete;
        let mut stats = TerrainStats::default();

        for coord in disk.chunks() {
            let (ox, oz) = coord.origin();
            if coord != home && !disk.contains(ox + half, oz + half) {
                continue;
            }
            let Some(chunk) = self.get_chunk(coord) else {
                completeness.degrade();
                continue;
            };
            let mut chunk_stats = chunk.stats();
            if !self.ensure_roughness(coord) {
                completeness.degrade();
            } else {
                chunk_stats.roughness = self.chunks[&coord].roughness();
            }
            stats += chunk_stats;
        }
        (stats, completeness)
    }
}

impl Persistent for TerrainSurvey {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use haven_world::{ColumnSpec, MemoryWorld};

    fn flat_world(height: i32) -> Arc<MemoryWorld> {
        Arc::new(MemoryWorld::flat(height))
    }

    fn sloped_world() -> Arc<MemoryWorld> {
        let registry = haven_world::BlockRegistry::with_defaults();
        let grass = registry.id_of("grass").unwrap();
        Arc::new(MemoryWorld::new(registry, move |_, x, _| {
            ColumnSpec::new(64 + x.div_euclid(4), grass, grass)
        }))
    }

    #[test]
    fn test_unloaded_chunk_is_unavailable_then_cached() {
        let world = flat_world(64);
        let mut survey = TerrainSurvey::new(world.clone());
        let coord = ChunkColumnCoord::new(0, 0);
        assert!(survey.get_chunk(coord).is_none());
        assert!(survey.is_empty());

        world.load_pending();
        let chunk = survey.get_chunk(coord).unwrap();
        assert_eq!(chunk.roughness(), crate::INCOMPLETE_ROUGHNESS);
        assert_eq!(survey.len(), 1);
        assert_eq!(survey.height_at(5, 5), Some(64));
    }

    #[test]
    fn test_neighbor_arrival_completes_roughness() {
        let world = sloped_world();
        let mut survey = TerrainSurvey::new(world.clone());
        let coord = ChunkColumnCoord::new(0, 0);
        for c in [coord, coord.west(), coord.north()] {
            world.load_now(c);
        }

        survey.get_chunk(coord).unwrap();
        assert!(!survey.cached(coord).unwrap().is_roughness_complete());
        survey.get_chunk(coord.west()).unwrap();
        assert!(!survey.cached(coord).unwrap().is_roughness_complete());
        survey.get_chunk(coord.north()).unwrap();

        // 32 rows, 8 steps of one block inside the chunk plus one at the west border.
        assert_eq!(survey.cached(coord).unwrap().roughness(), 32 * 8);

        // Loading the neighbors first gives the same value.
        let mut other = TerrainSurvey::new(world.clone());
        other.get_chunk(coord.north()).unwrap();
        other.get_chunk(coord.west()).unwrap();
        assert_eq!(other.get_chunk(coord).unwrap().roughness(), 32 * 8);
    }

    #[test]
    fn test_disk_stats_flat() {
        let world = flat_world(70);
        let mut survey = TerrainSurvey::new(world.clone());

        let (_, completeness) = survey.disk_stats(0, 0, 40);
        assert!(!completeness.is_complete());
        world.load_pending();
        let (stats, completeness) = survey.disk_stats(0, 0, 40);
        // Full chunks pulled in neighbors outside the disk.
        if !completeness.is_complete() {
            world.load_pending();
        }
        let (stats2, completeness) = survey.disk_stats(0, 0, 40);
        assert!(completeness.is_complete());
        assert_eq!(stats.column_count, stats2.column_count);

        let expected = (-40i64..=40)
            .flat_map(|x| (-40i64..=40).map(move |z| (x, z)))
            .filter(|(x, z)| x * x + z * z <= 1600)
            .count() as u32;
        assert_eq!(stats2.column_count, expected);
        assert_eq!(stats2.solid_count, expected);
        assert_eq!(stats2.roughness, 0);
        assert_eq!(stats2.mean_height(), Some(70));
    }

    #[test]
    fn test_disk_stats_keeps_scanning_past_missing_chunks() {
        let world = flat_world(64);
        let mut survey = TerrainSurvey::new(world.clone());
        world.load_now(ChunkColumnCoord::new(0, 0));

        let (stats, completeness) = survey.disk_stats(16, 16, 20);
        assert!(!completeness.is_complete());
        assert!(stats.column_count > 0, "available chunk still counted");
        assert!(world.pending_count() > 0, "missing chunks were requested");
    }

    #[test]
    fn test_partial_roughness_only_counts_pairs_inside() {
        let world = sloped_world();
        let mut survey = TerrainSurvey::new(world.clone());
        world.load_now(ChunkColumnCoord::new(0, 0));

        // Radius 2 disk fully inside chunk (0, 0): x in 14..=18 at z = 16.
        let (stats, completeness) = survey.disk_stats(16, 16, 2);
        assert!(completeness.is_complete());
        assert_eq!(stats.column_count, 13);
        // Height steps at x = 16 only: rows z = 15, 16, 17 cross it.
        assert_eq!(stats.roughness, 3);
    }

    #[test]
    fn test_rough_circle_stats_selects_chunk_centers() {
        let world = flat_world(64);
        let mut survey = TerrainSurvey::new(world.clone());
        for _ in 0..3 {
            let _ = survey.rough_circle_stats(16, 16, 32);
            world.load_pending();
        }
        let (stats, completeness) = survey.rough_circle_stats(16, 16, 32);
        assert!(completeness.is_complete());
        // Home chunk plus its four edge neighbors.
        assert_eq!(stats.column_count, 5 * 1024);
        assert_eq!(stats.roughness, 0);

        // A tiny radius still measures the chunk holding the center.
        let (stats, _) = survey.rough_circle_stats(3, 3, 1);
        assert_eq!(stats.column_count, 1024);
    }

    #[test]
    fn test_round_trip_then_attach() {
        let world = flat_world(64);
        let mut survey = TerrainSurvey::new(world.clone());
        world.load_now(ChunkColumnCoord::new(0, 0));
        survey.get_chunk(ChunkColumnCoord::new(0, 0)).unwrap();

        let bytes = survey.to_bytes().unwrap();
        let mut restored = TerrainSurvey::from_bytes(&bytes).unwrap();
        assert!(!restored.is_attached());
        assert_eq!(restored.len(), 1);
        assert!(restored.cached(ChunkColumnCoord::new(0, 0)).is_some());

        restored.attach(world.clone());
        assert_eq!(restored.height_at(1, 1), Some(64));
    }

    #[test]
    #[should_panic(expected = "already has a height source")]
    fn test_double_attach_panics() {
        let world = flat_world(64);
        let mut survey = TerrainSurvey::new(world.clone());
        survey.attach(world);
    }

    #[test]
    #[should_panic(expected = "before a height source was attached")]
    fn test_detached_use_panics() {
        let mut survey = TerrainSurvey::default();
        let _ = survey.get_chunk(ChunkColumnCoord::new(0, 0));
    }
}
