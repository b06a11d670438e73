//! Spiral search for a flat, dry area.
//!
//! Candidates are `start + spiral_offset * (radius / 4)`. Each one is
//! measured through the [`TerrainSurvey`]; a measurement that is missing
//! chunks keeps the spiral where it is so the same candidate is judged again
//! once the data arrives.

use haven_config::LocatorConfig;
use haven_math::SquareSpiral;
use haven_world::{Persistent, Progress};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::chunk::TerrainStats;
use crate::survey::TerrainSurvey;

/// Which aggregate a locator measures a candidate with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaShape {
    /// Exact per-column disk ([`TerrainSurvey::disk_stats`]).
    Disk,
    /// Whole chunks around the center ([`TerrainSurvey::rough_circle_stats`]).
    RoughCircle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LocatorState {
    Searching,
    Done { x: i32, z: i32, height: i32 },
    Failed,
}

/// Resumable search for an area of a given radius that is flat and dry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatAreaLocator {
    shape: AreaShape,
    start_x: i32,
    start_z: i32,
    settings: LocatorConfig,
    spiral: SquareSpiral,
    state: LocatorState,
}

impl FlatAreaLocator {
    /// Locator measuring exact disks around each candidate.
    pub fn disk(start_x: i32, start_z: i32, settings: LocatorConfig) -> Self {
        Self::new(AreaShape::Disk, start_x, start_z, settings)
    }

    /// Locator measuring whole chunks around each candidate.
    pub fn rough_circle(start_x: i32, start_z: i32, settings: LocatorConfig) -> Self {
        Self::new(AreaShape::RoughCircle, start_x, start_z, settings)
    }

    fn new(shape: AreaShape, start_x: i32, start_z: i32, settings: LocatorConfig) -> Self {
        Self {
            shape,
            start_x,
            start_z,
            settings,
            spiral: SquareSpiral::new(),
            state: LocatorState::Searching,
        }
    }

    pub fn shape(&self) -> AreaShape {
        self.shape
    }

    pub fn settings(&self) -> &LocatorConfig {
        &self.settings
    }

    /// Spiral steps taken so far.
    pub fn attempts(&self) -> u32 {
        self.spiral.index()
    }

    /// True once a center was accepted.
    pub fn is_done(&self) -> bool {
        matches!(self.state, LocatorState::Done { .. })
    }

    /// True once the attempt budget ran out without a match.
    pub fn is_failed(&self) -> bool {
        self.state == LocatorState::Failed
    }

    /// Accepted block column, if any.
    pub fn center(&self) -> Option<(i32, i32)> {
        match self.state {
            LocatorState::Done { x, z, .. } => Some((x, z)),
            _ => None,
        }
    }

    /// Mean surface height around the accepted center, if any.
    pub fn height(&self) -> Option<i32> {
        match self.state {
            LocatorState::Done { height, .. } => Some(height),
            _ => None,
        }
    }

    fn candidate(&self) -> (i32, i32) {
        let step = (self.settings.radius / 4).max(1);
        let (dx, dz) = self.spiral.offset();
        (self.start_x + dx * step, self.start_z + dz * step)
    }

    fn measure(&self, survey: &mut TerrainSurvey, x: i32, z: i32) -> (TerrainStats, bool) {
        let radius = self.settings.radius;
        let (stats, completeness) = match self.shape {
            AreaShape::Disk => survey.disk_stats(x, z, radius),
            AreaShape::RoughCircle => survey.rough_circle_stats(x, z, radius),
        };
        (stats, completeness.is_complete())
    }

    /// Whether `stats` pass the per-column roughness and land thresholds.
    fn acceptable(&self, stats: &TerrainStats) -> bool {
        let area = stats.column_count as f64;
        if area == 0.0 {
            return false;
        }
        stats.roughness as f64 <= self.settings.max_roughness * area
            && stats.solid_count as f64 >= self.settings.min_land_ratio * area
    }

    /// Advance the search as far as loaded data allows.
    ///
    /// Returns [`Progress::Complete`] when a center was accepted or the
    /// search failed; check [`is_failed`](Self::is_failed) to tell them
    /// apart. After either, further calls do nothing.
    pub fn generate(&mut self, survey: &mut TerrainSurvey) -> Progress {
        while self.state == LocatorState::Searching {
            if self.spiral.index() >= self.settings.max_attempts {
                warn!(
                    start_x = self.start_x,
                    start_z = self.start_z,
                    attempts = self.spiral.index(),
                    "no flat area found"
                );
                self.state = LocatorState::Failed;
                break;
            }

            let (x, z) = self.candidate();
            let (stats, complete) = self.measure(survey, x, z);
            if !complete {
                return Progress::Incomplete;
            }

            if !self.acceptable(&stats) {
                trace!(x, z, roughness = stats.roughness, solid = stats.solid_count, "rejected candidate");
                self.spiral.next();
                continue;
            }

            let height = stats.mean_height().unwrap_or_default();
            info!(x, z, height, attempts = self.spiral.index() + 1, "flat area located");
            self.state = LocatorState::Done { x, z, height };
        }
        Progress::Complete
    }
}

impl Persistent for FlatAreaLocator {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use haven_world::{BlockRegistry, ChunkColumnCoord, ColumnSpec, MemoryWorld};

    fn settings(radius: i32, min_land_ratio: f64) -> LocatorConfig {
        LocatorConfig {
            radius,
            max_roughness: 0.5,
            min_land_ratio,
            max_attempts: 100,
        }
    }

    /// Drives the locator, loading requested chunks between calls.
    fn run(locator: &mut FlatAreaLocator, survey: &mut TerrainSurvey, world: &MemoryWorld) -> u32 {
        let mut passes = 0;
        while locator.generate(survey) == Progress::Incomplete {
            assert!(world.load_pending() > 0, "incomplete without new load requests");
            passes += 1;
            assert!(passes < 50, "locator did not settle");
        }
        passes
    }

    fn world_with(f: impl Fn(&BlockRegistry, i32, i32) -> ColumnSpec + Send + Sync + 'static) -> Arc<MemoryWorld> {
        Arc::new(MemoryWorld::new(BlockRegistry::with_defaults(), f))
    }

    #[test]
    fn test_flat_area_accepted_at_start() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut locator = FlatAreaLocator::disk(16, 16, settings(16, 0.9));

        let passes = run(&mut locator, &mut survey, &world);
        assert!(passes >= 1, "first call has no data");
        assert!(locator.is_done());
        assert!(!locator.is_failed());
        assert_eq!(locator.center(), Some((16, 16)));
        assert_eq!(locator.height(), Some(64));
        assert_eq!(locator.attempts(), 0);
    }

    #[test]
    fn test_wet_chunk_pushes_search_outward() {
        // Chunk column (1, 0) is a lake; everything else is dry and flat.
        let world = world_with(|registry, x, z| {
            let water = registry.id_of("water").unwrap_or_default();
            let grass = registry.id_of("grass").unwrap_or_default();
            if ChunkColumnCoord::from_block(x, z) == ChunkColumnCoord::new(1, 0) {
                ColumnSpec::new(64, water, water)
            } else {
                ColumnSpec::new(64, grass, grass)
            }
        });
        let mut survey = TerrainSurvey::new(world.clone());
        let (start_x, start_z) = (28, 16);
        let mut locator = FlatAreaLocator::disk(start_x, start_z, settings(8, 1.0));

        run(&mut locator, &mut survey, &world);
        let (x, z) = locator.center().expect("a dry area nearby");
        assert_eq!((x, z), (22, 22));
        assert!(x + 8 < 32, "accepted disk must stay out of the lake");
        let manhattan = (x - start_x).abs() + (z - start_z).abs();
        assert!(manhattan <= 32, "searched too far: {manhattan}");
        assert_eq!(locator.height(), Some(64));
    }

    #[test]
    fn test_rough_terrain_rejected() {
        // Checkerboard heights everywhere: never flat enough.
        let world = world_with(|registry, x, z| {
            let grass = registry.id_of("grass").unwrap_or_default();
            ColumnSpec::new(64 + (x + z).rem_euclid(2) * 3, grass, grass)
        });
        let mut survey = TerrainSurvey::new(world.clone());
        let mut config = settings(8, 0.0);
        config.max_attempts = 5;
        let mut locator = FlatAreaLocator::disk(0, 0, config);

        run(&mut locator, &mut survey, &world);
        assert!(locator.is_failed());
        assert!(!locator.is_done());
        assert_eq!(locator.center(), None);
        assert_eq!(locator.attempts(), 5);

        // Calling again after failure is a no-op reporting completion.
        assert_eq!(locator.generate(&mut survey), Progress::Complete);
        assert_eq!(locator.attempts(), 5);
    }

    #[test]
    fn test_incomplete_read_does_not_advance() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut locator = FlatAreaLocator::disk(100, 100, settings(16, 0.9));

        assert_eq!(locator.generate(&mut survey), Progress::Incomplete);
        assert_eq!(locator.generate(&mut survey), Progress::Incomplete);
        assert_eq!(locator.attempts(), 0);
    }

    #[test]
    fn test_rough_circle_locator() {
        let world = Arc::new(MemoryWorld::flat(50));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut locator = FlatAreaLocator::rough_circle(16, 16, settings(32, 0.9));
        assert_eq!(locator.shape(), AreaShape::RoughCircle);

        run(&mut locator, &mut survey, &world);
        assert_eq!(locator.center(), Some((16, 16)));
        assert_eq!(locator.height(), Some(50));
    }

    #[test]
    fn test_resume_after_round_trip() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut locator = FlatAreaLocator::disk(16, 16, settings(16, 0.9));
        assert_eq!(locator.generate(&mut survey), Progress::Incomplete);

        let mut locator = FlatAreaLocator::from_bytes(&locator.to_bytes().unwrap()).unwrap();
        let mut survey = TerrainSurvey::from_bytes(&survey.to_bytes().unwrap()).unwrap();
        survey.attach(world.clone());

        run(&mut locator, &mut survey, &world);
        assert_eq!(locator.center(), Some((16, 16)));
    }
}
