//! Resumable placement of a single structure.
//!
//! A placer searches outward from its candidate offset on a one-block
//! spiral until the ground under every probe column is solid and level
//! enough, asks its [`PlacementSupervisor`] whether the spot may be used,
//! and then writes the structure in two phases: blocks during `generate`,
//! entities during [`SchematicPlacer::commit`].

use std::fmt;
use std::sync::Arc;

use haven_math::{SquareSpiral, Vec3i};
use haven_terrain::TerrainSurvey;
use haven_world::{BlockAccessor, ChunkColumnCoord, ChunkLoader, Persistent, Progress, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::schematic::Schematic;

/// Result of checking the ground under a candidate location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Every probe found solid ground within its band around this base
    /// height.
    Passed(i32),
    /// At least one probe found water, clutter or a too large step.
    Failed,
    /// A probed chunk is not loaded yet.
    Inconclusive,
}

/// How far a placer has written its structure into the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlacementState {
    Searching,
    BlocksPlaced,
    EntitiesPlaced,
}

/// Decides whether a probed location may be used.
pub trait PlacementSupervisor {
    /// Called with the world offset a placer wants to freeze.
    fn finalize(&mut self, id: usize, schematic: &Schematic, offset: Vec3i) -> Verdict;
}

/// One structure instance moving from search to placement.
#[derive(Serialize, Deserialize)]
pub struct SchematicPlacer {
    id: usize,
    schematic: Schematic,
    offset: Vec3i,
    spiral: SquareSpiral,
    finalized: bool,
    state: PlacementState,
    diagnostic_interval: u32,
    #[serde(skip)]
    loader: Option<Arc<dyn ChunkLoader>>,
}

impl fmt::Debug for SchematicPlacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchematicPlacer")
            .field("id", &self.id)
            .field("schematic", &self.schematic.name())
            .field("offset", &self.offset)
            .field("attempts", &self.spiral.index())
            .field("finalized", &self.finalized)
            .field("state", &self.state)
            .field("attached", &self.loader.is_some())
            .finish()
    }
}

impl SchematicPlacer {
    /// Creates a placer searching around the world origin until
    /// [`set_offset`](Self::set_offset) moves it.
    pub fn new(id: usize, schematic: Schematic, loader: Arc<dyn ChunkLoader>, diagnostic_interval: u32) -> Self {
        Self {
            id,
            schematic,
            offset: Vec3i::ZERO,
            spiral: SquareSpiral::new(),
            finalized: false,
            state: PlacementState::Searching,
            diagnostic_interval: diagnostic_interval.max(1),
            loader: Some(loader),
        }
    }

    /// Re-inject the chunk loader after deserialization and rebuild the
    /// schematic's derived data.
    ///
    /// # Panics
    ///
    /// Panics if a loader is already attached.
    pub fn attach(&mut self, loader: Arc<dyn ChunkLoader>) {
        assert!(self.loader.is_none(), "SchematicPlacer {} already has a chunk loader", self.id);
        if !self.schematic.is_resolved() {
            self.schematic.resolve();
        }
        self.loader = Some(loader);
    }

    pub fn is_attached(&self) -> bool {
        self.loader.is_some()
    }

    fn loader(&self) -> &Arc<dyn ChunkLoader> {
        match &self.loader {
            Some(loader) => loader,
            None => panic!("SchematicPlacer {} used before a chunk loader was attached", self.id),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn schematic(&self) -> &Schematic {
        &self.schematic
    }

    /// Candidate offset while searching, frozen world offset afterwards.
    pub fn offset(&self) -> Vec3i {
        self.offset
    }

    /// Move the search center and restart the spiral.
    ///
    /// # Panics
    ///
    /// Panics once the location has been finalized.
    pub fn set_offset(&mut self, offset: Vec3i) {
        assert!(
            !self.finalized,
            "SchematicPlacer {} offset changed after it was finalized",
            self.id
        );
        self.offset = offset;
        self.spiral.reset();
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    /// Spiral steps taken since the last [`set_offset`](Self::set_offset).
    pub fn attempts(&self) -> u32 {
        self.spiral.index()
    }

    fn candidate(&self) -> Vec3i {
        let (dx, dz) = self.spiral.offset();
        Vec3i::new(self.offset.x + dx, self.offset.y, self.offset.z + dz)
    }

    /// Check the ground under every probe of the schematic placed at
    /// `candidate`.
    ///
    /// All probes are read even after one comes back unloaded, so a single
    /// call requests every missing chunk at once.
    pub fn probe(&self, survey: &mut TerrainSurvey, candidate: Vec3i) -> ProbeOutcome {
        let probes = self.schematic.probes();
        let mut columns = Vec::with_capacity(probes.len());
        let mut missing = false;
        for p in probes {
            match survey.column(candidate.x + p.x, candidate.z + p.z) {
                Some(column) => columns.push(column),
                None => missing = true,
            }
        }
        if missing {
            return ProbeOutcome::Inconclusive;
        }
        if columns.is_empty() || columns.iter().any(|&(_, solid)| !solid) {
            return ProbeOutcome::Failed;
        }

        let sum: i64 = columns.iter().map(|&(h, _)| h as i64).sum();
        let base = (sum as f64 / columns.len() as f64).round() as i32;
        let level = probes
            .iter()
            .zip(&columns)
            .all(|(p, &(h, _))| (h - base).abs() <= p.band);
        if level {
            ProbeOutcome::Passed(base)
        } else {
            ProbeOutcome::Failed
        }
    }

    fn advance(&mut self) {
        self.spiral.next();
        let attempts = self.spiral.index();
        if attempts % self.diagnostic_interval == 0 {
            debug!(
                id = self.id,
                schematic = self.schematic.name(),
                attempts,
                ring = self.spiral.ring(),
                "still searching for level ground"
            );
        }
    }

    /// Search, then place blocks, as far as loaded chunks allow.
    ///
    /// Returns [`Progress::Complete`] once the blocks are in the world.
    /// Entities wait for [`commit`](Self::commit) unless `accessor` is
    /// revertible.
    ///
    /// # Panics
    ///
    /// Panics if no chunk loader is attached when blocks are due.
    pub fn generate(
        &mut self,
        survey: &mut TerrainSurvey,
        accessor: &mut dyn BlockAccessor,
        supervisor: &mut dyn PlacementSupervisor,
    ) -> Progress {
        while !self.finalized {
            let candidate = self.candidate();
            let base = match self.probe(survey, candidate) {
                ProbeOutcome::Inconclusive => return Progress::Incomplete,
                ProbeOutcome::Failed => {
                    self.advance();
                    continue;
                }
                ProbeOutcome::Passed(base) => base,
            };

            let placement = candidate.with_y(base + 1 - self.schematic.ground_level());
            match supervisor.finalize(self.id, &self.schematic, placement) {
                Verdict::Accepted => {
                    info!(
                        id = self.id,
                        schematic = self.schematic.name(),
                        offset = %placement,
                        attempts = self.spiral.index(),
                        "structure location finalized"
                    );
                    self.offset = placement;
                    self.finalized = true;
                }
                Verdict::Rejected => self.advance(),
                Verdict::Retry => return Progress::Incomplete,
            }
        }

        match self.state {
            PlacementState::Searching => self.place_blocks(accessor),
            PlacementState::BlocksPlaced | PlacementState::EntitiesPlaced => Progress::Complete,
        }
    }

    fn place_blocks(&mut self, accessor: &mut dyn BlockAccessor) -> Progress {
        let bounds = self.schematic.bounds().translated(self.offset);
        let mut missing = 0;
        for coord in ChunkColumnCoord::covering(bounds.min.x, bounds.min.z, bounds.max.x - 1, bounds.max.z - 1) {
            if !accessor.is_column_loaded(coord) {
                self.loader().load_chunk_column(coord);
                missing += 1;
            }
        }
        if missing > 0 {
            debug!(id = self.id, missing, "waiting for chunks under structure");
            return Progress::Incomplete;
        }

        let mut failed = 0;
        for &(pos, id) in self.schematic.blocks() {
            if !accessor.set_block(self.offset + pos, id) {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(id = self.id, failed, "some structure blocks could not be written");
        }

        if accessor.is_revertible() {
            self.place_entities(accessor);
        } else {
            self.state = PlacementState::BlocksPlaced;
        }
        Progress::Complete
    }

    fn place_entities(&mut self, accessor: &mut dyn BlockAccessor) {
        for entity in self.schematic.entities() {
            accessor.place_entity(&entity.translated(self.offset));
        }
        self.state = PlacementState::EntitiesPlaced;
    }

    /// Spawn the structure's entities. Only acts once, after blocks were
    /// placed through a non-revertible accessor.
    pub fn commit(&mut self, accessor: &mut dyn BlockAccessor) {
        if self.state == PlacementState::BlocksPlaced {
            self.place_entities(accessor);
        }
    }
}

impl Persistent for SchematicPlacer {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use haven_math::offset_of;
    use haven_world::{BlockId, BlockRegistry, ColumnSpec, MemoryWorld};

    /// Answers from a script, then accepts.
    struct Scripted(Vec<Verdict>);

    impl PlacementSupervisor for Scripted {
        fn finalize(&mut self, _id: usize, _schematic: &Schematic, _offset: Vec3i) -> Verdict {
            if self.0.is_empty() {
                Verdict::Accepted
            } else {
                self.0.remove(0)
            }
        }
    }

    fn hut(world: &MemoryWorld) -> Schematic {
        let planks = world.registry().id_of("planks").unwrap_or_default();
        let stone = world.registry().id_of("cobblestone").unwrap_or_default();
        Schematic::hut("hut", 5, 5, 4, planks, stone, 1)
    }

    fn placer(world: &Arc<MemoryWorld>, start: Vec3i) -> SchematicPlacer {
        let mut placer = SchematicPlacer::new(0, hut(world), world.clone(), 20);
        placer.set_offset(start);
        placer
    }

    fn run(
        placer: &mut SchematicPlacer,
        survey: &mut TerrainSurvey,
        world: &Arc<MemoryWorld>,
        accessor: &mut dyn BlockAccessor,
        supervisor: &mut dyn PlacementSupervisor,
    ) {
        for _ in 0..50 {
            if placer.generate(survey, accessor, supervisor).is_complete() {
                return;
            }
            world.load_pending();
        }
        panic!("placer did not finish");
    }

    #[test]
    fn test_flat_ground_places_on_first_candidate() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let mut placer = placer(&world, Vec3i::new(10, 0, 10));

        assert_eq!(
            placer.generate(&mut survey, &mut accessor, &mut Scripted(Vec::new())),
            Progress::Incomplete
        );
        assert_eq!(placer.attempts(), 0);
        run(&mut placer, &mut survey, &world, &mut accessor, &mut Scripted(Vec::new()));

        assert!(placer.is_finalized());
        assert_eq!(placer.offset(), Vec3i::new(10, 65, 10));
        assert_eq!(placer.state(), PlacementState::BlocksPlaced);
        let floor = world.registry().id_of("cobblestone");
        assert_eq!(world.block(Vec3i::new(10, 65, 10)), floor);
        assert_eq!(world.block(Vec3i::new(12, 66, 12)), Some(BlockId::AIR));
        assert!(world.entities().is_empty(), "entities wait for commit");

        placer.commit(&mut accessor);
        assert_eq!(placer.state(), PlacementState::EntitiesPlaced);
        let entities = world.entities();
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.pos().y == 66));

        placer.commit(&mut accessor);
        assert_eq!(world.entities().len(), 2, "commit is one-shot");
        assert_eq!(
            placer.generate(&mut survey, &mut accessor, &mut Scripted(Vec::new())),
            Progress::Complete
        );
    }

    #[test]
    fn test_revertible_accessor_defers_entities() {
        let world = Arc::new(MemoryWorld::flat(40));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.revertible_accessor();
        let mut placer = placer(&world, Vec3i::new(-20, 0, 5));

        run(&mut placer, &mut survey, &world, &mut accessor, &mut Scripted(Vec::new()));
        assert_eq!(placer.state(), PlacementState::EntitiesPlaced);
        assert_eq!(accessor.deferred().len(), 2);
        assert!(world.entities().is_empty());

        placer.commit(&mut accessor);
        assert_eq!(accessor.deferred().len(), 2);
        accessor.apply();
        assert_eq!(world.entities().len(), 2);
    }

    #[test]
    fn test_rejection_advances_spiral() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let start = Vec3i::new(8, 0, 8);
        let mut placer = placer(&world, start);
        let mut supervisor = Scripted(vec![Verdict::Rejected, Verdict::Rejected]);

        run(&mut placer, &mut survey, &world, &mut accessor, &mut supervisor);
        assert_eq!(placer.attempts(), 2);
        let (dx, dz) = offset_of(2);
        assert_eq!(placer.offset(), Vec3i::new(start.x + dx, 65, start.z + dz));
    }

    #[test]
    fn test_retry_keeps_candidate() {
        let world = Arc::new(MemoryWorld::flat(64));
        world.load_now(ChunkColumnCoord::new(0, 0));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let mut placer = placer(&world, Vec3i::new(4, 0, 4));
        let mut supervisor = Scripted(vec![Verdict::Retry]);

        assert_eq!(placer.generate(&mut survey, &mut accessor, &mut supervisor), Progress::Incomplete);
        assert!(!placer.is_finalized());
        assert_eq!(placer.attempts(), 0);
        assert_eq!(placer.generate(&mut survey, &mut accessor, &mut supervisor), Progress::Complete);
        assert_eq!(placer.offset(), Vec3i::new(4, 65, 4));
    }

    #[test]
    fn test_wet_ground_is_skipped() {
        // A pond covering x < 8.
        let world = Arc::new(MemoryWorld::new(BlockRegistry::with_defaults(), |registry, x, _| {
            let water = registry.id_of("water").unwrap_or_default();
            let grass = registry.id_of("grass").unwrap_or_default();
            if x < 8 {
                ColumnSpec::new(62, water, water)
            } else {
                ColumnSpec::new(64, grass, grass)
            }
        }));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let mut placer = placer(&world, Vec3i::new(2, 0, 10));

        run(&mut placer, &mut survey, &world, &mut accessor, &mut Scripted(Vec::new()));
        assert!(placer.attempts() > 0);
        assert!(placer.offset().x >= 8, "placed over water at {}", placer.offset());
        assert_eq!(placer.offset().y, 65);
    }

    #[test]
    fn test_probe_band() {
        // Terraces one block high every 2 columns along x.
        let world = Arc::new(MemoryWorld::new(BlockRegistry::with_defaults(), |registry, x, _| {
            let grass = registry.id_of("grass").unwrap_or_default();
            ColumnSpec::new(60 + x.div_euclid(2), grass, grass)
        }));
        for coord in ChunkColumnCoord::covering(-40, -40, 40, 40) {
            world.load_now(coord);
        }
        let mut survey = TerrainSurvey::new(world.clone());
        let placer = placer(&world, Vec3i::ZERO);

        // Five columns wide spans three terraces: 60, 61, 62 around base 61.
        assert_eq!(placer.probe(&mut survey, Vec3i::new(0, 0, 0)), ProbeOutcome::Passed(61));

        let steep = SchematicPlacer::new(
            1,
            Schematic::hut("wide", 9, 3, 3, BlockId(9), BlockId(9), 1),
            world.clone(),
            20,
        );
        assert_eq!(steep.probe(&mut survey, Vec3i::ZERO), ProbeOutcome::Failed);
    }

    #[test]
    fn test_unloaded_probe_is_inconclusive() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let placer = placer(&world, Vec3i::ZERO);
        assert_eq!(placer.probe(&mut survey, Vec3i::new(30, 0, 30)), ProbeOutcome::Inconclusive);
        assert!(world.pending_count() >= 2, "every missing chunk is requested at once");
    }

    #[test]
    #[should_panic(expected = "after it was finalized")]
    fn test_offset_frozen_after_finalize() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let mut placer = placer(&world, Vec3i::new(3, 0, 3));
        run(&mut placer, &mut survey, &world, &mut accessor, &mut Scripted(Vec::new()));
        placer.set_offset(Vec3i::ZERO);
    }

    #[test]
    fn test_resume_after_round_trip() {
        let world = Arc::new(MemoryWorld::flat(64));
        let mut survey = TerrainSurvey::new(world.clone());
        let mut accessor = world.accessor();
        let mut placer = placer(&world, Vec3i::new(40, 0, 40));
        assert_eq!(
            placer.generate(&mut survey, &mut accessor, &mut Scripted(Vec::new())),
            Progress::Incomplete
        );

        let mut placer = SchematicPlacer::from_bytes(&placer.to_bytes().unwrap()).unwrap();
        assert!(!placer.is_attached());
        placer.attach(world.clone());
        assert!(placer.schematic().is_resolved());
        world.load_pending();

        run(&mut placer, &mut survey, &world, &mut accessor, &mut Scripted(Vec::new()));
        assert_eq!(placer.offset(), Vec3i::new(40, 65, 40));
    }
}
