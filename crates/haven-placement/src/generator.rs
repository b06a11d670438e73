//! Haven generation from start to finish.
//!
//! Locate a flat, dry disk, pack the structures into a resource zone around
//! its center, clear the zone, then let every structure find level ground
//! near its planned spot. All structures are driven on every pass, so the
//! chunk requests of one pass cover everything still pending.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use haven_config::HavenConfig;
use haven_math::{AabbList, Vec3i};
use haven_terrain::{FlatAreaLocator, TerrainSurvey};
use haven_world::{BlockAccessor, ChunkLoader, HeightSource, Persistent, Progress, Verdict};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::placer::{PlacementSupervisor, SchematicPlacer};
use crate::pruner::DiskPruner;
use crate::schematic::Schematic;
use crate::zone::ResourceZonePlan;

/// Coarse progress of a [`HavenGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Locating,
    Building,
    Done,
    Failed,
}

/// A structure location granted by the site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Claim {
    owner: usize,
    offset: Vec3i,
    footprint: AabbList,
}

/// The resource zone once its center is known. Acts as the supervisor of
/// every placer.
#[derive(Debug, Serialize, Deserialize)]
struct Site {
    zone: ResourceZonePlan,
    pruner: DiskPruner,
    claims: Vec<Claim>,
}

impl PlacementSupervisor for Site {
    fn finalize(&mut self, id: usize, schematic: &Schematic, offset: Vec3i) -> Verdict {
        let footprint = schematic.footprint();
        let overlap = self.claims.iter().find(|c| {
            let rel = offset - c.offset;
            c.owner != id && c.footprint.intersects(footprint, rel.with_y(0)).is_some()
        });
        if let Some(claim) = overlap {
            debug!(id, other = claim.owner, offset = %offset, "placement overlaps another structure");
            return Verdict::Rejected;
        }

        if let Some(bounds) = footprint.bounds() {
            let relative = offset - self.zone.center();
            if self.zone.expand_radius_if_necessary(&bounds.translated(relative.with_y(0))) {
                debug!(id, radius = self.zone.radius(), "resource zone grew");
            }
        }
        let needed = self.zone.radius().ceil() as i32;
        if self.pruner.target_radius() < needed {
            self.pruner.expand(needed);
            return Verdict::Retry;
        }
        if !self.pruner.is_done() {
            return Verdict::Retry;
        }

        self.claims.push(Claim {
            owner: id,
            offset,
            footprint: footprint.clone(),
        });
        Verdict::Accepted
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum Phase {
    Locating,
    Building(Site),
    Done(Site),
    Failed,
}

/// Resumable generation of one haven.
#[derive(Serialize, Deserialize)]
pub struct HavenGenerator {
    seed: u64,
    min_zone_radius: i32,
    survey: TerrainSurvey,
    locator: FlatAreaLocator,
    placers: Vec<SchematicPlacer>,
    phase: Phase,
    #[serde(skip)]
    loader: Option<Arc<dyn ChunkLoader>>,
}

impl fmt::Debug for HavenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HavenGenerator")
            .field("seed", &self.seed)
            .field("stage", &self.stage())
            .field("locator", &self.locator)
            .field("placers", &self.placers.len())
            .field("surveyed_chunks", &self.survey.len())
            .finish()
    }
}

impl HavenGenerator {
    /// Prepares a haven of `schematics` searched for from the configured
    /// start position.
    pub fn new(
        config: &HavenConfig,
        schematics: Vec<Schematic>,
        source: Arc<dyn HeightSource>,
        loader: Arc<dyn ChunkLoader>,
    ) -> Self {
        let placers = schematics
            .into_iter()
            .enumerate()
            .map(|(id, s)| SchematicPlacer::new(id, s, loader.clone(), config.zone.diagnostic_interval))
            .collect();
        Self {
            seed: config.world.seed,
            min_zone_radius: config.zone.min_radius,
            survey: TerrainSurvey::new(source),
            locator: FlatAreaLocator::disk(config.world.start_x, config.world.start_z, config.locator.clone()),
            placers,
            phase: Phase::Locating,
            loader: Some(loader),
        }
    }

    /// Re-inject collaborators into every component after deserialization.
    ///
    /// # Panics
    ///
    /// Panics if collaborators are already attached.
    pub fn attach(&mut self, source: Arc<dyn HeightSource>, loader: Arc<dyn ChunkLoader>) {
        assert!(self.loader.is_none(), "HavenGenerator already has collaborators attached");
        self.survey.attach(source);
        for placer in &mut self.placers {
            placer.attach(loader.clone());
        }
        if let Phase::Building(site) | Phase::Done(site) = &mut self.phase {
            site.pruner.attach(loader.clone());
        }
        self.loader = Some(loader);
    }

    pub fn is_attached(&self) -> bool {
        self.loader.is_some()
    }

    fn loader(&self) -> Arc<dyn ChunkLoader> {
        match &self.loader {
            Some(loader) => loader.clone(),
            None => panic!("HavenGenerator used before collaborators were attached"),
        }
    }

    pub fn stage(&self) -> Stage {
        match self.phase {
            Phase::Locating => Stage::Locating,
            Phase::Building(_) => Stage::Building,
            Phase::Done(_) => Stage::Done,
            Phase::Failed => Stage::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage() == Stage::Done
    }

    /// True if no suitable area was found.
    pub fn is_failed(&self) -> bool {
        self.stage() == Stage::Failed
    }

    pub fn survey(&self) -> &TerrainSurvey {
        &self.survey
    }

    pub fn locator(&self) -> &FlatAreaLocator {
        &self.locator
    }

    pub fn placers(&self) -> &[SchematicPlacer] {
        &self.placers
    }

    fn site(&self) -> Option<&Site> {
        match &self.phase {
            Phase::Building(site) | Phase::Done(site) => Some(site),
            Phase::Locating | Phase::Failed => None,
        }
    }

    /// Resource zone, once the haven center is known.
    pub fn zone(&self) -> Option<&ResourceZonePlan> {
        self.site().map(|s| &s.zone)
    }

    /// Zone pruner, once the haven center is known.
    pub fn pruner(&self) -> Option<&DiskPruner> {
        self.site().map(|s| &s.pruner)
    }

    /// Advance generation as far as loaded chunks allow.
    ///
    /// Returns [`Progress::Complete`] when the haven is built or could not
    /// be located; [`is_failed`](Self::is_failed) tells the two apart.
    pub fn generate(&mut self, accessor: &mut dyn BlockAccessor) -> Progress {
        loop {
            match &mut self.phase {
                Phase::Locating => {
                    if self.locator.generate(&mut self.survey) == Progress::Incomplete {
                        return Progress::Incomplete;
                    }
                    match (self.locator.center(), self.locator.height()) {
                        (Some((x, z)), Some(height)) => {
                            let site = self.plan_site(x, z, height);
                            self.phase = Phase::Building(site);
                        }
                        _ => {
                            warn!(seed = self.seed, "haven generation failed: no site found");
                            self.phase = Phase::Failed;
                        }
                    }
                }
                Phase::Building(site) => {
                    let mut progress = site.pruner.generate(&mut self.survey, accessor);
                    for placer in &mut self.placers {
                        progress = progress.and(placer.generate(&mut self.survey, accessor, &mut *site));
                    }
                    if progress == Progress::Incomplete {
                        return Progress::Incomplete;
                    }
                    info!(
                        center = %site.zone.center(),
                        radius = site.zone.radius(),
                        structures = site.claims.len(),
                        cleared = site.pruner.cleared(),
                        "haven built"
                    );
                    if let Phase::Building(site) = mem::replace(&mut self.phase, Phase::Failed) {
                        self.phase = Phase::Done(site);
                    }
                }
                Phase::Done(_) | Phase::Failed => return Progress::Complete,
            }
        }
    }

    fn plan_site(&mut self, x: i32, z: i32, height: i32) -> Site {
        let mut rng = ChaCha8Rng::seed_from_u64(site_seed(self.seed, x, z));
        let footprints: Vec<&AabbList> = self.placers.iter().map(|p| p.schematic().footprint()).collect();
        let mut zone = ResourceZonePlan::new(&footprints, self.min_zone_radius as f64, &mut rng);
        zone.set_center(Vec3i::new(x, height, z));
        for (i, placer) in self.placers.iter_mut().enumerate() {
            placer.set_offset(zone.offset(i));
        }

        let radius = zone.radius().ceil() as i32;
        info!(x, z, height, radius, structures = zone.len(), "resource zone planned");
        Site {
            pruner: DiskPruner::new(x, z, radius, self.loader()),
            zone,
            claims: Vec::new(),
        }
    }

    /// Spawn the entities of every structure. Only acts once the haven is
    /// built; repeated calls do nothing.
    pub fn commit(&mut self, accessor: &mut dyn BlockAccessor) {
        if !self.is_done() {
            warn!(stage = ?self.stage(), "commit before the haven was built");
            return;
        }
        for placer in &mut self.placers {
            placer.commit(accessor);
        }
    }
}

/// Deterministic layout seed for a haven centered at `(x, z)`.
fn site_seed(world_seed: u64, x: i32, z: i32) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    x.hash(&mut hasher);
    z.hash(&mut hasher);
    hasher.finish()
}

impl Persistent for HavenGenerator {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
