//! Structure blueprints.
//!
//! A [`Schematic`] stores only its authoritative data: the block list, the
//! entities and two placement parameters. Everything derived from the blocks
//! (region sets and probes) is rebuilt by [`Schematic::resolve`], which
//! constructors call and which must be called again after deserialization.

use haven_config::LayoutConfig;
use haven_math::{AabbList, Cuboid, Vec3i};
use haven_world::{BlockId, BlockRegistry, EntityPlacement, Persistent, RegistryError};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A ground check at one block column of a structure's footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Column X relative to the schematic origin.
    pub x: i32,
    /// Column Z relative to the schematic origin.
    pub z: i32,
    /// Largest allowed difference between the terrain here and the
    /// structure's base height.
    pub band: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Derived {
    outline: AabbList,
    footprint: AabbList,
    fence: AabbList,
    probes: Vec<Probe>,
    bounds: Cuboid,
}

/// Immutable blueprint of a multi-block structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schematic {
    name: String,
    /// Blocks in local coordinates. Air entries carve out space.
    blocks: Vec<(Vec3i, BlockId)>,
    entities: Vec<EntityPlacement>,
    /// Local Y placed one block above the terrain surface.
    ground_level: i32,
    probe_band: i32,
    #[serde(skip)]
    derived: Option<Derived>,
}

impl Schematic {
    /// Creates and resolves a schematic.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` holds no solid block, since such a structure has
    /// no outline to place.
    pub fn new(
        name: impl Into<String>,
        blocks: Vec<(Vec3i, BlockId)>,
        entities: Vec<EntityPlacement>,
        ground_level: i32,
        probe_band: i32,
    ) -> Self {
        let mut schematic = Self {
            name: name.into(),
            blocks,
            entities,
            ground_level,
            probe_band,
            derived: None,
        };
        schematic.resolve();
        schematic
    }

    /// A walled hut: a floor, hollow walls with a doorway on the north side,
    /// a flat roof, a chest and one inhabitant.
    pub fn hut(
        name: impl Into<String>,
        width: i32,
        depth: i32,
        height: i32,
        wall: BlockId,
        floor: BlockId,
        probe_band: i32,
    ) -> Self {
        let mut blocks = Vec::with_capacity((width * depth * height.max(1)) as usize);
        let door_x = width / 2;
        for y in 0..height {
            for z in 0..depth {
                for x in 0..width {
                    let edge = x == 0 || z == 0 || x == width - 1 || z == depth - 1;
                    let id = if y == 0 {
                        floor
                    } else if y == height - 1 && height > 2 {
                        wall
                    } else if edge && !(z == 0 && x == door_x && y <= 2) {
                        wall
                    } else {
                        BlockId::AIR
                    };
                    blocks.push((Vec3i::new(x, y, z), id));
                }
            }
        }

        let mut entities = Vec::new();
        if width > 2 && depth > 2 && height > 2 {
            entities.push(EntityPlacement::BlockEntity {
                pos: Vec3i::new(1, 1, depth - 2),
                tag: "chest".to_string(),
            });
            entities.push(EntityPlacement::Entity {
                kind: "villager".to_string(),
                pos: Vec3i::new(width / 2, 1, depth / 2),
            });
        }
        Self::new(name, blocks, entities, 0, probe_band)
    }

    /// Rebuild the derived region sets and probes from the block list.
    pub fn resolve(&mut self) {
        let solid: Vec<Vec3i> = self
            .blocks
            .iter()
            .filter(|(_, id)| !id.is_air())
            .map(|(p, _)| *p)
            .collect();
        let outline = AabbList::new(solid.iter().copied());
        let Some(bounds) = outline.bounds() else {
            panic!("schematic `{}` has no solid blocks", self.name);
        };

        let columns: FxHashSet<(i32, i32)> = solid.iter().map(|p| (p.x, p.z)).collect();
        let mut probes: Vec<Probe> = columns
            .iter()
            .map(|&(x, z)| Probe {
                x,
                z,
                band: self.probe_band,
            })
            .collect();
        probes.sort_by_key(|p| (p.z, p.x));

        let footprint = AabbList::new(columns.iter().map(|&(x, z)| Vec3i::new(x, 0, z)));
        let mut fence = footprint.translated(Vec3i::new(0, bounds.min.y, 0));
        fence.grow_up(bounds.size().y - 1);

        self.derived = Some(Derived {
            outline,
            footprint,
            fence,
            probes,
            bounds,
        });
    }

    /// Whether derived data is available.
    pub fn is_resolved(&self) -> bool {
        self.derived.is_some()
    }

    fn derived(&self) -> &Derived {
        match &self.derived {
            Some(d) => d,
            None => panic!("schematic `{}` used before resolve()", self.name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blocks(&self) -> &[(Vec3i, BlockId)] {
        &self.blocks
    }

    pub fn entities(&self) -> &[EntityPlacement] {
        &self.entities
    }

    pub fn ground_level(&self) -> i32 {
        self.ground_level
    }

    /// Non-air blocks as a 3D region set.
    ///
    /// # Panics
    ///
    /// Panics if the schematic is not resolved; so do the other derived
    /// accessors.
    pub fn outline(&self) -> &AabbList {
        &self.derived().outline
    }

    /// Plan view of the outline, at y = 0.
    pub fn footprint(&self) -> &AabbList {
        &self.derived().footprint
    }

    /// Footprint extruded over the full height of the structure.
    pub fn fence(&self) -> &AabbList {
        &self.derived().fence
    }

    /// One probe per footprint column.
    pub fn probes(&self) -> &[Probe] {
        &self.derived().probes
    }

    /// Bounding box of the outline.
    pub fn bounds(&self) -> Cuboid {
        self.derived().bounds
    }
}

impl Persistent for Schematic {}

/// Builds one hut per configured structure copy, walled with planks on a
/// cobblestone floor.
///
/// # Errors
///
/// Returns [`RegistryError::UnknownName`] if the registry lacks either
/// building material.
pub fn layout_schematics(
    layout: &LayoutConfig,
    registry: &BlockRegistry,
    probe_band: i32,
) -> Result<Vec<Schematic>, RegistryError> {
    let wall = registry.require("planks")?;
    let floor = registry.require("cobblestone")?;
    let mut schematics = Vec::new();
    for s in &layout.structures {
        let hut = Schematic::hut(s.name.as_str(), s.width, s.depth, s.height, wall, floor, probe_band);
        schematics.extend(std::iter::repeat_n(hut, s.count as usize));
    }
    Ok(schematics)
}
