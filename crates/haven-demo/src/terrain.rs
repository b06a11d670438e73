//! Noise terrain for the demo world.
//!
//! Heights are multi-octave fBm over simplex noise. Columns below sea level
//! are flooded, the shore is sand, and grass carries scattered trees and
//! tall grass picked by a per-column hash.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use haven_world::{BlockId, BlockRegistry, ColumnSpec, MemoryWorld};
use noise::{NoiseFn, Simplex};

/// Shape of the generated terrain.
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: u64,
    /// Number of noise octaves summed.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the broadest octave, in cycles per block.
    pub base_frequency: f64,
    /// Amplitude of the broadest octave, in blocks.
    pub amplitude: f64,
    /// Height the noise is centered on.
    pub base_height: i32,
    /// Columns below this are under water.
    pub sea_level: i32,
    /// One column in this many grows a tree.
    pub tree_rarity: u64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 5,
            lacunarity: 2.0,
            persistence: 0.45,
            base_frequency: 0.004,
            amplitude: 14.0,
            base_height: 68,
            sea_level: 62,
            tree_rarity: 37,
        }
    }
}

/// fBm height sampler.
pub struct HeightSampler {
    noise: Simplex,
    params: TerrainParams,
}

impl HeightSampler {
    pub fn new(params: TerrainParams) -> Self {
        let noise = Simplex::new(params.seed as u32);
        Self { noise, params }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Raw fBm value at a block column.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        total
    }

    /// Geometric sum of all octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amplitude;
            amplitude *= self.params.persistence;
        }
        sum
    }

    /// Surface height of a block column.
    pub fn height(&self, x: i32, z: i32) -> i32 {
        self.params.base_height + self.sample(x as f64, z as f64).round() as i32
    }

    fn column_hash(&self, x: i32, z: i32) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.params.seed.hash(&mut hasher);
        x.hash(&mut hasher);
        z.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Copy)]
struct Palette {
    stone: BlockId,
    dirt: BlockId,
    grass: BlockId,
    sand: BlockId,
    water: BlockId,
    log: BlockId,
    leaves: BlockId,
    tallgrass: BlockId,
}

impl Palette {
    fn from_registry(registry: &BlockRegistry) -> Self {
        let id = |name: &str| registry.id_of(name).unwrap_or(BlockId::AIR);
        Self {
            stone: id("stone"),
            dirt: id("dirt"),
            grass: id("grass"),
            sand: id("sand"),
            water: id("water"),
            log: id("log"),
            leaves: id("leaves"),
            tallgrass: id("tallgrass"),
        }
    }
}

impl HeightSampler {
    fn column(&self, palette: &Palette, x: i32, z: i32) -> ColumnSpec {
        let height = self.height(x, z);
        let sea = self.params.sea_level;
        if height < sea {
            return ColumnSpec::new(sea, palette.water, palette.sand);
        }
        if height <= sea + 1 {
            return ColumnSpec::new(height, palette.sand, palette.sand);
        }

        let fill = if height > sea + 12 { palette.stone } else { palette.dirt };
        let column = ColumnSpec::new(height, palette.grass, fill);
        let roll = self.column_hash(x, z);
        if roll % self.params.tree_rarity.max(1) == 0 {
            let trunk = 3 + (roll >> 32) as usize % 3;
            let mut decoration = vec![palette.log; trunk];
            decoration.extend([palette.leaves, palette.leaves]);
            column.with_decoration(decoration)
        } else if roll % 5 == 1 {
            column.with_decoration(vec![palette.tallgrass])
        } else {
            column
        }
    }
}

/// A lazily loaded world over noise terrain.
pub fn noise_world(registry: BlockRegistry, params: TerrainParams) -> MemoryWorld {
    let palette = Palette::from_registry(&registry);
    let sampler = HeightSampler::new(params);
    MemoryWorld::new(registry, move |_, x, z| sampler.column(&palette, x, z))
}
