//! Region sets: a lattice point set stored as a list of maximal cuboids.
//!
//! Built once from explicit points and used for collision tests between
//! structure outlines. Regions are grown greedily in all six directions, so a
//! solid block of points collapses into a single cuboid.

use std::collections::BTreeSet;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{Cuboid, Vec3i};

/// A pair of regions found to overlap.
///
/// `own` is the region of the queried list, `other` is the region of the
/// argument list in its untranslated coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    pub own: Cuboid,
    pub other: Cuboid,
}

/// An explicit lattice point set represented as merged bounding boxes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AabbList {
    regions: Vec<Cuboid>,
}

/// The six growth directions, in the order they are attempted.
const GROW_DIRECTIONS: [Vec3i; 6] = [
    Vec3i::new(1, 0, 0),
    Vec3i::new(-1, 0, 0),
    Vec3i::new(0, 0, 1),
    Vec3i::new(0, 0, -1),
    Vec3i::new(0, 1, 0),
    Vec3i::new(0, -1, 0),
];

impl AabbList {
    /// Build a region set covering exactly `points`.
    ///
    /// Repeatedly takes the smallest remaining point, grows a unit cuboid
    /// outward while every point of the new face is still remaining, removes
    /// the covered points and starts again.
    pub fn new(points: impl IntoIterator<Item = Vec3i>) -> Self {
        let mut remaining: BTreeSet<Vec3i> = points.into_iter().collect();
        let mut regions = Vec::new();

        while let Some(&seed) = remaining.first() {
            let region = grow_region(seed, &remaining);
            for p in region.points() {
                remaining.remove(&p);
            }
            regions.push(region);
        }

        Self { regions }
    }

    /// Region set consisting of the given cuboids as-is.
    pub fn from_regions(regions: Vec<Cuboid>) -> Self {
        Self {
            regions: regions.into_iter().filter(|r| !r.is_empty()).collect(),
        }
    }

    /// The regions making up this set.
    pub fn regions(&self) -> &[Cuboid] {
        &self.regions
    }

    /// True if the set covers no points.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Smallest cuboid enclosing every region.
    pub fn bounds(&self) -> Option<Cuboid> {
        self.regions.iter().copied().reduce(|a, b| a.union(&b))
    }

    /// Total number of covered points, counting overlaps once per region.
    pub fn volume(&self) -> i64 {
        self.regions.iter().map(Cuboid::volume).sum()
    }

    /// True iff any region contains `p`.
    pub fn contains(&self, p: Vec3i) -> bool {
        self.regions.iter().any(|r| r.contains(p))
    }

    /// True iff this set covers every point of `other` translated by `offset`.
    ///
    /// Works on a list of pending boxes: each box is matched against one
    /// region it intersects, the covered part is removed and the leftover
    /// pieces go back on the list. A box that touches no region fails the test.
    pub fn contains_list(&self, other: &AabbList, offset: Vec3i) -> bool {
        let mut pending: Vec<Cuboid> = other.regions.iter().map(|r| r.translated(offset)).collect();

        while let Some(b) = pending.pop() {
            let Some(region) = self.regions.iter().find(|r| r.intersects(&b)) else {
                return false;
            };
            if region.contains_cuboid(&b) {
                continue;
            }
            pending.extend(b.subtract(region));
        }

        true
    }

    /// First region of this set overlapping `cuboid` translated by `offset`.
    pub fn intersects_cuboid(&self, cuboid: &Cuboid, offset: Vec3i) -> Option<Cuboid> {
        let moved = cuboid.translated(offset);
        self.regions.iter().copied().find(|r| r.intersects(&moved))
    }

    /// First overlapping pair between this set and `other` translated by `offset`.
    pub fn intersects(&self, other: &AabbList, offset: Vec3i) -> Option<Overlap> {
        other.regions.iter().find_map(|o| {
            self.intersects_cuboid(o, offset)
                .map(|own| Overlap { own, other: *o })
        })
    }

    /// Push `other` along `direction` until it no longer overlaps this set.
    ///
    /// `offset` is advanced in whole steps of `direction` (rounded to the
    /// lattice) from its starting value. Whenever an overlap is found, the
    /// blocking pair is stepped past first and then the whole set is checked
    /// again, so a newly exposed blocker is handled on the next round. The
    /// step count only increases. Returns true if `offset` changed.
    ///
    /// # Panics
    ///
    /// Panics if `direction` is zero or not finite, since no amount of
    /// stepping along it can resolve an overlap.
    pub fn avoid_intersection(&self, other: &AabbList, offset: &mut Vec3i, direction: DVec3) -> bool {
        assert!(
            direction.is_finite() && direction.length_squared() > 0.0,
            "avoid_intersection requires a non-zero direction, got {direction:?}"
        );
        let direction = direction.normalize();
        let start = *offset;
        let mut steps: i64 = 0;
        let mut moved = false;

        while let Some(hit) = self.intersects(other, *offset) {
            while hit.own.intersects(&hit.other.translated(*offset)) {
                steps += 1;
                *offset = start + Vec3i::round_from(direction * steps as f64);
            }
            moved = true;
        }

        moved
    }

    /// Extend every region touching the top of the set upward by `amount`.
    pub fn grow_up(&mut self, amount: i32) {
        let Some(top) = self.regions.iter().map(|r| r.max.y).max() else {
            return;
        };
        for r in self.regions.iter_mut().filter(|r| r.max.y == top) {
            r.max.y += amount;
        }
    }

    /// Extend every region touching the bottom of the set downward by `amount`.
    pub fn grow_down(&mut self, amount: i32) {
        let Some(bottom) = self.regions.iter().map(|r| r.min.y).min() else {
            return;
        };
        for r in self.regions.iter_mut().filter(|r| r.min.y == bottom) {
            r.min.y -= amount;
        }
    }

    /// Copy of this set shifted by `offset`.
    pub fn translated(&self, offset: Vec3i) -> AabbList {
        Self {
            regions: self.regions.iter().map(|r| r.translated(offset)).collect(),
        }
    }
}

/// Grow a unit cuboid at `seed` as far as `remaining` allows in all six directions.
fn grow_region(seed: Vec3i, remaining: &BTreeSet<Vec3i>) -> Cuboid {
    let mut region = Cuboid::unit(seed);
    loop {
        let mut grew = false;
        for dir in GROW_DIRECTIONS {
            let face = face_beyond(&region, dir);
            if face.points().all(|p| remaining.contains(&p)) {
                region = region.union(&face);
                grew = true;
            }
        }
        if !grew {
            return region;
        }
    }
}

/// The one-thick slab just outside `region` in direction `dir`.
fn face_beyond(region: &Cuboid, dir: Vec3i) -> Cuboid {
    let (mut min, mut max) = (region.min, region.max);
    match (dir.x, dir.y, dir.z) {
        (1, _, _) => {
            min.x = region.max.x;
            max.x = region.max.x + 1;
        }
        (-1, _, _) => {
            min.x = region.min.x - 1;
            max.x = region.min.x;
        }
        (_, 1, _) => {
            min.y = region.max.y;
            max.y = region.max.y + 1;
        }
        (_, -1, _) => {
            min.y = region.min.y - 1;
            max.y = region.min.y;
        }
        (_, _, 1) => {
            min.z = region.max.z;
            max.z = region.max.z + 1;
        }
        _ => {
            min.z = region.min.z - 1;
            max.z = region.min.z;
        }
    }
    Cuboid::new(min, max)
}
