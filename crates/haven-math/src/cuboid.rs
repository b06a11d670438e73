use serde::{Deserialize, Serialize};

use crate::Vec3i;

/// Half-open axis-aligned integer box `[min.x, max.x) x [min.y, max.y) x [min.z, max.z)`.
///
/// A cuboid is a plain value. Region sets own their cuboids exclusively and
/// only grow them through their own methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cuboid {
    pub min: Vec3i,
    pub max: Vec3i,
}

impl Cuboid {
    /// Create a cuboid from its inclusive minimum and exclusive maximum corners.
    pub const fn new(min: Vec3i, max: Vec3i) -> Self {
        Self { min, max }
    }

    /// The 1x1x1 cuboid covering exactly one lattice point.
    pub fn unit(p: Vec3i) -> Self {
        Self::new(p, p + Vec3i::ONE)
    }

    /// Cuboid of the given size starting at `min`.
    pub fn from_size(min: Vec3i, size: Vec3i) -> Self {
        Self::new(min, min + size)
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec3i {
        self.max - self.min
    }

    /// True if the cuboid covers no points.
    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y || self.max.z <= self.min.z
    }

    /// Number of lattice points covered.
    pub fn volume(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        let s = self.size();
        s.x as i64 * s.y as i64 * s.z as i64
    }

    /// True if `p` lies inside the half-open box.
    pub fn contains(&self, p: Vec3i) -> bool {
        p.x >= self.min.x
            && p.x < self.max.x
            && p.y >= self.min.y
            && p.y < self.max.y
            && p.z >= self.min.z
            && p.z < self.max.z
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains_cuboid(&self, other: &Cuboid) -> bool {
        other.is_empty()
            || (other.min.x >= self.min.x
                && other.max.x <= self.max.x
                && other.min.y >= self.min.y
                && other.max.y <= self.max.y
                && other.min.z >= self.min.z
                && other.max.z <= self.max.z)
    }

    /// True if the two boxes share at least one lattice point.
    /// Touching faces do not count.
    pub fn intersects(&self, other: &Cuboid) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// The overlapping box, or `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &Cuboid) -> Option<Cuboid> {
        let c = Cuboid::new(self.min.max(other.min), self.max.min(other.max));
        (!c.is_empty()).then_some(c)
    }

    /// Smallest cuboid enclosing both.
    pub fn union(&self, other: &Cuboid) -> Cuboid {
        Cuboid::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Copy shifted by `offset`.
    pub fn translated(&self, offset: Vec3i) -> Cuboid {
        Cuboid::new(self.min + offset, self.max + offset)
    }

    /// Remove `hole` from `self`, returning the remaining pieces.
    ///
    /// The pieces are pairwise disjoint: two X slabs spanning the full Y/Z
    /// range, then two Y slabs within the hole's X range, then two Z slabs
    /// within the hole's X and Y range. At most six pieces are produced.
    pub fn subtract(&self, hole: &Cuboid) -> Vec<Cuboid> {
        let Some(hole) = self.intersection(hole) else {
            return vec![*self];
        };

        let mut pieces = Vec::with_capacity(6);
        let mut push = |c: Cuboid| {
            if !c.is_empty() {
                pieces.push(c);
            }
        };

        // X slabs: full Y and Z extent.
        push(Cuboid::new(self.min, Vec3i::new(hole.min.x, self.max.y, self.max.z)));
        push(Cuboid::new(Vec3i::new(hole.max.x, self.min.y, self.min.z), self.max));

        // Y slabs: restricted to the hole's X range.
        push(Cuboid::new(
            Vec3i::new(hole.min.x, self.min.y, self.min.z),
            Vec3i::new(hole.max.x, hole.min.y, self.max.z),
        ));
        push(Cuboid::new(
            Vec3i::new(hole.min.x, hole.max.y, self.min.z),
            Vec3i::new(hole.max.x, self.max.y, self.max.z),
        ));

        // Z slabs: restricted to the hole's X and Y range.
        push(Cuboid::new(
            Vec3i::new(hole.min.x, hole.min.y, self.min.z),
            Vec3i::new(hole.max.x, hole.max.y, hole.min.z),
        ));
        push(Cuboid::new(
            Vec3i::new(hole.min.x, hole.min.y, hole.max.z),
            Vec3i::new(hole.max.x, hole.max.y, self.max.z),
        ));

        pieces
    }

    /// Iterate over every lattice point, X fastest.
    pub fn points(&self) -> impl Iterator<Item = Vec3i> + '_ {
        let (min, max) = (self.min, self.max);
        (min.z..max.z).flat_map(move |z| {
            (min.y..max.y).flat_map(move |y| (min.x..max.x).map(move |x| Vec3i::new(x, y, z)))
        })
    }
}
