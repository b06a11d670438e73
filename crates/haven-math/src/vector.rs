use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Integer lattice position or displacement in block space.
///
/// Ordering is lexicographic on `(x, y, z)`, which gives point sets a
/// deterministic iteration order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    /// Zero vector (0, 0, 0).
    pub const ZERO: Self = Self::new(0, 0, 0);
    /// Unit vector in the X direction (1, 0, 0).
    pub const X: Self = Self::new(1, 0, 0);
    /// Unit vector in the Y direction (0, 1, 0).
    pub const Y: Self = Self::new(0, 1, 0);
    /// Unit vector in the Z direction (0, 0, 1).
    pub const Z: Self = Self::new(0, 0, 1);
    /// All components set to one.
    pub const ONE: Self = Self::new(1, 1, 1);

    /// Create a new vector with the given coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// All three components set to `v`.
    pub const fn splat(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Copy of `self` with the Y component replaced.
    pub const fn with_y(self, y: i32) -> Self {
        Self::new(self.x, y, self.z)
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Horizontal Manhattan distance `|dx| + |dz|`, ignoring Y.
    pub fn manhattan_xz(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Convert to a floating-point vector.
    pub fn as_dvec3(self) -> DVec3 {
        DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Round a floating-point vector to the nearest lattice point.
    pub fn round_from(v: DVec3) -> Self {
        Self::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
    }
}

impl fmt::Display for Vec3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Add for Vec3i {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3i {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3i {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3i {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Vec3i {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<i32> for Vec3i {
    type Output = Self;
    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
