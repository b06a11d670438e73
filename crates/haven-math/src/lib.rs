//! Integer lattice math for structure placement: vectors, cuboids, region sets,
//! the square spiral search pattern, and the incremental terrain plane fit.

mod aabb_list;
mod cuboid;
mod linreg;
mod spiral;
mod vector;

pub use aabb_list::{AabbList, Overlap};
pub use cuboid::Cuboid;
pub use linreg::TerrainHeightLinReg;
pub use spiral::{SquareSpiral, offset_of, ring_of};
pub use vector::Vec3i;
