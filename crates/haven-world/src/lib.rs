//! World-facing side of haven placement: chunk coordinates, block types, the
//! collaborator traits the engine is driven through, outcome enums, the
//! persistence envelope and an in-memory reference world.

pub mod coords;
pub mod memory;
pub mod outcome;
pub mod persist;
pub mod registry;
pub mod source;

pub use coords::{CHUNK_AREA, CHUNK_SIZE, ChunkColumnCoord, ChunkCoord};
pub use memory::{ColumnSpec, MemoryAccessor, MemoryWorld};
pub use outcome::{Completeness, Progress, Verdict};
pub use persist::{PersistError, Persistent};
pub use registry::{BlockId, BlockRegistry, BlockTypeDef, RegistryError};
pub use source::{BlockAccessor, ChunkLoader, ColumnHeights, EntityPlacement, HeightSource};
