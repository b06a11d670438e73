//! Structure placement: schematic blueprints, resource zone packing, the
//! resumable per-structure placer, zone clearing and the haven orchestrator.
//!
//! Every stateful type here follows the same contract: `generate` returns
//! [`Progress::Incomplete`](haven_world::Progress) while chunks are missing
//! and is simply called again later; `commit` performs side effects that
//! must happen exactly once; after deserialization `attach` re-injects the
//! live collaborators.

mod generator;
mod placer;
mod pruner;
mod schematic;
mod zone;

pub use generator::{HavenGenerator, Stage};
pub use placer::{PlacementState, PlacementSupervisor, ProbeOutcome, SchematicPlacer};
pub use pruner::DiskPruner;
pub use schematic::{Probe, Schematic, layout_schematics};
pub use zone::ResourceZonePlan;
