//! Block type registry: maps compact [`BlockId`] values to [`BlockTypeDef`] metadata.
//!
//! Placement logic only cares about a few categories of a block: whether it
//! supports a structure (`solid`), whether it counts as water (`liquid`), and
//! whether a resource zone should clear it (`prunable`). Air is always ID 0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compact block identifier (2 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty block.
    pub const AIR: BlockId = BlockId(0);

    /// Returns `true` for air.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

/// Descriptor for a block type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTypeDef {
    /// Human-readable name (e.g. "stone", "water", "leaves").
    pub name: String,
    /// Whether a structure may rest on this block.
    pub solid: bool,
    /// Whether this block is a liquid surface.
    pub liquid: bool,
    /// Whether resource-zone pruning removes this block.
    pub prunable: bool,
}

impl BlockTypeDef {
    /// Solid, non-prunable ground material.
    pub fn ground(name: &str) -> Self {
        Self {
            name: name.to_string(),
            solid: true,
            liquid: false,
            prunable: false,
        }
    }

    /// Vegetation and other clutter that pruning clears.
    pub fn clutter(name: &str, solid: bool) -> Self {
        Self {
            name: name.to_string(),
            solid,
            liquid: false,
            prunable: true,
        }
    }

    /// Liquid surface.
    pub fn liquid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            solid: false,
            liquid: true,
            prunable: false,
        }
    }
}

/// Errors that can occur during block type registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name has already been registered.
    #[error("duplicate block type name: {0}")]
    DuplicateName(String),
    /// All 65 535 user-defined slots have been consumed.
    #[error("block type registry is full (max 65536 types)")]
    RegistryFull,
    /// A name was referenced that has not been registered.
    #[error("unknown block type name: {0}")]
    UnknownName(String),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockTypeDef`] with O(1) lookup in both directions.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    /// Dense array where `index == BlockId.0`.
    types: Vec<BlockTypeDef>,
    /// Reverse lookup: name → ID.
    name_to_id: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a new registry with air pre-registered as ID 0.
    pub fn new() -> Self {
        let air = BlockTypeDef {
            name: "air".to_string(),
            solid: false,
            liquid: false,
            prunable: false,
        };

        let mut name_to_id = HashMap::new();
        name_to_id.insert("air".to_string(), BlockId::AIR);

        Self {
            types: vec![air],
            name_to_id,
        }
    }

    /// A registry holding the common terrain and clutter blocks.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            BlockTypeDef::ground("stone"),
            BlockTypeDef::ground("dirt"),
            BlockTypeDef::ground("grass"),
            BlockTypeDef::ground("sand"),
            BlockTypeDef::liquid("water"),
            BlockTypeDef::clutter("log", true),
            BlockTypeDef::clutter("leaves", false),
            BlockTypeDef::clutter("tallgrass", false),
            BlockTypeDef::ground("planks"),
            BlockTypeDef::ground("cobblestone"),
        ];
        for def in defaults {
            // Names above are unique and far below the registry limit.
            if let Err(e) = registry.register(def) {
                unreachable!("default block registration failed: {e}");
            }
        }
        registry
    }

    /// Registers a new block type and returns its assigned ID.
    ///
    /// IDs are assigned sequentially starting from 1 (0 is air).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if a type with the same name
    /// already exists, or [`RegistryError::RegistryFull`] if all 65 536 slots
    /// are consumed.
    pub fn register(&mut self, def: BlockTypeDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.types.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.types.len() as u16);
        self.name_to_id.insert(def.name.clone(), id);
        self.types.push(def);
        Ok(id)
    }

    /// Returns the definition for a given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this registry.
    pub fn get(&self, id: BlockId) -> &BlockTypeDef {
        &self.types[id.0 as usize]
    }

    /// Returns the ID for a named block type, or `None` if not found.
    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Like [`id_of`](Self::id_of) but reports a missing name as an error.
    pub fn require(&self, name: &str) -> Result<BlockId, RegistryError> {
        self.id_of(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Override the prunable flag of the named types: exactly the listed
    /// names become prunable.
    pub fn set_prunable(&mut self, names: &[String]) -> Result<(), RegistryError> {
        let ids = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>, _>>()?;
        for def in &mut self.types {
            def.prunable = false;
        }
        for id in ids {
            self.types[id.0 as usize].prunable = true;
        }
        Ok(())
    }

    /// Returns the total number of registered types (including air).
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }

    /// Whether a structure may rest on `id`. Unknown IDs are not solid.
    pub fn is_solid(&self, id: BlockId) -> bool {
        self.types.get(id.0 as usize).is_some_and(|d| d.solid)
    }

    /// Whether pruning clears `id`. Unknown IDs are left alone.
    pub fn is_prunable(&self, id: BlockId) -> bool {
        self.types.get(id.0 as usize).is_some_and(|d| d.prunable)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_air_is_id_zero() {
        let registry = BlockRegistry::new();
        let air = registry.get(BlockId::AIR);
        assert_eq!(air.name, "air");
        assert!(!air.solid);
        assert!(!air.prunable);
    }

    #[test]
    fn test_register_returns_sequential_ids() {
        let mut registry = BlockRegistry::new();
        let id1 = registry.register(BlockTypeDef::ground("stone")).unwrap();
        let id2 = registry.register(BlockTypeDef::ground("dirt")).unwrap();
        assert_eq!(id1, BlockId(1));
        assert_eq!(id2, BlockId(2));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = BlockRegistry::new();
        registry.register(BlockTypeDef::ground("stone")).unwrap();
        let result = registry.register(BlockTypeDef::ground("stone"));
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
    }

    #[test]
    fn test_defaults_categories() {
        let registry = BlockRegistry::with_defaults();
        let water = registry.id_of("water").unwrap();
        let log = registry.id_of("log").unwrap();
        let grass = registry.id_of("grass").unwrap();
        assert!(!registry.is_solid(water));
        assert!(registry.get(water).liquid);
        assert!(registry.is_prunable(log));
        assert!(registry.is_solid(grass));
        assert!(!registry.is_prunable(grass));
        assert!(!registry.is_solid(BlockId(9999)));
    }

    #[test]
    fn test_set_prunable_replaces_category() {
        let mut registry = BlockRegistry::with_defaults();
        registry.set_prunable(&["sand".to_string()]).unwrap();
        assert!(registry.is_prunable(registry.id_of("sand").unwrap()));
        assert!(!registry.is_prunable(registry.id_of("log").unwrap()));

        let err = registry.set_prunable(&["bedrock".to_string()]);
        assert!(matches!(err, Err(RegistryError::UnknownName(_))));
        // A failed override leaves the previous category intact.
        assert!(registry.is_prunable(registry.id_of("sand").unwrap()));
    }
}
