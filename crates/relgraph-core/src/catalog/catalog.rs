//! Catalog of registered entity metadata.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::entity::EntityDef;
use crate::error::Error;

/// The relationship metadata registry.
///
/// Entity types are registered explicitly at startup, keyed by a stable
/// string type tag. After registration the catalog is a pure lookup table;
/// re-registering a type replaces its previous definition.
#[derive(Default)]
pub struct Catalog {
    entities: RwLock<HashMap<String, Arc<EntityDef>>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, replacing any previous definition.
    pub fn register(&self, def: EntityDef) {
        self.entities
            .write()
            .insert(def.name.clone(), Arc::new(def));
    }

    /// Look up the metadata for an entity type.
    pub fn entity(&self, entity_type: &str) -> Result<Arc<EntityDef>, Error> {
        self.entities
            .read()
            .get(entity_type)
            .cloned()
            .ok_or_else(|| Error::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }

    /// Check whether a type is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.read().contains_key(entity_type)
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Check whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
