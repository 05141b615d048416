//! Persistence collaborator interfaces.
//!
//! The engine never talks to a storage backend directly; it consumes these
//! traits. [`EntityStore`] is the ambient store surface, [`StoreTransaction`]
//! is the same surface scoped to one transaction. The relation-fetch
//! operations exist for the loader: populating relation slots needs a read
//! path keyed by `(entity type, id, relation)`, and the batch variant must be
//! a single grouped fetch for N identifiers.

use std::collections::HashMap;

use thiserror::Error;

use relgraph_core::{Entity, RelationValue};

/// Failures surfaced by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the given identity.
    #[error("entity not found: {entity_type}:{id}")]
    NotFound {
        /// Entity type.
        entity_type: String,
        /// Entity id.
        id: String,
    },

    /// An insert collided with an existing live entity.
    #[error("duplicate entity id: {entity_type}:{id}")]
    Duplicate {
        /// Entity type.
        entity_type: String,
        /// Entity id.
        id: String,
    },

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// The persistence collaborator.
pub trait EntityStore: Send + Sync {
    /// Save an entity (insert or overwrite).
    fn save(&self, entity: &Entity) -> Result<(), StoreError>;

    /// Hard-delete an entity.
    fn delete(&self, entity_type: &str, id: &str) -> Result<(), StoreError>;

    /// Clear an entity's soft-delete marker.
    fn restore(&self, entity_type: &str, id: &str) -> Result<(), StoreError>;

    /// Fetch one entity by identity.
    fn find_one(
        &self,
        entity_type: &str,
        id: &str,
        include_soft_deleted: bool,
    ) -> Result<Option<Entity>, StoreError>;

    /// Fetch the value of one relation on one entity.
    fn find_related(
        &self,
        entity_type: &str,
        id: &str,
        relation: &str,
    ) -> Result<RelationValue, StoreError>;

    /// Fetch one relation for many same-type entities in a single grouped
    /// call, keyed by the given identifiers.
    fn find_related_batch(
        &self,
        entity_type: &str,
        ids: &[String],
        relation: &str,
    ) -> Result<HashMap<String, RelationValue>, StoreError>;

    /// Open a transaction scoped to this store.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;
}

/// The four write-path operations scoped to one transaction, plus commit and
/// rollback. One handle is exclusively owned by one in-flight cascade.
pub trait StoreTransaction {
    /// Insert a new entity; fails with [`StoreError::Duplicate`] if a live
    /// entity with the same identity exists.
    fn insert(&mut self, entity: &Entity) -> Result<(), StoreError>;

    /// Save an entity (insert or overwrite).
    fn save(&mut self, entity: &Entity) -> Result<(), StoreError>;

    /// Hard-delete an entity.
    fn delete(&mut self, entity_type: &str, id: &str) -> Result<(), StoreError>;

    /// Clear an entity's soft-delete marker.
    fn restore(&mut self, entity_type: &str, id: &str) -> Result<(), StoreError>;

    /// Fetch one entity by identity, observing this transaction's writes.
    fn find_one(
        &self,
        entity_type: &str,
        id: &str,
        include_soft_deleted: bool,
    ) -> Result<Option<Entity>, StoreError>;

    /// Commit the transaction. Committing with zero operations is a no-op
    /// success.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll the transaction back, reverting its writes.
    fn rollback(&mut self) -> Result<(), StoreError>;
}
