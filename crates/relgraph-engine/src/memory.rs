//! In-process reference implementation of the store traits.
//!
//! `MemoryStore` keeps entities in a concurrent map keyed by entity key and
//! records relation edges whenever an entity is saved with loaded relation
//! slots. Transactions are write-through with an undo log: writes become
//! visible immediately (so later cascade steps can observe earlier ones) and
//! `rollback` reverts them. This trades isolation for simplicity, which is
//! acceptable for a reference backend and for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use relgraph_core::{entity_key, Catalog, Entity, RelationValue};

use crate::store::{EntityStore, StoreError, StoreTransaction};

/// In-memory entity store.
pub struct MemoryStore {
    catalog: Arc<Catalog>,
    /// Live and tombstoned entities by entity key.
    entities: DashMap<String, Entity>,
    /// Relation edges: `"{parent_key}/{relation}"` to ordered child keys.
    edges: DashMap<String, Vec<String>>,
    /// Number of grouped relation fetches issued.
    grouped_fetches: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store over the given catalog.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            entities: DashMap::new(),
            edges: DashMap::new(),
            grouped_fetches: AtomicU64::new(0),
        }
    }

    /// How many grouped relation fetches have been issued.
    pub fn grouped_fetch_count(&self) -> u64 {
        self.grouped_fetches.load(Ordering::Relaxed)
    }

    /// Number of stored entities, tombstoned included.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn edge_key(parent_key: &str, relation: &str) -> String {
        format!("{parent_key}/{relation}")
    }

    /// Write an entity: record edges for loaded relation slots, then store a
    /// copy with the slots stripped (relations are views, not stored state).
    fn apply_save(&self, entity: &Entity) {
        let key = entity.key();
        for (relation, value) in &entity.relations {
            if value.is_loaded() {
                let children: Vec<String> = value.entities().map(|e| e.key()).collect();
                self.edges.insert(Self::edge_key(&key, relation), children);
            }
        }
        let mut stored = entity.clone();
        stored.relations.clear();
        self.entities.insert(key, stored);
    }

    fn live_entity(&self, key: &str) -> Option<Entity> {
        self.entities
            .get(key)
            .filter(|e| !e.is_soft_deleted())
            .map(|e| e.clone())
    }

    fn fetch_relation(
        &self,
        entity_type: &str,
        id: &str,
        relation: &str,
    ) -> Result<RelationValue, StoreError> {
        let def = self
            .catalog
            .entity(entity_type)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let rel = def.relation(relation).ok_or_else(|| {
            StoreError::Backend(format!("unknown relation {relation} on {entity_type}"))
        })?;

        let parent_key = entity_key(entity_type, id);
        let children: Vec<Entity> = self
            .edges
            .get(&Self::edge_key(&parent_key, relation))
            .map(|keys| keys.iter().filter_map(|k| self.live_entity(k)).collect())
            .unwrap_or_default();

        if rel.kind.is_to_one() {
            Ok(children
                .into_iter()
                .next()
                .map(|e| RelationValue::One(Box::new(e)))
                .unwrap_or(RelationValue::Absent))
        } else {
            Ok(RelationValue::Many(children))
        }
    }
}

impl EntityStore for MemoryStore {
    fn save(&self, entity: &Entity) -> Result<(), StoreError> {
        self.apply_save(entity);
        Ok(())
    }

    fn delete(&self, entity_type: &str, id: &str) -> Result<(), StoreError> {
        let key = entity_key(entity_type, id);
        self.entities
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            })
    }

    fn restore(&self, entity_type: &str, id: &str) -> Result<(), StoreError> {
        let key = entity_key(entity_type, id);
        match self.entities.get_mut(&key) {
            Some(mut entry) => {
                entry.deleted_at = None;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn find_one(
        &self,
        entity_type: &str,
        id: &str,
        include_soft_deleted: bool,
    ) -> Result<Option<Entity>, StoreError> {
        let key = entity_key(entity_type, id);
        Ok(self
            .entities
            .get(&key)
            .filter(|e| include_soft_deleted || !e.is_soft_deleted())
            .map(|e| e.clone()))
    }

    fn find_related(
        &self,
        entity_type: &str,
        id: &str,
        relation: &str,
    ) -> Result<RelationValue, StoreError> {
        self.fetch_relation(entity_type, id, relation)
    }

    fn find_related_batch(
        &self,
        entity_type: &str,
        ids: &[String],
        relation: &str,
    ) -> Result<HashMap<String, RelationValue>, StoreError> {
        self.grouped_fetches.fetch_add(1, Ordering::Relaxed);
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            out.insert(id.clone(), self.fetch_relation(entity_type, id, relation)?);
        }
        Ok(out)
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        Ok(Box::new(MemoryTransaction::new(self)))
    }
}

/// Inverse of one transactional write, captured before the write applies.
enum UndoOp {
    /// Restore a previous entity record.
    Put { key: String, entity: Entity },
    /// Remove a record that did not exist before.
    Remove { key: String },
    /// Restore a previous edge list (`None` removes the list).
    Edges {
        key: String,
        children: Option<Vec<String>>,
    },
}

/// Write-through transaction over a [`MemoryStore`].
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    undo: Vec<UndoOp>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            undo: Vec::new(),
        }
    }

    fn capture(&mut self, key: &str) {
        match self.store.entities.get(key) {
            Some(entry) => self.undo.push(UndoOp::Put {
                key: key.to_string(),
                entity: entry.clone(),
            }),
            None => self.undo.push(UndoOp::Remove {
                key: key.to_string(),
            }),
        }
    }

    fn capture_edges(&mut self, entity: &Entity) {
        let parent_key = entity.key();
        for (relation, value) in &entity.relations {
            if value.is_loaded() {
                let edge_key = MemoryStore::edge_key(&parent_key, relation);
                let children = self.store.edges.get(&edge_key).map(|c| c.clone());
                self.undo.push(UndoOp::Edges {
                    key: edge_key,
                    children,
                });
            }
        }
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert(&mut self, entity: &Entity) -> Result<(), StoreError> {
        let key = entity.key();
        if self.store.live_entity(&key).is_some() {
            return Err(StoreError::Duplicate {
                entity_type: entity.entity_type.clone(),
                id: entity.id.clone(),
            });
        }
        self.capture(&key);
        self.capture_edges(entity);
        self.store.apply_save(entity);
        Ok(())
    }

    fn save(&mut self, entity: &Entity) -> Result<(), StoreError> {
        self.capture(&entity.key());
        self.capture_edges(entity);
        self.store.apply_save(entity);
        Ok(())
    }

    fn delete(&mut self, entity_type: &str, id: &str) -> Result<(), StoreError> {
        let key = entity_key(entity_type, id);
        self.capture(&key);
        if self.store.entities.remove(&key).is_none() {
            self.undo.pop();
            return Err(StoreError::NotFound {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn restore(&mut self, entity_type: &str, id: &str) -> Result<(), StoreError> {
        let key = entity_key(entity_type, id);
        self.capture(&key);
        match self.store.entities.get_mut(&key) {
            Some(mut entry) => {
                entry.deleted_at = None;
                Ok(())
            }
            None => {
                self.undo.pop();
                Err(StoreError::NotFound {
                    entity_type: entity_type.to_string(),
                    id: id.to_string(),
                })
            }
        }
    }

    fn find_one(
        &self,
        entity_type: &str,
        id: &str,
        include_soft_deleted: bool,
    ) -> Result<Option<Entity>, StoreError> {
        self.store.find_one(entity_type, id, include_soft_deleted)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.undo.clear();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        while let Some(op) = self.undo.pop() {
            match op {
                UndoOp::Put { key, entity } => {
                    self.store.entities.insert(key, entity);
                }
                UndoOp::Remove { key } => {
                    self.store.entities.remove(&key);
                }
                UndoOp::Edges { key, children } => match children {
                    Some(children) => {
                        self.store.edges.insert(key, children);
                    }
                    None => {
                        self.store.edges.remove(&key);
                    }
                },
            }
        }
        Ok(())
    }
}
