//! In-memory entity representation.
//!
//! An [`Entity`] is a dynamic record: a type tag, a string identifier, a
//! field map, and named relation slots. Relation slots distinguish between
//! values that are loaded ([`RelationValue::One`] / [`RelationValue::Many`]),
//! deferred behind an explicit lazy handle ([`RelationValue::Lazy`]), and
//! absent.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Compute the deduplication identity for one traversal: `"{type}:{id}"`.
pub fn entity_key(entity_type: &str, id: &str) -> String {
    format!("{entity_type}:{id}")
}

/// Current time as microseconds since Unix epoch.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// An explicit lazy handle to a relation that has not been fetched.
///
/// This is an ordinary value: the fetch happens only when a loader is asked
/// to resolve it. It replaces property-interception proxies with plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyRef {
    /// Owning entity type.
    pub entity_type: String,
    /// Owning entity id.
    pub id: String,
    /// Relation property on the owning entity.
    pub relation: String,
}

impl LazyRef {
    /// Create a lazy handle for `relation` on `{entity_type}:{id}`.
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            relation: relation.into(),
        }
    }
}

/// The value held in one relation slot of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationValue {
    /// No related value set (or excluded by a circular-reference policy).
    Absent,
    /// A loaded to-one relation.
    One(Box<Entity>),
    /// A loaded to-many relation.
    Many(Vec<Entity>),
    /// A deferred relation behind an explicit lazy handle.
    Lazy(LazyRef),
}

impl RelationValue {
    /// Check whether this slot holds loaded entities.
    pub fn is_loaded(&self) -> bool {
        matches!(self, RelationValue::One(_) | RelationValue::Many(_))
    }

    /// Iterate the loaded entities in this slot, if any.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        let slice: &[Entity] = match self {
            RelationValue::One(e) => std::slice::from_ref(e),
            RelationValue::Many(es) => es,
            _ => &[],
        };
        slice.iter()
    }

    /// Number of loaded entities in this slot.
    pub fn len(&self) -> usize {
        match self {
            RelationValue::One(_) => 1,
            RelationValue::Many(es) => es.len(),
            _ => 0,
        }
    }

    /// Check whether the slot holds no loaded entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dynamic entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type tag, matching a catalog registration.
    pub entity_type: String,
    /// Entity identifier.
    pub id: String,
    /// Scalar fields by name.
    pub fields: BTreeMap<String, Value>,
    /// Relation slots by property name.
    pub relations: BTreeMap<String, RelationValue>,
    /// Soft-delete marker (microseconds since Unix epoch), if tombstoned.
    pub deleted_at: Option<i64>,
}

impl Entity {
    /// Create a new entity with no fields or relations.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
            deleted_at: None,
        }
    }

    /// Add a scalar field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a relation slot.
    pub fn with_relation(mut self, name: impl Into<String>, value: RelationValue) -> Self {
        self.relations.insert(name.into(), value);
        self
    }

    /// Attach a loaded to-one relation.
    pub fn with_one(self, name: impl Into<String>, related: Entity) -> Self {
        self.with_relation(name, RelationValue::One(Box::new(related)))
    }

    /// Attach a loaded to-many relation.
    pub fn with_many(self, name: impl Into<String>, related: Vec<Entity>) -> Self {
        self.with_relation(name, RelationValue::Many(related))
    }

    /// The entity's deduplication key `"{type}:{id}"`.
    pub fn key(&self) -> String {
        entity_key(&self.entity_type, &self.id)
    }

    /// Check whether this entity carries a soft-delete tombstone.
    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Get a field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a relation slot.
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    /// Replace a relation slot.
    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        self.relations.insert(name.into(), value);
    }

    /// Iterate all loaded related entities across every relation slot.
    pub fn related_entities(&self) -> impl Iterator<Item = &Entity> {
        self.relations.values().flat_map(|v| v.entities())
    }

    /// Entity keys of all loaded related entities, for dependency tracking.
    pub fn related_keys(&self) -> Vec<String> {
        self.related_entities().map(|e| e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_format() {
        let order = Entity::new("Order", "o1");
        assert_eq!(order.key(), "Order:o1");
        assert_eq!(entity_key("LineItem", "l2"), "LineItem:l2");
    }

    #[test]
    fn test_relation_slots() {
        let item = Entity::new("LineItem", "l1").with_field("qty", 3i64);
        let order = Entity::new("Order", "o1")
            .with_many("items", vec![item])
            .with_relation("customer", RelationValue::Absent);

        assert_eq!(order.relation("items").map(|r| r.len()), Some(1));
        assert!(order.relation("customer").is_some_and(|r| r.is_empty()));
        assert_eq!(order.related_keys(), vec!["LineItem:l1".to_string()]);
    }

    #[test]
    fn test_lazy_slot_not_loaded() {
        let slot = RelationValue::Lazy(LazyRef::new("Order", "o1", "items"));
        assert!(!slot.is_loaded());
        assert_eq!(slot.entities().count(), 0);
    }

    #[test]
    fn test_soft_delete_marker() {
        let mut e = Entity::new("Order", "o1");
        assert!(!e.is_soft_deleted());
        e.deleted_at = Some(current_timestamp());
        assert!(e.is_soft_deleted());
    }
}
