//! Entity type definitions.

use serde::{Deserialize, Serialize};

use super::relation::{CascadeOp, RelationDef};

/// The relationship metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity type name (unique within the catalog).
    pub name: String,
    /// Declared relations.
    pub relations: Vec<RelationDef>,
}

impl EntityDef {
    /// Create an entity definition with no relations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relations: Vec::new(),
        }
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up a relation by property name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Relations across which `op` propagates.
    pub fn cascading(&self, op: CascadeOp) -> impl Iterator<Item = &RelationDef> {
        self.relations.iter().filter(move |r| r.cascades.contains(op))
    }
}
