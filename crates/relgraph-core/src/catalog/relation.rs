//! Relation descriptors between entity types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cardinality of a relation, seen from the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// One-to-one relation.
    OneToOne,
    /// Many-to-one relation (foreign key on this side).
    ManyToOne,
    /// One-to-many relation (foreign key on the far side).
    OneToMany,
    /// Many-to-many relation.
    ManyToMany,
}

impl RelationKind {
    /// Check if this relation points at a single entity.
    pub fn is_to_one(&self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }

    /// Check if this relation points at a collection.
    pub fn is_to_many(&self) -> bool {
        !self.is_to_one()
    }
}

/// A write operation that can propagate across relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadeOp {
    /// Insert a new entity.
    Insert,
    /// Update an existing entity.
    Update,
    /// Hard-remove an entity.
    Remove,
    /// Tombstone an entity, keeping its record.
    SoftRemove,
    /// Clear a soft-remove tombstone.
    Recover,
}

impl CascadeOp {
    /// Check if this operation removes entities.
    ///
    /// Removal operations execute children before parents; everything else
    /// executes parents first.
    pub fn is_removal(&self) -> bool {
        matches!(self, CascadeOp::Remove | CascadeOp::SoftRemove)
    }
}

impl fmt::Display for CascadeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CascadeOp::Insert => "insert",
            CascadeOp::Update => "update",
            CascadeOp::Remove => "remove",
            CascadeOp::SoftRemove => "soft-remove",
            CascadeOp::Recover => "recover",
        };
        f.write_str(s)
    }
}

/// The set of operations a relation propagates.
///
/// Either the wildcard (every operation cascades) or an explicit list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CascadeSet {
    all: bool,
    ops: Vec<CascadeOp>,
}

impl CascadeSet {
    /// No operations cascade.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every operation cascades (the wildcard).
    pub fn all() -> Self {
        Self {
            all: true,
            ops: Vec::new(),
        }
    }

    /// Only the listed operations cascade.
    pub fn only(ops: impl IntoIterator<Item = CascadeOp>) -> Self {
        Self {
            all: false,
            ops: ops.into_iter().collect(),
        }
    }

    /// Check whether `op` propagates across the relation.
    pub fn contains(&self, op: CascadeOp) -> bool {
        self.all || self.ops.contains(&op)
    }
}

/// A relation declared on an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation property name (unique within the owning entity).
    pub name: String,
    /// Relation cardinality.
    pub kind: RelationKind,
    /// Target entity type.
    pub target: String,
    /// Which cascade operations propagate across this relation.
    pub cascades: CascadeSet,
}

impl RelationDef {
    /// Create a relation with no cascades.
    pub fn new(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            cascades: CascadeSet::none(),
        }
    }

    /// Create a one-to-one relation.
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToOne, target)
    }

    /// Create a many-to-one relation.
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToOne, target)
    }

    /// Create a one-to-many relation.
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToMany, target)
    }

    /// Create a many-to-many relation.
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToMany, target)
    }

    /// Set the cascade set.
    pub fn with_cascades(mut self, cascades: CascadeSet) -> Self {
        self.cascades = cascades;
        self
    }

    /// Cascade every operation across this relation.
    pub fn cascade_all(self) -> Self {
        self.with_cascades(CascadeSet::all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kinds() {
        assert!(RelationKind::OneToOne.is_to_one());
        assert!(RelationKind::ManyToOne.is_to_one());
        assert!(RelationKind::OneToMany.is_to_many());
        assert!(RelationKind::ManyToMany.is_to_many());
    }

    #[test]
    fn test_cascade_set_wildcard() {
        let set = CascadeSet::all();
        assert!(set.contains(CascadeOp::Insert));
        assert!(set.contains(CascadeOp::Recover));
    }

    #[test]
    fn test_cascade_set_explicit() {
        let set = CascadeSet::only([CascadeOp::Insert, CascadeOp::Remove]);
        assert!(set.contains(CascadeOp::Insert));
        assert!(set.contains(CascadeOp::Remove));
        assert!(!set.contains(CascadeOp::Update));

        assert!(!CascadeSet::none().contains(CascadeOp::Insert));
    }

    #[test]
    fn test_relation_builders() {
        let rel = RelationDef::one_to_many("items", "LineItem").cascade_all();
        assert_eq!(rel.kind, RelationKind::OneToMany);
        assert_eq!(rel.target, "LineItem");
        assert!(rel.cascades.contains(CascadeOp::SoftRemove));
    }

    #[test]
    fn test_removal_ops() {
        assert!(CascadeOp::Remove.is_removal());
        assert!(CascadeOp::SoftRemove.is_removal());
        assert!(!CascadeOp::Insert.is_removal());
        assert!(!CascadeOp::Recover.is_removal());
    }
}
