//! Relationship metadata registry.
//!
//! Entity types and their relations are described by [`EntityDef`] and
//! [`RelationDef`] and registered once at startup in a [`Catalog`].

mod catalog;
mod entity;
mod relation;

pub use catalog::Catalog;
pub use entity::EntityDef;
pub use relation::{CascadeOp, CascadeSet, RelationDef, RelationKind};
