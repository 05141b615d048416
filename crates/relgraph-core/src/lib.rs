//! relgraph-core - Entity model, relationship catalog, and cascade graph.
//!
//! This crate holds the pure, storage-free half of the relgraph engine: the
//! dynamic [`Entity`] model, the relationship metadata [`Catalog`], and the
//! cascade plan builder that turns a root entity plus an operation into an
//! ordered step list.

pub mod catalog;
pub mod entity;
pub mod error;
pub mod graph;
pub mod value;

pub use catalog::{Catalog, CascadeOp, CascadeSet, EntityDef, RelationDef, RelationKind};
pub use entity::{current_timestamp, entity_key, Entity, LazyRef, RelationValue};
pub use error::Error;
pub use graph::{build_operation_graph, calculate_order, sort_steps, CascadeStep, GraphWalker};
pub use value::Value;
