//! relgraph-engine - Cascade execution and relationship loading.
//!
//! This crate drives the plans built by `relgraph-core` against a
//! persistence collaborator: the [`CascadeExecutor`] applies write
//! operations transactionally with compensating actions, and the
//! [`RelationLoader`] populates relation slots with eager, lazy, smart, or
//! batch strategies backed by an optional [`RelationCache`]. A reference
//! in-memory backend, [`MemoryStore`], implements the store traits.

pub mod cache;
pub mod error;
pub mod executor;
pub mod loader;
pub mod memory;
pub mod store;
pub mod txn;

pub use cache::{
    cache_key, CacheConfig, CacheStats, CachedValue, EvictionPolicy, MemoryRelationCache,
    RelationCache,
};
pub use error::Error;
pub use executor::{CascadeExecutor, CascadeReport};
pub use loader::{CircularGuard, CircularPolicy, LoadConfig, LoadStrategy, RelationLoader};
pub use memory::{MemoryStore, MemoryTransaction};
pub use store::{EntityStore, StoreError, StoreTransaction};
pub use txn::{Compensation, OperationLogEntry, TransactionContext};
