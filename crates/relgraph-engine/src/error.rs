//! Engine error types.

use thiserror::Error;

use relgraph_core::CascadeOp;

use crate::store::StoreError;

/// Errors raised by the cascade executor and relationship loader.
#[derive(Debug, Error)]
pub enum Error {
    /// Plan construction failed before any persistence call.
    #[error("graph build failed: {0}")]
    Graph(#[from] relgraph_core::Error),

    /// The persistence collaborator failed while applying one step.
    ///
    /// Prior steps have been compensated in reverse order by the time this
    /// reaches the caller.
    #[error("{op} failed for {entity_type}:{entity_id}: {source}")]
    Execution {
        /// Operation being applied.
        op: CascadeOp,
        /// Failing entity type.
        entity_type: String,
        /// Failing entity id.
        entity_id: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A store failure outside step application (begin/commit/rollback/read).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A batch-load call was given an unusable input set.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}
