//! Core error types.

use thiserror::Error;

/// Errors raised by the catalog and graph builder.
#[derive(Debug, Error)]
pub enum Error {
    /// An entity type was never registered in the catalog.
    ///
    /// Raised while walking relationships, before any persistence call.
    #[error("unknown entity type: {entity_type}")]
    UnknownEntityType {
        /// The unregistered type tag.
        entity_type: String,
    },

    /// Traversal exceeded the recursion cap.
    #[error("maximum traversal depth exceeded: {depth}")]
    MaxDepthExceeded {
        /// Depth at which the cap was hit.
        depth: usize,
    },
}
