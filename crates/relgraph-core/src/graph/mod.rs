//! Graph traversal and cascade plan construction.

mod plan;
mod walker;

pub use plan::{build_operation_graph, calculate_order, sort_steps, CascadeStep};
pub use walker::{GraphWalker, MAX_TRAVERSAL_DEPTH};
