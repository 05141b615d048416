//! Cascade operation plan: build and order the step list.

use tracing::debug;

use crate::catalog::{Catalog, CascadeOp};
use crate::entity::Entity;
use crate::error::Error;

use super::walker::GraphWalker;

/// One step of a cascade plan: apply `op` to `entity`.
///
/// Steps reference the entities of one build call; the plan is transient and
/// discarded after execution.
#[derive(Debug)]
pub struct CascadeStep<'a> {
    /// The entity this step applies to.
    pub entity: &'a Entity,
    /// The operation to apply.
    pub op: CascadeOp,
    /// Execution order, derived from traversal depth.
    pub order: i32,
}

/// Execution order for an entity found at `depth`.
///
/// Inserts, updates, and recovers run parents first (`+depth`); removals run
/// children first (`-depth`).
pub fn calculate_order(op: CascadeOp, depth: usize) -> i32 {
    let depth = depth as i32;
    if op.is_removal() {
        -depth
    } else {
        depth
    }
}

/// Walk from `root` across relations that cascade `op`, producing one step
/// per distinct entity.
///
/// Cycles and diamonds are tolerated: the shared visited set guarantees each
/// entity key yields exactly one step. Relation values that are absent, lazy,
/// or whose element has no identifier are skipped. An unregistered entity
/// type anywhere in the walk aborts the build before any persistence call.
pub fn build_operation_graph<'a>(
    catalog: &Catalog,
    root: &'a Entity,
    op: CascadeOp,
) -> Result<Vec<CascadeStep<'a>>, Error> {
    let mut steps = Vec::new();
    let mut walker = GraphWalker::new();

    let select = |entity: &'a Entity| -> Result<Vec<&'a Entity>, Error> {
        let def = catalog.entity(&entity.entity_type)?;
        let mut related = Vec::new();
        for rel in def.cascading(op) {
            if let Some(value) = entity.relation(&rel.name) {
                for child in value.entities() {
                    if !child.id.is_empty() {
                        related.push(child);
                    }
                }
            }
        }
        Ok(related)
    };

    walker.walk(root, &select, &mut |entity, depth| {
        steps.push(CascadeStep {
            entity,
            op,
            order: calculate_order(op, depth),
        });
        Ok(())
    })?;

    debug!(
        op = %op,
        root = %root.key(),
        steps = steps.len(),
        "built cascade plan"
    );

    Ok(steps)
}

/// Sort steps ascending by order, tie-broken by entity type name.
///
/// The sort is stable, so equal-order steps of the same type keep their
/// traversal order.
pub fn sort_steps(steps: &mut [CascadeStep<'_>]) {
    steps.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.entity.entity_type.cmp(&b.entity.entity_type))
    });
}
