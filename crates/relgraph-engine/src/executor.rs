//! Cascade executor: apply an ordered operation plan transactionally.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relgraph_core::{
    build_operation_graph, current_timestamp, sort_steps, Catalog, CascadeOp, CascadeStep, Entity,
};

use crate::cache::RelationCache;
use crate::error::Error;
use crate::store::{EntityStore, StoreError};
use crate::txn::{Compensation, OperationLogEntry, TransactionContext};

/// Summary of a committed cascade.
#[derive(Debug, Default)]
pub struct CascadeReport {
    /// Log entries for the applied steps, in execution order.
    pub applied: Vec<OperationLogEntry>,
}

impl CascadeReport {
    /// Number of entities the cascade wrote.
    pub fn affected_count(&self) -> usize {
        self.applied.len()
    }
}

/// Executes cascade operations against a persistence collaborator.
///
/// Steps are applied strictly sequentially: later steps may depend on
/// identifiers established by earlier ones, so the ordering guarantee must
/// not be relaxed for parallelism.
pub struct CascadeExecutor {
    catalog: Arc<Catalog>,
    store: Arc<dyn EntityStore>,
    cache: Option<Arc<dyn RelationCache>>,
}

impl CascadeExecutor {
    /// Create an executor over a catalog and store.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            catalog,
            store,
            cache: None,
        }
    }

    /// Attach a relation cache; committed cascades invalidate the keys of
    /// every entity they wrote.
    pub fn with_cache(mut self, cache: Arc<dyn RelationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Open a transaction and wrap it in a fresh context.
    pub fn create_transaction_context(&self) -> Result<TransactionContext<'_>, Error> {
        Ok(TransactionContext::new(self.store.begin()?))
    }

    /// Build, order, and apply the cascade plan for `op` rooted at `root`,
    /// inside the given context.
    ///
    /// On a step failure, all compensations recorded so far run in reverse
    /// order and the original error is returned; compensation failures are
    /// logged and never replace it.
    pub fn execute_operation(
        &self,
        op: CascadeOp,
        root: &Entity,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<(), Error> {
        let mut steps = build_operation_graph(&self.catalog, root, op)?;
        sort_steps(&mut steps);
        debug!(op = %op, root = %root.key(), steps = steps.len(), "executing cascade plan");

        for step in &steps {
            if let Err(error) = self.apply_step(step, ctx) {
                let attempted = ctx.run_compensations();
                warn!(
                    error = %error,
                    compensations = attempted,
                    "cascade step failed; compensated prior steps"
                );
                return Err(error);
            }
        }
        Ok(())
    }

    fn apply_step(
        &self,
        step: &CascadeStep<'_>,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<(), Error> {
        let entity = step.entity;
        let entity_type = entity.entity_type.clone();
        let entity_id = entity.id.clone();

        let compensation = match step.op {
            CascadeOp::Insert => {
                ctx.tx()
                    .insert(entity)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                Some(Compensation::DeleteInserted {
                    entity_type: entity_type.clone(),
                    id: entity_id.clone(),
                })
            }
            CascadeOp::Update => {
                let previous = ctx
                    .tx()
                    .find_one(&entity_type, &entity_id, true)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                ctx.tx()
                    .save(entity)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                Some(match previous {
                    Some(previous) => Compensation::RestoreSnapshot(previous),
                    // Updating an entity that did not exist amounts to an
                    // insert; undo it the same way.
                    None => Compensation::DeleteInserted {
                        entity_type: entity_type.clone(),
                        id: entity_id.clone(),
                    },
                })
            }
            CascadeOp::Remove => {
                let previous = ctx
                    .tx()
                    .find_one(&entity_type, &entity_id, true)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                ctx.tx()
                    .delete(&entity_type, &entity_id)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                previous.map(Compensation::Reinsert)
            }
            CascadeOp::SoftRemove => {
                let mut marked = entity.clone();
                marked.deleted_at = Some(current_timestamp());
                ctx.tx()
                    .save(&marked)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                Some(Compensation::ClearSoftDelete {
                    entity_type: entity_type.clone(),
                    id: entity_id.clone(),
                })
            }
            CascadeOp::Recover => {
                let previous = ctx
                    .tx()
                    .find_one(&entity_type, &entity_id, true)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                ctx.tx()
                    .restore(&entity_type, &entity_id)
                    .map_err(|source| exec_error(step.op, entity, source))?;
                previous
                    .filter(|p| p.is_soft_deleted())
                    .map(Compensation::ReapplySoftDelete)
            }
        };

        debug!(op = %step.op, entity = %entity.key(), order = step.order, "applied cascade step");
        ctx.record(
            OperationLogEntry {
                op: step.op,
                entity_type,
                entity_id,
                data: entity.fields.clone(),
                dependencies: entity.related_keys(),
            },
            compensation,
        );
        Ok(())
    }

    /// Commit the context's transaction and invalidate cache keys for every
    /// written entity. Committing a context with zero operations is a no-op
    /// success.
    pub fn commit_transaction(&self, ctx: TransactionContext<'_>) -> Result<(), Error> {
        let applied = ctx.operations().to_vec();
        ctx.commit()?;

        if let Some(cache) = &self.cache {
            for entry in &applied {
                cache.invalidate_entity(&entry.entity_type, &entry.entity_id);
            }
        }
        info!(operations = applied.len(), "cascade transaction committed");
        Ok(())
    }

    /// Roll back the context's transaction, then defensively run any
    /// compensations not yet executed.
    ///
    /// The sweep is redundant when the whole cascade ran inside this one
    /// transaction, but it is what keeps callers correct when they compose
    /// several independently committed contexts.
    pub fn rollback_transaction(&self, ctx: TransactionContext<'_>) -> Result<(), Error> {
        let attempted = ctx.rollback()?;
        info!(compensations = attempted, "cascade transaction rolled back");
        Ok(())
    }

    /// Run one complete cascade: create a context, execute, commit on
    /// success, roll back on failure. The context is always released.
    pub fn execute_cascade(&self, op: CascadeOp, root: &Entity) -> Result<CascadeReport, Error> {
        let mut ctx = self.create_transaction_context()?;
        match self.execute_operation(op, root, &mut ctx) {
            Ok(()) => {
                let report = CascadeReport {
                    applied: ctx.operations().to_vec(),
                };
                self.commit_transaction(ctx)?;
                Ok(report)
            }
            Err(error) => {
                if let Err(rollback_error) = self.rollback_transaction(ctx) {
                    warn!(error = %rollback_error, "rollback after failed cascade also failed");
                }
                Err(error)
            }
        }
    }
}

fn exec_error(op: CascadeOp, entity: &Entity, source: StoreError) -> Error {
    Error::Execution {
        op,
        entity_type: entity.entity_type.clone(),
        entity_id: entity.id.clone(),
        source,
    }
}
