//! Transaction context with compensating actions.
//!
//! A [`TransactionContext`] exclusively owns one store transaction for the
//! lifetime of one top-level cascade. Every applied step appends an
//! [`OperationLogEntry`] and pushes a [`Compensation`] capturing enough
//! pre-state to undo that step. Compensations are plain data rather than
//! closures, so they can be inspected and logged.

use std::collections::BTreeMap;

use tracing::warn;

use relgraph_core::{CascadeOp, Entity, Value};

use crate::store::{StoreError, StoreTransaction};

/// One entry of the append-only cascade operations log.
#[derive(Debug, Clone)]
pub struct OperationLogEntry {
    /// Operation applied.
    pub op: CascadeOp,
    /// Entity type written.
    pub entity_type: String,
    /// Entity id written.
    pub entity_id: String,
    /// Field data the step wrote, so the log is replayable.
    pub data: BTreeMap<String, Value>,
    /// Entity keys of the loaded relations on the written entity.
    pub dependencies: Vec<String>,
}

/// The inverse of one applied cascade step.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Undo an insert by deleting the inserted entity.
    DeleteInserted {
        /// Entity type.
        entity_type: String,
        /// Entity id.
        id: String,
    },
    /// Undo an update by re-saving the captured previous snapshot.
    RestoreSnapshot(Entity),
    /// Undo a remove by re-inserting the captured snapshot.
    Reinsert(Entity),
    /// Undo a soft-remove by clearing the deletion marker.
    ClearSoftDelete {
        /// Entity type.
        entity_type: String,
        /// Entity id.
        id: String,
    },
    /// Undo a recover by re-saving the tombstoned snapshot.
    ReapplySoftDelete(Entity),
}

impl Compensation {
    /// The entity this compensation targets.
    pub fn target(&self) -> (&str, &str) {
        match self {
            Compensation::DeleteInserted { entity_type, id }
            | Compensation::ClearSoftDelete { entity_type, id } => (entity_type, id),
            Compensation::RestoreSnapshot(e)
            | Compensation::Reinsert(e)
            | Compensation::ReapplySoftDelete(e) => (&e.entity_type, &e.id),
        }
    }

    fn apply(&self, tx: &mut dyn StoreTransaction) -> Result<(), StoreError> {
        match self {
            Compensation::DeleteInserted { entity_type, id } => tx.delete(entity_type, id),
            Compensation::RestoreSnapshot(e) => tx.save(e),
            Compensation::Reinsert(e) => tx.save(e),
            Compensation::ClearSoftDelete { entity_type, id } => tx.restore(entity_type, id),
            Compensation::ReapplySoftDelete(e) => tx.save(e),
        }
    }
}

/// State of one in-flight cascade: the owned transaction handle, the
/// operations log, and the compensation stack.
///
/// Created per top-level cascade invocation and consumed by commit or
/// rollback; never reused.
pub struct TransactionContext<'a> {
    tx: Box<dyn StoreTransaction + 'a>,
    log: Vec<OperationLogEntry>,
    compensations: Vec<Compensation>,
}

impl<'a> TransactionContext<'a> {
    pub(crate) fn new(tx: Box<dyn StoreTransaction + 'a>) -> Self {
        Self {
            tx,
            log: Vec::new(),
            compensations: Vec::new(),
        }
    }

    /// The operations applied so far.
    pub fn operations(&self) -> &[OperationLogEntry] {
        &self.log
    }

    /// Number of compensations not yet executed.
    pub fn pending_compensations(&self) -> usize {
        self.compensations.len()
    }

    pub(crate) fn tx(&mut self) -> &mut dyn StoreTransaction {
        self.tx.as_mut()
    }

    pub(crate) fn record(&mut self, entry: OperationLogEntry, compensation: Option<Compensation>) {
        self.log.push(entry);
        if let Some(compensation) = compensation {
            self.compensations.push(compensation);
        }
    }

    /// Run all pending compensations, most recent first.
    ///
    /// A failing compensation is logged and skipped so the remaining ones
    /// still run; it never masks the error that triggered the rollback.
    /// Returns the number of compensations attempted. Executed compensations
    /// are drained, so a later defensive sweep only covers the remainder.
    pub(crate) fn run_compensations(&mut self) -> usize {
        let mut attempted = 0;
        while let Some(compensation) = self.compensations.pop() {
            attempted += 1;
            let (entity_type, id) = compensation.target();
            if let Err(error) = compensation.apply(self.tx.as_mut()) {
                warn!(
                    entity_type,
                    id,
                    error = %error,
                    "compensating action failed; continuing with remaining compensations"
                );
            }
        }
        attempted
    }

    /// Commit the owned transaction and release the context.
    pub(crate) fn commit(mut self) -> Result<(), StoreError> {
        self.tx.commit()
    }

    /// Roll back the owned transaction, then defensively run any
    /// compensations not yet executed. Returns the number attempted.
    pub(crate) fn rollback(mut self) -> Result<usize, StoreError> {
        self.tx.rollback()?;
        Ok(self.run_compensations())
    }
}
