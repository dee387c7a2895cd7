//! Rollback manager
//!
//! Holds one transaction per component id. A transaction is opened before a
//! component's first side effect and closed exactly once, either by commit
//! (the undo log is discarded) or by rollback (the undo log is replayed in
//! reverse and kept so a failed unwind can be retried).

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{TransactionError, TransactionState};
use crate::scope::TransactionScope;
use crate::transaction::{RollbackOutcome, Transaction, TransactionRecord};
use crate::undo::UndoOperation;

#[derive(Debug, Default)]
pub struct RollbackManager {
    open: HashMap<String, Transaction>,
    /// Most recently closed transaction per id.
    closed: HashMap<String, Transaction>,
    history: Vec<TransactionRecord>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction for `component_id`.
    ///
    /// # Errors
    ///
    /// [`TransactionError::AlreadyOpen`] if one is open for that id.
    pub fn start_transaction(&mut self, component_id: &str) -> Result<(), TransactionError> {
        if self.open.contains_key(component_id) {
            return Err(TransactionError::AlreadyOpen {
                component_id: component_id.to_string(),
            });
        }
        tracing::debug!(component = %component_id, "Transaction started");
        self.open
            .insert(component_id.to_string(), Transaction::open(component_id));
        Ok(())
    }

    /// Push an undo operation onto the open transaction's stack.
    ///
    /// The caller must capture the state the operation restores before
    /// performing the forward action.
    pub fn register_action(
        &mut self,
        component_id: &str,
        operation: Box<dyn UndoOperation>,
    ) -> Result<(), TransactionError> {
        let transaction = self.open_transaction(component_id)?;
        tracing::trace!(
            component = %component_id,
            step = transaction.operations.len(),
            kind = %operation.kind(),
            description = %operation.describe(),
            "Undo action registered"
        );
        transaction.operations.push(operation);
        Ok(())
    }

    /// Close the transaction as successful and drop its undo log.
    pub fn commit_transaction(&mut self, component_id: &str) -> Result<(), TransactionError> {
        self.open_transaction(component_id)?;
        let Some(mut transaction) = self.open.remove(component_id) else {
            return Err(self.not_open(component_id));
        };
        tracing::info!(
            component = %component_id,
            actions = transaction.operations.len(),
            "Transaction committed"
        );
        let registered = transaction.operations.len();
        transaction.operations.clear();
        transaction.state = TransactionState::Committed;
        self.close(transaction, registered);
        Ok(())
    }

    /// Undo everything registered for `component_id`, newest first.
    ///
    /// Individual undo failures do not stop the unwind; they are reported in
    /// the returned outcome.
    pub fn trigger_rollback(&mut self, component_id: &str) -> Result<RollbackOutcome, TransactionError> {
        self.open_transaction(component_id)?;
        let Some(mut transaction) = self.open.remove(component_id) else {
            return Err(self.not_open(component_id));
        };
        tracing::info!(
            component = %component_id,
            actions = transaction.operations.len(),
            "Rolling back transaction"
        );
        let outcome = transaction.unwind();
        log_outcome(&outcome);
        transaction.state = TransactionState::RolledBack;
        transaction.last_rollback = Some(outcome.clone());
        let registered = transaction.operations.len();
        self.close(transaction, registered);
        Ok(outcome)
    }

    /// Replay the undo log of a rolled-back transaction whose unwind had
    /// failures. A clean rollback is not replayed; its outcome is returned.
    pub fn retry_rollback(&mut self, component_id: &str) -> Result<RollbackOutcome, TransactionError> {
        let Some(transaction) = self.closed.get_mut(component_id) else {
            return Err(TransactionError::NotRolledBack {
                component_id: component_id.to_string(),
            });
        };
        let previous = match (&transaction.state, &transaction.last_rollback) {
            (TransactionState::RolledBack, Some(outcome)) => outcome,
            _ => {
                return Err(TransactionError::NotRolledBack {
                    component_id: component_id.to_string(),
                });
            }
        };
        if previous.is_clean() {
            return Ok(previous.clone());
        }

        tracing::info!(component = %component_id, "Retrying rollback");
        let outcome = transaction.unwind();
        log_outcome(&outcome);
        transaction.last_rollback = Some(outcome.clone());
        if let Some(record) = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.component_id == component_id)
        {
            record.rollback = Some(outcome.clone());
        }
        Ok(outcome)
    }

    /// A scope for performing forward actions inside the open transaction.
    pub fn scope(&mut self, component_id: &str) -> Result<TransactionScope<'_>, TransactionError> {
        self.open_transaction(component_id)?;
        Ok(TransactionScope::new(self, component_id))
    }

    pub fn is_open(&self, component_id: &str) -> bool {
        self.open.contains_key(component_id)
    }

    /// State of the current or most recent transaction for `component_id`.
    pub fn state(&self, component_id: &str) -> Option<TransactionState> {
        self.open
            .get(component_id)
            .or_else(|| self.closed.get(component_id))
            .map(Transaction::state)
    }

    /// Number of undo operations registered on the open transaction.
    pub fn pending_actions(&self, component_id: &str) -> usize {
        self.open
            .get(component_id)
            .map(|t| t.operations.len())
            .unwrap_or(0)
    }

    /// Closed transactions, oldest first.
    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    fn open_transaction(&mut self, component_id: &str) -> Result<&mut Transaction, TransactionError> {
        if !self.open.contains_key(component_id) {
            return Err(self.not_open(component_id));
        }
        self.open
            .get_mut(component_id)
            .ok_or_else(|| TransactionError::NotOpen {
                component_id: component_id.to_string(),
            })
    }

    fn not_open(&self, component_id: &str) -> TransactionError {
        match self.closed.get(component_id) {
            Some(closed) => TransactionError::AlreadyClosed {
                component_id: component_id.to_string(),
                state: closed.state,
            },
            None => TransactionError::NotOpen {
                component_id: component_id.to_string(),
            },
        }
    }

    fn close(&mut self, transaction: Transaction, registered: usize) {
        self.history.push(TransactionRecord {
            component_id: transaction.component_id.clone(),
            state: transaction.state,
            operations: registered,
            started_at: transaction.started_at,
            closed_at: Utc::now(),
            rollback: transaction.last_rollback.clone(),
        });
        self.closed.insert(transaction.component_id.clone(), transaction);
    }
}

fn log_outcome(outcome: &RollbackOutcome) {
    let failed = outcome.failed().count();
    if failed == 0 {
        tracing::info!(component = %outcome.component_id, steps = outcome.steps.len(), "Rollback complete");
    } else {
        tracing::error!(
            component = %outcome.component_id,
            steps = outcome.steps.len(),
            failed,
            "Rollback finished with failed undo steps"
        );
    }
}
