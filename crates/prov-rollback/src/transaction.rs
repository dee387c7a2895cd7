//! Transactions and rollback outcomes

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{RollbackError, TransactionState};
use crate::undo::{UndoKind, UndoOperation};

/// The undo log for one component's installation.
#[derive(Debug)]
pub struct Transaction {
    pub(crate) component_id: String,
    pub(crate) operations: Vec<Box<dyn UndoOperation>>,
    pub(crate) state: TransactionState,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) last_rollback: Option<RollbackOutcome>,
}

impl Transaction {
    pub(crate) fn open(component_id: &str) -> Self {
        Self {
            component_id: component_id.to_string(),
            operations: Vec::new(),
            state: TransactionState::Open,
            started_at: Utc::now(),
            last_rollback: None,
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Registered operations, in registration order.
    pub fn operations(&self) -> &[Box<dyn UndoOperation>] {
        &self.operations
    }

    /// Run every registered operation newest first. Failures are logged and
    /// recorded; the unwind always continues to the oldest operation.
    pub(crate) fn unwind(&self) -> RollbackOutcome {
        let mut steps = Vec::with_capacity(self.operations.len());
        for (step, op) in self.operations.iter().enumerate().rev() {
            let description = op.describe();
            let error = match op.apply() {
                Ok(()) => {
                    tracing::debug!(component = %self.component_id, step, %description, "Undo step applied");
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        component = %self.component_id,
                        step,
                        %description,
                        error = %e,
                        "Undo step failed, continuing rollback"
                    );
                    Some(e.to_string())
                }
            };
            steps.push(UndoStepReport {
                step,
                kind: op.kind(),
                description,
                error,
            });
        }
        RollbackOutcome {
            component_id: self.component_id.clone(),
            steps,
        }
    }
}

/// Result of one undo step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoStepReport {
    /// Registration index; the first registered operation is step 0.
    pub step: usize,
    pub kind: UndoKind,
    pub description: String,
    pub error: Option<String>,
}

impl UndoStepReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened during one rollback, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub component_id: String,
    pub steps: Vec<UndoStepReport>,
}

impl RollbackOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &UndoStepReport> {
        self.steps.iter().filter(|s| s.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UndoStepReport> {
        self.steps.iter().filter(|s| !s.succeeded())
    }

    /// Whether every undo step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(UndoStepReport::succeeded)
    }

    pub fn errors(&self) -> Vec<RollbackError> {
        self.failed()
            .map(|s| RollbackError::UndoStepFailed {
                component_id: self.component_id.clone(),
                step: s.step,
                description: s.description.clone(),
                message: s.error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// A closed transaction as kept in the manager's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub component_id: String,
    pub state: TransactionState,
    pub operations: usize,
    pub started_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub rollback: Option<RollbackOutcome>,
}
