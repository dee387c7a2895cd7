//! Transactional undo log for component installation.
//!
//! [`RollbackManager`] keeps one transaction per component. Install code
//! registers an [`UndoOperation`] for each reversible step, usually through
//! the snapshot-first helpers on [`TransactionScope`]. A failed install is
//! unwound in strict reverse order; a successful one is committed and its
//! undo log dropped.

pub mod config;
pub mod error;
pub mod io;
pub mod manager;
pub mod scope;
pub mod transaction;
pub mod undo;
pub mod variables;

pub use error::{Error, Result, RollbackError, TransactionError, TransactionState};
pub use manager::RollbackManager;
pub use scope::TransactionScope;
pub use transaction::{RollbackOutcome, Transaction, TransactionRecord, UndoStepReport};
pub use undo::{
    DeleteCreatedPath, RemovePathEntry, RestoreConfigValue, RestoreFileContent, RestoreVariable,
    RunCompensatingCommand, UndoKind, UndoOperation,
};
pub use variables::{EnvFileStore, MemoryVariableStore, PATH_SEPARATOR, VariableStore};
