//! Forward actions that register their own undo.
//!
//! Every helper on [`TransactionScope`] snapshots the state it is about to
//! change, registers the matching undo operation, and only then acts. If
//! the action itself fails, the registered undo restores the snapshot,
//! which is harmless.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_catalog::RollbackTemplate;
use serde_json::Value;

use crate::manager::RollbackManager;
use crate::undo::{
    self, DeleteCreatedPath, RemovePathEntry, RestoreConfigValue, RestoreFileContent, RestoreVariable,
    RunCompensatingCommand, UndoOperation,
};
use crate::variables::{VariableStore, join_entries, path_entries};
use crate::{Error, Result, config, io};

/// Borrowed view of one open transaction.
#[derive(Debug)]
pub struct TransactionScope<'a> {
    manager: &'a mut RollbackManager,
    component_id: String,
}

impl<'a> TransactionScope<'a> {
    pub(crate) fn new(manager: &'a mut RollbackManager, component_id: &str) -> Self {
        Self {
            manager,
            component_id: component_id.to_string(),
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Register an arbitrary undo operation.
    pub fn register(&mut self, operation: Box<dyn UndoOperation>) -> Result<()> {
        self.manager.register_action(&self.component_id, operation)?;
        Ok(())
    }

    /// Register a compensating command to run on rollback.
    pub fn register_command(&mut self, program: impl Into<String>, args: Vec<String>) -> Result<()> {
        self.register(Box::new(RunCompensatingCommand {
            program: program.into(),
            args,
        }))
    }

    /// Register the catalog's rollback template with its placeholders bound.
    pub fn register_template(&mut self, template: &RollbackTemplate, bindings: &[(&str, &str)]) -> Result<()> {
        for step in template.render(bindings) {
            self.register(undo::from_step(&step))?;
        }
        Ok(())
    }

    /// Create a directory tree. Only the top-most directory that did not
    /// already exist is removed on rollback.
    pub fn create_dir(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        let mut top: PathBuf = path.to_path_buf();
        while let Some(parent) = top.parent() {
            if parent.as_os_str().is_empty() || parent.exists() {
                break;
            }
            top = parent.to_path_buf();
        }
        self.register(Box::new(DeleteCreatedPath { path: top }))?;
        std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))
    }

    /// Write a file atomically, keeping its previous content for rollback.
    pub fn write_file(&mut self, path: &Path, content: &[u8]) -> Result<()> {
        let previous = io::read_optional(path)?;
        self.register(Box::new(RestoreFileContent {
            path: path.to_path_buf(),
            previous,
        }))?;
        io::write_atomic(path, content)
    }

    pub fn set_variable(&mut self, store: &Arc<dyn VariableStore>, name: &str, value: &str) -> Result<()> {
        let previous = store.get(name)?;
        self.register(Box::new(RestoreVariable {
            store: store.clone(),
            name: name.to_string(),
            previous,
        }))?;
        store.set(name, value)
    }

    /// Put `entry` at the front of a `PATH`-like variable. An entry that is
    /// already present is left alone and nothing is registered.
    pub fn prepend_path_entry(&mut self, store: &Arc<dyn VariableStore>, variable: &str, entry: &str) -> Result<()> {
        let current = store.get(variable)?.unwrap_or_default();
        let entries = path_entries(&current);
        if entries.contains(&entry) {
            return Ok(());
        }
        self.register(Box::new(RemovePathEntry {
            store: store.clone(),
            variable: variable.to_string(),
            entry: entry.to_string(),
        }))?;
        let updated = join_entries(std::iter::once(entry).chain(entries));
        store.set(variable, &updated)
    }

    /// Set a dotted key in a TOML or JSON config file.
    pub fn set_config_value(&mut self, path: &Path, key: &str, value: Value) -> Result<()> {
        let previous = config::read_key(path, key)?;
        self.register(Box::new(RestoreConfigValue {
            path: path.to_path_buf(),
            key: key.to_string(),
            previous,
        }))?;
        config::write_key(path, key, Some(value))
    }
}
