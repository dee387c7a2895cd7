//! Undo operations.
//!
//! Each operation captures, at registration time, everything it needs to
//! reverse one forward action. `apply` must be idempotent: a retried
//! rollback runs it again, and the second run has to leave the same state
//! as the first.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use prov_catalog::RollbackStep;
use serde::Serialize;
use serde_json::Value;

use crate::variables::{VariableStore, join_entries, path_entries};
use crate::{Error, Result, config, io};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndoKind {
    DeleteCreatedPath,
    RestorePreviousContent,
    RunCompensatingCommand,
    RestorePreviousVariable,
    RemoveAddedPathEntry,
    RestorePreviousConfigValue,
    /// Handler-defined operation.
    Custom,
}

impl fmt::Display for UndoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UndoKind::DeleteCreatedPath => "delete-created-path",
            UndoKind::RestorePreviousContent => "restore-previous-content",
            UndoKind::RunCompensatingCommand => "run-compensating-command",
            UndoKind::RestorePreviousVariable => "restore-previous-variable",
            UndoKind::RemoveAddedPathEntry => "remove-added-path-entry",
            UndoKind::RestorePreviousConfigValue => "restore-previous-config-value",
            UndoKind::Custom => "custom",
        })
    }
}

/// Reverses one forward side effect.
pub trait UndoOperation: Send + Sync + fmt::Debug {
    fn kind(&self) -> UndoKind;

    /// Human-readable summary for logs and reports.
    fn describe(&self) -> String;

    fn apply(&self) -> Result<()>;
}

/// Remove a file or directory the install created.
#[derive(Debug, Clone)]
pub struct DeleteCreatedPath {
    pub path: PathBuf,
}

impl UndoOperation for DeleteCreatedPath {
    fn kind(&self) -> UndoKind {
        UndoKind::DeleteCreatedPath
    }

    fn describe(&self) -> String {
        format!("delete {}", self.path.display())
    }

    fn apply(&self) -> Result<()> {
        io::remove_path(&self.path)
    }
}

/// Put a file back to its prior bytes, or remove it if it did not exist.
#[derive(Debug, Clone)]
pub struct RestoreFileContent {
    pub path: PathBuf,
    pub previous: Option<Vec<u8>>,
}

impl UndoOperation for RestoreFileContent {
    fn kind(&self) -> UndoKind {
        UndoKind::RestorePreviousContent
    }

    fn describe(&self) -> String {
        match &self.previous {
            Some(bytes) => format!("restore {} ({} bytes)", self.path.display(), bytes.len()),
            None => format!("remove {}", self.path.display()),
        }
    }

    fn apply(&self) -> Result<()> {
        match &self.previous {
            Some(bytes) => io::write_atomic(&self.path, bytes),
            None => io::remove_path(&self.path),
        }
    }
}

/// Run a command that reverses an action, e.g. an uninstaller.
///
/// Idempotency is the command's responsibility.
#[derive(Debug, Clone)]
pub struct RunCompensatingCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl UndoOperation for RunCompensatingCommand {
    fn kind(&self) -> UndoKind {
        UndoKind::RunCompensatingCommand
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            format!("run {}", self.program)
        } else {
            format!("run {} {}", self.program, self.args.join(" "))
        }
    }

    fn apply(&self) -> Result<()> {
        tracing::debug!(program = %self.program, args = ?self.args, "Running compensating command");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| Error::CommandFailed {
                program: self.program.clone(),
                message: e.to_string(),
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                program: self.program.clone(),
                message: format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

/// Put a variable back to its prior value, or unset it.
#[derive(Debug, Clone)]
pub struct RestoreVariable {
    pub store: Arc<dyn VariableStore>,
    pub name: String,
    pub previous: Option<String>,
}

impl UndoOperation for RestoreVariable {
    fn kind(&self) -> UndoKind {
        UndoKind::RestorePreviousVariable
    }

    fn describe(&self) -> String {
        match &self.previous {
            Some(value) => format!("restore {}={value}", self.name),
            None => format!("unset {}", self.name),
        }
    }

    fn apply(&self) -> Result<()> {
        self.store.restore(&self.name, self.previous.as_deref())
    }
}

/// Drop one entry that was added to a `PATH`-like variable.
///
/// Other entries, including ones added later by someone else, are kept.
#[derive(Debug, Clone)]
pub struct RemovePathEntry {
    pub store: Arc<dyn VariableStore>,
    pub variable: String,
    pub entry: String,
}

impl UndoOperation for RemovePathEntry {
    fn kind(&self) -> UndoKind {
        UndoKind::RemoveAddedPathEntry
    }

    fn describe(&self) -> String {
        format!("remove {} from {}", self.entry, self.variable)
    }

    fn apply(&self) -> Result<()> {
        let Some(current) = self.store.get(&self.variable)? else {
            return Ok(());
        };
        let entries = path_entries(&current);
        if !entries.contains(&self.entry.as_str()) {
            return Ok(());
        }
        let kept: Vec<&str> = entries.into_iter().filter(|e| *e != self.entry).collect();
        if kept.is_empty() {
            self.store.remove(&self.variable)
        } else {
            self.store.set(&self.variable, &join_entries(kept))
        }
    }
}

/// Put a dotted key in a TOML/JSON config file back to its prior value.
#[derive(Debug, Clone)]
pub struct RestoreConfigValue {
    pub path: PathBuf,
    pub key: String,
    pub previous: Option<Value>,
}

impl UndoOperation for RestoreConfigValue {
    fn kind(&self) -> UndoKind {
        UndoKind::RestorePreviousConfigValue
    }

    fn describe(&self) -> String {
        match &self.previous {
            Some(value) => format!("restore {} in {} to {value}", self.key, self.path.display()),
            None => format!("remove {} from {}", self.key, self.path.display()),
        }
    }

    fn apply(&self) -> Result<()> {
        config::write_key(&self.path, &self.key, self.previous.clone())
    }
}

/// Turn a rendered catalog rollback step into an operation.
pub fn from_step(step: &RollbackStep) -> Box<dyn UndoOperation> {
    match step {
        RollbackStep::DeletePath { path } => Box::new(DeleteCreatedPath {
            path: PathBuf::from(path),
        }),
        RollbackStep::Command { program, args } => Box::new(RunCompensatingCommand {
            program: program.clone(),
            args: args.clone(),
        }),
    }
}
