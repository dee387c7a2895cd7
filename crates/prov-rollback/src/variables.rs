//! Persistent variables such as `JAVA_HOME` or a `PATH`-like list.
//!
//! Installers never mutate the process environment directly; they write to
//! a [`VariableStore`] so every change can be snapshotted and undone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{Error, Result, io};

/// Separator between entries of a `PATH`-like variable.
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

/// A keyed store of string variables.
pub trait VariableStore: Send + Sync + std::fmt::Debug {
    fn get(&self, name: &str) -> Result<Option<String>>;

    fn set(&self, name: &str, value: &str) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;

    /// Set `name` to `value`, or remove it when `value` is `None`.
    fn restore(&self, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.set(name, value),
            None => self.remove(name),
        }
    }
}

/// In-memory store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl VariableStore for MemoryVariableStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).remove(name);
        Ok(())
    }
}

/// Variables persisted in a TOML file, e.g. a generated shell environment.
///
/// Every change rewrites the whole file atomically.
#[derive(Debug)]
pub struct EnvFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let Some(bytes) = io::read_optional(&self.path)? else {
            return Ok(BTreeMap::new());
        };
        toml::from_str(&String::from_utf8_lossy(&bytes)).map_err(|e| Error::ConfigParse {
            path: self.path.clone(),
            format: "TOML".into(),
            message: e.to_string(),
        })
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        change(&mut values);
        let content = toml::to_string(&values).map_err(|e| Error::ConfigParse {
            path: self.path.clone(),
            format: "TOML".into(),
            message: e.to_string(),
        })?;
        io::write_atomic(&self.path, content.as_bytes())
    }
}

impl VariableStore for EnvFileStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(name))
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(name.to_string(), value.to_string());
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.update(|values| {
            values.remove(name);
        })
    }
}

/// Split a `PATH`-like value into its non-empty entries.
pub fn path_entries(value: &str) -> Vec<&str> {
    value.split(PATH_SEPARATOR).filter(|e| !e.is_empty()).collect()
}

pub fn join_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> String {
    entries.into_iter().collect::<Vec<_>>().join(&PATH_SEPARATOR.to_string())
}
