//! Dotted-key access to TOML and JSON configuration files.
//!
//! Both formats are edited through a [`serde_json::Value`] tree. `a.b.c`
//! addresses nested tables; intermediate tables are created on write and
//! left in place when a key is removed.

use std::path::Path;

use serde_json::{Map, Value};

use crate::{Error, Result, io};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

fn format_of(path: &Path) -> Result<Format> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension.to_lowercase().as_str() {
        "toml" => Ok(Format::Toml),
        "json" => Ok(Format::Json),
        _ => Err(Error::UnsupportedFormat {
            extension: extension.to_string(),
        }),
    }
}

/// Load a config file as a JSON tree. A missing file is an empty table.
pub fn load_document(path: &Path) -> Result<Value> {
    let format = format_of(path)?;
    let Some(bytes) = io::read_optional(path)? else {
        return Ok(Value::Object(Map::new()));
    };
    let content = String::from_utf8_lossy(&bytes);
    let parse_error = |format: &str, message: String| Error::ConfigParse {
        path: path.to_path_buf(),
        format: format.into(),
        message,
    };
    match format {
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error("TOML", e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error("JSON", e.to_string())),
    }
}

/// Write a JSON tree back in the file's own format.
pub fn save_document(path: &Path, document: &Value) -> Result<()> {
    let content = match format_of(path)? {
        Format::Toml => toml::to_string_pretty(document).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            format: "TOML".into(),
            message: e.to_string(),
        })?,
        Format::Json => serde_json::to_string_pretty(document).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            format: "JSON".into(),
            message: e.to_string(),
        })?,
    };
    io::write_atomic(path, content.as_bytes())
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidConfigKey {
            key: key.to_string(),
            reason: "empty key segment".to_string(),
        });
    }
    Ok(parts)
}

pub fn get_value(document: &Value, key: &str) -> Result<Option<Value>> {
    let mut current = document;
    for part in split_key(key)? {
        match current.get(part) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current.clone()))
}

/// Set `key` to `value`, or remove it when `value` is `None`.
pub fn set_value(document: &mut Value, key: &str, value: Option<Value>) -> Result<()> {
    let parts = split_key(key)?;
    let (last, parents) = parts.split_last().ok_or_else(|| Error::InvalidConfigKey {
        key: key.to_string(),
        reason: "empty key".to_string(),
    })?;

    let mut current = document;
    for part in parents {
        let table = as_table(current, key)?;
        if value.is_none() && !table.contains_key(*part) {
            return Ok(());
        }
        current = table
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let table = as_table(current, key)?;
    match value {
        Some(value) => {
            table.insert(last.to_string(), value);
        }
        None => {
            table.remove(*last);
        }
    }
    Ok(())
}

fn as_table<'a>(value: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>> {
    value.as_object_mut().ok_or_else(|| Error::InvalidConfigKey {
        key: key.to_string(),
        reason: "path crosses a non-table value".to_string(),
    })
}

/// Read one dotted key from a config file.
pub fn read_key(path: &Path, key: &str) -> Result<Option<Value>> {
    get_value(&load_document(path)?, key)
}

/// Set or remove one dotted key in a config file.
pub fn write_key(path: &Path, key: &str, value: Option<Value>) -> Result<()> {
    let mut document = load_document(path)?;
    set_value(&mut document, key, value)?;
    save_document(path, &document)
}
