//! Immutable catalog snapshot.
//!
//! A [`Catalog`] is built once per run and passed explicitly to every
//! planning and execution call. Declaration order is preserved because the
//! planner uses it as the deterministic tie-break between independent
//! components.

use std::collections::HashMap;

use serde::Deserialize;

use crate::component::Component;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "component")]
    components: Vec<Component>,
}

/// Read-only set of component records in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: Vec<Component>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and invalid records.
    pub fn new(components: Vec<Component>) -> Result<Self> {
        let mut index = HashMap::with_capacity(components.len());
        for (position, component) in components.iter().enumerate() {
            component.validate()?;
            if index.insert(component.id.clone(), position).is_some() {
                return Err(Error::DuplicateComponent(component.id.clone()));
            }
        }
        tracing::debug!(components = components.len(), "Catalog snapshot built");
        Ok(Self { components, index })
    }

    /// Parse a catalog document made of `[[component]]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.components)
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.index.get(id).map(|&i| &self.components[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Declaration position of `id`, used for stable ordering.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Catalog::new(vec![
            Component::new("go", Version::new(1, 22, 0), "archive"),
            Component::new("go", Version::new(1, 21, 0), "archive"),
        ]);
        assert!(matches!(result, Err(Error::DuplicateComponent(id)) if id == "go"));
    }

    #[test]
    fn test_positions_follow_declaration_order() {
        let catalog = Catalog::new(vec![
            Component::new("zig", Version::new(0, 13, 0), "archive"),
            Component::new("bun", Version::new(1, 1, 0), "script"),
        ])
        .unwrap();
        assert_eq!(catalog.position("zig"), Some(0));
        assert_eq!(catalog.position("bun"), Some(1));
        assert_eq!(catalog.position("deno"), None);
        assert_eq!(catalog.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["zig", "bun"]);
    }

    #[test]
    fn test_from_toml_str() {
        let catalog = Catalog::from_toml_str(
            r#"
[[component]]
id = "python"
version = "3.12"
install = { tag = "archive" }

[[component]]
id = "poetry"
version = "1.8.2"
install = { tag = "script" }
depends = [{ id = "python", constraint = ">=3.9" }]
"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let poetry = catalog.get("poetry").unwrap();
        assert_eq!(poetry.dependencies[0].id, "python");
        assert!(catalog.contains("python"));
    }

    #[test]
    fn test_from_toml_str_empty_document() {
        let catalog = Catalog::from_toml_str("").unwrap();
        assert!(catalog.is_empty());
    }
}
