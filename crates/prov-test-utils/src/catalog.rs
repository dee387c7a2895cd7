//! Catalog fixtures.
//!
//! Versions accept the catalog's short form, so `"1.2"` is `1.2.0`.

use prov_catalog::{Catalog, Component, Version, VersionConstraint, parse_version};

/// Install-method tag used by [`component`]; served by [`ScriptedHandler`](crate::ScriptedHandler).
pub const FAKE_METHOD: &str = "fake";

pub fn version(s: &str) -> Version {
    parse_version(s).unwrap_or_else(|e| panic!("invalid test version '{s}': {e}"))
}

pub fn constraint(s: &str) -> VersionConstraint {
    VersionConstraint::parse(s).unwrap_or_else(|e| panic!("invalid test constraint '{s}': {e}"))
}

/// A component installed by the fake method, with no dependencies.
pub fn component(id: &str, v: &str) -> Component {
    Component::new(id, version(v), FAKE_METHOD)
}

/// Build a catalog, panicking on validation errors.
pub fn catalog_of(components: Vec<Component>) -> Catalog {
    Catalog::new(components).expect("catalog_of: invalid test catalog")
}
