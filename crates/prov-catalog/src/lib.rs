//! Component catalog for the toolchain provisioner.
//!
//! This crate holds the immutable records the planner and orchestrator work
//! from: components, their dependency and conflict declarations, version
//! constraints, and the [`Catalog`] snapshot that owns them.

pub mod catalog;
pub mod component;
pub mod error;
pub mod version;

pub use catalog::Catalog;
pub use component::{
    Category, Component, DeclaredConflict, Dependency, FetchSpec, InstallMethod,
    PostInstallCommand, RollbackStep, RollbackTemplate, VerifySpec,
};
pub use error::{Error, Result};
pub use semver::Version;
pub use version::{Bound, VersionConstraint, VersionRange, parse_version};
