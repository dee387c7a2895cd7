//! Dependency graph analysis for the toolchain provisioner.
//!
//! Everything here is pure and synchronous: it reads an immutable
//! [`Catalog`](prov_catalog::Catalog) and produces either an
//! [`InstallationPlan`] or a [`GraphError`] before any side effect happens.
//!
//! - [`build_graph`] expands a request into its dependency closure
//! - [`detect_cycles`] finds dependency cycles
//! - [`detect_version_conflicts`] and [`resolve_conflict`] flag and resolve
//!   incompatible constraints
//! - [`compute_resolution_path`] searches version steps that clear a conflict
//! - [`topological_order`] orders components dependencies-first
//! - [`plan_installation`] runs all of the above

pub mod conflict;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod order;
pub mod plan;
pub mod resolution;

pub use conflict::{
    ConflictKind, ConflictParty, ConflictRecord, Resolution, detect_version_conflicts,
    detect_version_conflicts_with, resolve_conflict, resolve_conflict_with,
};
pub use cycles::detect_cycles;
pub use error::{GraphError, GraphIssue, MissingDependencyError};
pub use graph::{DependencyGraph, GraphEdge, MissingDependency, build_graph};
pub use order::topological_order;
pub use plan::{
    ExcludedComponent, InstallationPlan, PlanOptions, PlanWarning, PlannedComponent,
    plan_installation, plan_installation_with,
};
pub use resolution::{
    ResolutionPolicy, StepDirection, VersionStep, compute_resolution_path, compute_resolution_path_with,
};
