//! Dependency graph over the requested closure of a catalog.
//!
//! Edges point from dependency to dependent: if `A` depends on `B` with
//! constraint `>=1.0`, the graph holds the edge `B -> A` carrying `>=1.0`.
//! Nodes are kept in catalog declaration order so every traversal is
//! deterministic.
//!
//! # Example
//!
//! ```
//! use prov_catalog::{Catalog, Component, Version, VersionConstraint};
//! use prov_graph::build_graph;
//!
//! let catalog = Catalog::new(vec![
//!     Component::new("python", Version::new(3, 12, 0), "archive"),
//!     Component::new("poetry", Version::new(1, 8, 0), "script")
//!         .with_dependency("python", VersionConstraint::parse(">=3.9").unwrap()),
//! ])
//! .unwrap();
//!
//! let graph = build_graph(&["poetry"], &catalog).unwrap();
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.dependents_of("python")[0].dependent, "poetry");
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use prov_catalog::{Catalog, Component, VersionConstraint};
use serde::Serialize;

use crate::error::MissingDependencyError;

/// A directed `dependency -> dependent` relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub dependency: String,
    pub dependent: String,
    pub constraint: VersionConstraint,
}

/// A referenced id that the catalog does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub id: String,
    /// Components in the closure that declared the dependency.
    pub required_by: Vec<String>,
    /// Whether the id was part of the request itself.
    pub requested: bool,
}

/// Read-only dependency graph for one planning run.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Component>,
    index: HashMap<String, usize>,
    positions: HashMap<String, usize>,
    edges: Vec<GraphEdge>,
    /// Edge indices keyed by dependent (what the key depends on).
    incoming: HashMap<String, Vec<usize>>,
    /// Edge indices keyed by dependency (who depends on the key).
    outgoing: HashMap<String, Vec<usize>>,
    requested: Vec<String>,
    missing: Vec<MissingDependency>,
}

impl DependencyGraph {
    /// Expand `requested` into its transitive closure without failing.
    ///
    /// Ids absent from the catalog are recorded in [`missing`](Self::missing)
    /// instead of aborting the expansion.
    pub fn expand<S: AsRef<str>>(requested: &[S], catalog: &Catalog) -> Self {
        let mut graph = Self {
            requested: requested.iter().map(|s| s.as_ref().to_string()).collect(),
            ..Self::default()
        };
        let mut missing: Vec<MissingDependency> = Vec::new();
        let mut note_missing = |id: &str, required_by: Option<&str>, requested: bool| {
            let entry = match missing.iter().position(|m| m.id == id) {
                Some(i) => &mut missing[i],
                None => {
                    missing.push(MissingDependency {
                        id: id.to_string(),
                        required_by: Vec::new(),
                        requested: false,
                    });
                    let last = missing.len() - 1;
                    &mut missing[last]
                }
            };
            entry.requested |= requested;
            if let Some(parent) = required_by
                && !entry.required_by.iter().any(|p| p == parent)
            {
                entry.required_by.push(parent.to_string());
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        for id in &graph.requested {
            if catalog.contains(id) {
                if seen.insert(id.clone()) {
                    queue.push_back(id.clone());
                }
            } else {
                note_missing(id, None, true);
            }
        }

        let mut pending_edges: Vec<GraphEdge> = Vec::new();
        while let Some(id) = queue.pop_front() {
            let Some(component) = catalog.get(&id) else {
                continue;
            };
            for dep in &component.dependencies {
                if !catalog.contains(&dep.id) {
                    note_missing(&dep.id, Some(&id), false);
                    continue;
                }
                pending_edges.push(GraphEdge {
                    dependency: dep.id.clone(),
                    dependent: id.clone(),
                    constraint: dep.constraint.clone(),
                });
                if seen.insert(dep.id.clone()) {
                    queue.push_back(dep.id.clone());
                }
            }
        }

        let mut members: Vec<&Component> = seen.iter().filter_map(|id| catalog.get(id)).collect();
        members.sort_by_key(|c| catalog.position(&c.id));
        for component in members {
            graph.add_node(component.clone(), catalog.position(&component.id).unwrap_or(usize::MAX));
        }

        // Edges follow the dependent's declaration order, then its dependency order.
        pending_edges.sort_by_key(|e| graph.positions.get(&e.dependent).copied());
        for edge in pending_edges {
            graph.add_edge(edge);
        }

        missing.sort_by(|a, b| a.id.cmp(&b.id));
        graph.missing = missing;
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            missing = graph.missing.len(),
            "Dependency graph built"
        );
        graph
    }

    fn add_node(&mut self, component: Component, position: usize) {
        let id = component.id.clone();
        self.index.insert(id.clone(), self.nodes.len());
        self.positions.insert(id.clone(), position);
        self.incoming.entry(id.clone()).or_default();
        self.outgoing.entry(id).or_default();
        self.nodes.push(component);
    }

    fn add_edge(&mut self, edge: GraphEdge) {
        let i = self.edges.len();
        self.incoming.entry(edge.dependent.clone()).or_default().push(i);
        self.outgoing.entry(edge.dependency.clone()).or_default().push(i);
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Component> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in catalog declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Component> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Catalog declaration position of a node.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Edges whose dependent is `id`, i.e. what `id` depends on.
    pub fn dependencies_of(&self, id: &str) -> Vec<&GraphEdge> {
        self.incoming
            .get(id)
            .map(|ix| ix.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Edges whose dependency is `id`, i.e. who depends on `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&GraphEdge> {
        self.outgoing
            .get(id)
            .map(|ix| ix.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Every component that depends on any of `roots`, directly or not.
    ///
    /// The roots themselves are not included unless they depend on each other.
    pub fn transitive_dependents<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut queue: VecDeque<&str> = roots.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            for edge in self.dependents_of(id) {
                if found.insert(edge.dependent.clone()) {
                    queue.push_back(&edge.dependent);
                }
            }
        }
        found
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn is_requested(&self, id: &str) -> bool {
        self.requested.iter().any(|r| r == id)
    }

    pub fn missing(&self) -> &[MissingDependency] {
        &self.missing
    }
}

/// Expand `requested` and its transitive dependencies into a graph.
///
/// Missing ids that were only referenced as dependencies stay on the graph as
/// warnings; a requested id absent from the catalog is fatal.
pub fn build_graph<S: AsRef<str>>(
    requested: &[S],
    catalog: &Catalog,
) -> Result<DependencyGraph, MissingDependencyError> {
    let graph = DependencyGraph::expand(requested, catalog);
    let fatal: Vec<String> = graph
        .missing()
        .iter()
        .filter(|m| m.requested)
        .map(|m| m.id.clone())
        .collect();
    if !fatal.is_empty() {
        return Err(MissingDependencyError { missing: fatal });
    }
    for m in graph.missing() {
        tracing::warn!(
            id = %m.id,
            required_by = %m.required_by.join(", "),
            "Dependency missing from catalog"
        );
    }
    Ok(graph)
}
