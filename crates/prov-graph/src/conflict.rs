//! Version conflict detection and resolution suggestions.
//!
//! Three situations are flagged:
//!
//! - **Disjoint constraints**: two dependents constrain a shared dependency
//!   to ranges that do not overlap.
//! - **Unsatisfied by selection**: the constraints overlap, but the
//!   dependency's selected catalog version falls outside at least one.
//! - **Mutual exclusion**: a component declares a conflict with another
//!   component in the graph whose selected version matches the declaration.
//!
//! Every record carries a [`Resolution`]; "unresolvable" is itself a
//! resolution that surfaces both constraints verbatim.

use prov_catalog::{Catalog, Component, Version, VersionConstraint, VersionRange};
use serde::{Deserialize, Serialize};

use crate::graph::{DependencyGraph, GraphEdge};
use crate::resolution::ResolutionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    DisjointConstraints,
    UnsatisfiedBySelection,
    MutualExclusion,
}

/// One side of a conflict: a component and the constraint it brings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictParty {
    pub component: String,
    pub constraint: VersionConstraint,
}

impl ConflictParty {
    pub fn new(component: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            component: component.into(),
            constraint,
        }
    }
}

/// Suggested way out of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Resolution {
    /// Select an available catalog version that satisfies both sides.
    UseAvailable { component: String, version: Version },
    /// No available version fits, but this version inside the overlap would.
    Pin { component: String, version: Version },
    /// No version can satisfy both constraints.
    Unresolvable { first: String, second: String },
}

impl Resolution {
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Resolution::Unresolvable { .. })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::UseAvailable { component, version } => {
                write!(f, "use available {component} {version}")
            }
            Resolution::Pin { component, version } => {
                write!(f, "pin {component} to {version}")
            }
            Resolution::Unresolvable { first, second } => {
                write!(f, "unresolvable: '{first}' vs '{second}'")
            }
        }
    }
}

/// Two components that cannot both be satisfied as selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    /// The shared dependency, for version conflicts.
    pub dependency: Option<String>,
    pub first: ConflictParty,
    pub second: ConflictParty,
    pub reason: String,
    pub suggestion: Resolution,
}

impl ConflictRecord {
    /// The component whose version would have to change.
    pub fn target(&self) -> &str {
        match (self.kind, &self.dependency) {
            (ConflictKind::MutualExclusion, _) | (_, None) => &self.second.component,
            (_, Some(dep)) => dep,
        }
    }

    /// Components that cannot be planned while the conflict is unresolved.
    pub fn implicated(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for party in [&self.first, &self.second] {
            if self.dependency.as_deref() != Some(party.component.as_str()) {
                out.push(party.component.as_str());
            }
        }
        out
    }
}

/// Flag version conflicts and declared exclusions within the graph.
pub fn detect_version_conflicts(graph: &DependencyGraph) -> Vec<ConflictRecord> {
    detect_version_conflicts_with(graph, ResolutionPolicy::default())
}

pub fn detect_version_conflicts_with(graph: &DependencyGraph, policy: ResolutionPolicy) -> Vec<ConflictRecord> {
    let mut records = Vec::new();
    let lookup = |id: &str| graph.node(id);

    for dependency in graph.nodes() {
        let edges = graph.dependents_of(&dependency.id);
        let mut disjoint_parties: Vec<&str> = Vec::new();

        for (i, a) in edges.iter().enumerate() {
            for b in &edges[i + 1..] {
                if a.constraint.overlaps(&b.constraint) {
                    continue;
                }
                disjoint_parties.extend([a.dependent.as_str(), b.dependent.as_str()]);
                let mut record = ConflictRecord {
                    kind: ConflictKind::DisjointConstraints,
                    dependency: Some(dependency.id.clone()),
                    first: ConflictParty::new(&a.dependent, a.constraint.clone()),
                    second: ConflictParty::new(&b.dependent, b.constraint.clone()),
                    reason: format!(
                        "{} requires {} {} but {} requires {} {}",
                        a.dependent,
                        dependency.id,
                        a.constraint.range(),
                        b.dependent,
                        dependency.id,
                        b.constraint.range()
                    ),
                    suggestion: Resolution::Unresolvable {
                        first: String::new(),
                        second: String::new(),
                    },
                };
                record.suggestion = resolve_with(&record, lookup, policy);
                records.push(record);
            }
        }

        // One record per dependency. The first rejecting dependent is the
        // named party; the others are listed in the reason, and planning
        // blocks every one of them if the record stays unresolvable.
        let rejecting: Vec<&GraphEdge> = edges
            .iter()
            .copied()
            .filter(|e| {
                !disjoint_parties.contains(&e.dependent.as_str())
                    && !e.constraint.satisfies_version(&dependency.version)
            })
            .collect();
        if let Some((edge, also)) = rejecting.split_first() {
            let others: Vec<&VersionConstraint> = edges
                .iter()
                .filter(|e| e.dependent != edge.dependent && !disjoint_parties.contains(&e.dependent.as_str()))
                .map(|e| &e.constraint)
                .collect();
            let combined = all_of(&others);
            let mut record = ConflictRecord {
                kind: ConflictKind::UnsatisfiedBySelection,
                dependency: Some(dependency.id.clone()),
                first: ConflictParty::new(&edge.dependent, edge.constraint.clone()),
                second: ConflictParty::new(&dependency.id, combined),
                reason: format!(
                    "{} requires {} {} but {} is selected{}",
                    edge.dependent,
                    dependency.id,
                    edge.constraint,
                    dependency.version,
                    also_rejected_by(also)
                ),
                suggestion: Resolution::Unresolvable {
                    first: String::new(),
                    second: String::new(),
                },
            };
            record.suggestion = resolve_with(&record, lookup, policy);
            records.push(record);
        }
    }

    for component in graph.nodes() {
        for declared in &component.conflicts {
            let Some(other) = graph.node(&declared.id) else {
                continue;
            };
            if !declared.constraint.satisfies_version(&other.version) {
                continue;
            }
            let already = records.iter().any(|r| {
                r.kind == ConflictKind::MutualExclusion
                    && r.first.component == other.id
                    && r.second.component == component.id
            });
            if already {
                continue;
            }
            let mut record = ConflictRecord {
                kind: ConflictKind::MutualExclusion,
                dependency: None,
                first: ConflictParty::new(&component.id, VersionConstraint::exact(&component.version)),
                second: ConflictParty::new(&other.id, declared.constraint.clone()),
                reason: format!(
                    "{} declares a conflict with {} {}",
                    component.id, other.id, declared.constraint
                ),
                suggestion: Resolution::Unresolvable {
                    first: String::new(),
                    second: String::new(),
                },
            };
            record.suggestion = resolve_with(&record, lookup, policy);
            records.push(record);
        }
    }

    for record in &records {
        tracing::debug!(
            kind = ?record.kind,
            first = %record.first.component,
            second = %record.second.component,
            suggestion = %record.suggestion,
            "Conflict detected"
        );
    }
    records
}

fn also_rejected_by(edges: &[&GraphEdge]) -> String {
    if edges.is_empty() {
        return String::new();
    }
    let names: Vec<String> = edges
        .iter()
        .map(|e| format!("{} ({})", e.dependent, e.constraint))
        .collect();
    format!("; also rejected by {}", names.join(", "))
}

/// Conjunction of several constraints, keeping their text.
fn all_of(constraints: &[&VersionConstraint]) -> VersionConstraint {
    let parts: Vec<&str> = constraints
        .iter()
        .filter(|c| !c.is_any())
        .map(|c| c.as_str())
        .collect();
    if parts.is_empty() {
        return VersionConstraint::any();
    }
    VersionConstraint::parse(&parts.join(",")).unwrap_or_else(|_| VersionConstraint::any())
}

/// Suggest a resolution using the catalog's available versions.
///
/// Priority: an available version meeting both constraints (the current
/// selection first, then per [`ResolutionPolicy`]); otherwise a version
/// inside the overlap; otherwise unresolvable with both constraints as
/// written.
pub fn resolve_conflict(conflict: &ConflictRecord, catalog: &Catalog) -> Resolution {
    resolve_conflict_with(conflict, catalog, ResolutionPolicy::default())
}

pub fn resolve_conflict_with(conflict: &ConflictRecord, catalog: &Catalog, policy: ResolutionPolicy) -> Resolution {
    resolve_with(conflict, |id| catalog.get(id), policy)
}

fn resolve_with<'a>(
    conflict: &ConflictRecord,
    lookup: impl Fn(&str) -> Option<&'a Component>,
    policy: ResolutionPolicy,
) -> Resolution {
    let unresolvable = || Resolution::Unresolvable {
        first: conflict.first.constraint.as_str().to_string(),
        second: conflict.second.constraint.as_str().to_string(),
    };
    let Some(target) = lookup(conflict.target()) else {
        return unresolvable();
    };
    let versions = target.versions();

    if conflict.kind == ConflictKind::MutualExclusion {
        let clear: Vec<&Version> = versions
            .iter()
            .filter(|v| !conflict.second.constraint.satisfies_version(v))
            .collect();
        return match policy.choose(&target.version, clear) {
            Some(version) => Resolution::UseAvailable {
                component: target.id.clone(),
                version: version.clone(),
            },
            None => unresolvable(),
        };
    }

    let overlap = conflict.first.constraint.range().intersect(&conflict.second.constraint.range());
    if overlap.is_empty() {
        return unresolvable();
    }

    let fitting: Vec<&Version> = versions.iter().filter(|v| overlap.contains(v)).collect();
    if let Some(version) = policy.choose(&target.version, fitting) {
        return Resolution::UseAvailable {
            component: target.id.clone(),
            version: version.clone(),
        };
    }

    match boundary_version(&overlap) {
        Some(version) => Resolution::Pin {
            component: target.id.clone(),
            version,
        },
        None => unresolvable(),
    }
}

/// A concrete version inside `range`: its inclusive upper bound when it has
/// one, otherwise the lowest version at its lower bound.
fn boundary_version(range: &VersionRange) -> Option<Version> {
    let candidate = match (range.lower(), range.upper()) {
        (_, Some(upper)) if upper.inclusive => upper.version.clone(),
        (Some(lower), _) if lower.inclusive => lower.version.clone(),
        (Some(lower), _) => Version::new(lower.version.major, lower.version.minor, lower.version.patch + 1),
        (None, _) => return None,
    };
    range.contains(&candidate).then_some(candidate)
}
