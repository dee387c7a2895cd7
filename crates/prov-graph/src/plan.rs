//! Installation planning.
//!
//! [`plan_installation`] runs the whole analysis in one pass: graph
//! expansion, cycle detection, conflict detection and resolution, and
//! topological ordering. Fatal findings exclude only the components they
//! touch; the rest of the request is still planned and handed back through
//! [`GraphError::partial_plan`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use prov_catalog::{Catalog, Version};
use serde::Serialize;

use crate::conflict::{ConflictKind, ConflictRecord, Resolution, detect_version_conflicts_with};
use crate::cycles::detect_cycles;
use crate::error::{GraphError, GraphIssue};
use crate::graph::DependencyGraph;
use crate::order::order_where;
use crate::resolution::ResolutionPolicy;

/// One component to install, at the version the planner selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedComponent {
    pub id: String,
    pub version: Version,
    /// Planned components this one depends on.
    pub dependencies: Vec<String>,
    /// Whether the caller asked for this component directly.
    pub requested: bool,
}

/// A non-fatal planning finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "kebab-case")]
pub enum PlanWarning {
    MissingDependency { id: String, required_by: Vec<String> },
    ConflictResolved { conflict: Box<ConflictRecord> },
    /// Two resolutions picked different versions of the same component.
    /// The first one stays in effect.
    OverrideConflict {
        component: String,
        kept: Version,
        ignored: Version,
        conflict: Box<ConflictRecord>,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::MissingDependency { id, required_by } => write!(
                f,
                "dependency '{id}' of {} is not in the catalog",
                required_by.join(", ")
            ),
            PlanWarning::ConflictResolved { conflict } => {
                write!(f, "{} ({})", conflict.reason, conflict.suggestion)
            }
            PlanWarning::OverrideConflict {
                component,
                kept,
                ignored,
                conflict,
            } => write!(
                f,
                "{} ({component} {kept} kept, {ignored} ignored)",
                conflict.reason
            ),
        }
    }
}

/// A component left out of the plan, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedComponent {
    pub id: String,
    pub reason: String,
}

/// Ordered install steps: dependencies always precede dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallationPlan {
    pub steps: Vec<PlannedComponent>,
    pub warnings: Vec<PlanWarning>,
    pub excluded: Vec<ExcludedComponent>,
}

impl InstallationPlan {
    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&PlannedComponent> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub policy: ResolutionPolicy,
}

/// Plan the installation of `requested` against `catalog`.
///
/// # Errors
///
/// Returns a [`GraphError`] listing every cycle, missing requested id and
/// unresolvable conflict. Its partial plan covers the unaffected components.
pub fn plan_installation<S: AsRef<str>>(requested: &[S], catalog: &Catalog) -> Result<InstallationPlan, GraphError> {
    plan_installation_with(requested, catalog, PlanOptions::default())
}

pub fn plan_installation_with<S: AsRef<str>>(
    requested: &[S],
    catalog: &Catalog,
    options: PlanOptions,
) -> Result<InstallationPlan, GraphError> {
    let graph = DependencyGraph::expand(requested, catalog);
    let mut issues: Vec<GraphIssue> = Vec::new();
    let mut warnings: Vec<PlanWarning> = Vec::new();
    let mut exclusions = Exclusions::default();

    for missing in graph.missing() {
        if missing.requested {
            issues.push(GraphIssue::MissingDependency {
                id: missing.id.clone(),
                required_by: missing.required_by.clone(),
            });
            exclusions.add(&missing.id, "not found in catalog".to_string());
        } else {
            warnings.push(PlanWarning::MissingDependency {
                id: missing.id.clone(),
                required_by: missing.required_by.clone(),
            });
        }
    }

    for cycle in detect_cycles(&graph) {
        let path = cycle.join(" -> ");
        for member in &cycle {
            exclusions.add(member, format!("member of dependency cycle {path}"));
        }
        exclusions.add_dependents(&graph, &cycle, &format!("depends on dependency cycle {path}"));
        issues.push(GraphIssue::CycleDetected { cycle });
    }

    let mut overrides: HashMap<String, Version> = HashMap::new();
    for conflict in detect_version_conflicts_with(&graph, options.policy) {
        match &conflict.suggestion {
            Resolution::Unresolvable { .. } => {
                let roots = blocked_by(&graph, &conflict);
                for root in &roots {
                    exclusions.add(root, format!("unresolvable conflict: {}", conflict.reason));
                }
                exclusions.add_dependents(
                    &graph,
                    &roots,
                    &format!("depends on a component in unresolvable conflict: {}", conflict.reason),
                );
                issues.push(GraphIssue::UnresolvableConflict(Box::new(conflict)));
            }
            Resolution::UseAvailable { component, version } => match overrides.get(component) {
                Some(kept) if kept != version => {
                    warnings.push(PlanWarning::OverrideConflict {
                        component: component.clone(),
                        kept: kept.clone(),
                        ignored: version.clone(),
                        conflict: Box::new(conflict.clone()),
                    });
                }
                _ => {
                    overrides.insert(component.clone(), version.clone());
                    warnings.push(PlanWarning::ConflictResolved {
                        conflict: Box::new(conflict.clone()),
                    });
                }
            },
            Resolution::Pin { .. } => {
                warnings.push(PlanWarning::ConflictResolved {
                    conflict: Box::new(conflict),
                });
            }
        }
    }

    let order = order_where(&graph, |id| !exclusions.contains(id));
    let steps: Vec<PlannedComponent> = order
        .into_iter()
        .filter_map(|id| {
            let node = graph.node(&id)?;
            Some(PlannedComponent {
                version: overrides.get(&id).cloned().unwrap_or_else(|| node.version.clone()),
                dependencies: graph
                    .dependencies_of(&id)
                    .iter()
                    .map(|e| e.dependency.clone())
                    .collect(),
                requested: graph.is_requested(&id),
                id,
            })
        })
        .collect();

    let plan = InstallationPlan {
        steps,
        warnings,
        excluded: exclusions.into_sorted(&graph),
    };

    for warning in &plan.warnings {
        tracing::warn!(%warning, "Planning warning");
    }

    if issues.is_empty() {
        tracing::info!(steps = plan.len(), "Installation plan ready");
        return Ok(plan);
    }
    for issue in &issues {
        tracing::error!(%issue, "Planning issue");
    }
    tracing::info!(
        steps = plan.len(),
        excluded = plan.excluded.len(),
        "Partial installation plan ready"
    );
    Err(GraphError { issues, partial: plan })
}

/// Components that cannot be planned while `conflict` stands.
fn blocked_by(graph: &DependencyGraph, conflict: &ConflictRecord) -> Vec<String> {
    match (&conflict.kind, &conflict.dependency) {
        (ConflictKind::UnsatisfiedBySelection, Some(dep)) => {
            let Some(node) = graph.node(dep) else {
                return Vec::new();
            };
            graph
                .dependents_of(dep)
                .iter()
                .filter(|e| !e.constraint.satisfies_version(&node.version))
                .map(|e| e.dependent.clone())
                .collect()
        }
        _ => conflict.implicated().into_iter().map(str::to_string).collect(),
    }
}

#[derive(Default)]
struct Exclusions {
    entries: Vec<ExcludedComponent>,
    ids: HashSet<String>,
}

impl Exclusions {
    /// Record an exclusion; the first reason given for an id is kept.
    fn add(&mut self, id: &str, reason: String) {
        if self.ids.insert(id.to_string()) {
            self.entries.push(ExcludedComponent {
                id: id.to_string(),
                reason,
            });
        }
    }

    fn add_dependents(&mut self, graph: &DependencyGraph, roots: &[String], reason: &str) {
        let mut dependents: Vec<String> = graph
            .transitive_dependents(roots.iter().map(String::as_str))
            .into_iter()
            .collect();
        dependents.sort();
        for id in dependents {
            self.add(&id, reason.to_string());
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn into_sorted(mut self, graph: &DependencyGraph) -> Vec<ExcludedComponent> {
        self.entries
            .sort_by(|a, b| {
                let pa = graph.position(&a.id).unwrap_or(usize::MAX);
                let pb = graph.position(&b.id).unwrap_or(usize::MAX);
                pa.cmp(&pb).then_with(|| a.id.cmp(&b.id))
            });
        self.entries
    }
}
