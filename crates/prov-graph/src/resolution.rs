//! Version-change search between a component's available versions.
//!
//! The compatibility graph links each available version to its sorted
//! neighbours and to the nearest version of the adjacent major lines. All
//! edges have the same weight, so a breadth-first search yields the fewest
//! version steps. Ties between equally short paths are broken by the
//! [`ResolutionPolicy`]: by default upgrades win over downgrades, and then
//! the smaller change wins.

use std::cmp::Ordering;
use std::collections::HashMap;

use prov_catalog::Version;
use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictKind, ConflictRecord};
use crate::graph::DependencyGraph;

/// Tie-break policy for picking between candidate versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Prefer moving to a newer version when both directions are possible.
    pub prefer_upgrade: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            prefer_upgrade: true,
        }
    }
}

impl ResolutionPolicy {
    /// Order two candidates relative to `current`; the smaller one is preferred.
    ///
    /// The current version always ranks first. Within one direction the
    /// candidate closer to `current` wins.
    pub fn compare(&self, current: &Version, a: &Version, b: &Version) -> Ordering {
        let direction = |v: &Version| match v.cmp(current) {
            Ordering::Equal => 0u8,
            Ordering::Greater if self.prefer_upgrade => 1,
            Ordering::Less if !self.prefer_upgrade => 1,
            _ => 2,
        };
        direction(a).cmp(&direction(b)).then_with(|| {
            if a > current {
                a.cmp(b)
            } else {
                b.cmp(a)
            }
        })
    }

    /// Pick the preferred candidate relative to `current`.
    pub fn choose<'a>(&self, current: &Version, candidates: impl IntoIterator<Item = &'a Version>) -> Option<&'a Version> {
        candidates.into_iter().min_by(|a, b| self.compare(current, a, b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    Upgrade,
    Downgrade,
}

/// One edge of the version-compatibility graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStep {
    pub component: String,
    pub from: Version,
    pub to: Version,
    pub direction: StepDirection,
}

fn neighbours(versions: &[Version], i: usize) -> Vec<usize> {
    let mut out = Vec::new();
    if i > 0 {
        out.push(i - 1);
    }
    if i + 1 < versions.len() {
        out.push(i + 1);
    }
    let major = versions[i].major;
    // Lowest version of the next major line.
    if let Some(j) = versions.iter().position(|v| v.major == major + 1) {
        out.push(j);
    }
    // Highest version of the previous major line.
    if major > 0
        && let Some(j) = versions.iter().rposition(|v| v.major == major - 1)
    {
        out.push(j);
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Shortest sequence of version steps that moves the conflicting
/// component to a version clearing the conflict.
///
/// Returns `Some(vec![])` when the current selection already clears it and
/// `None` when no available version does.
pub fn compute_resolution_path(graph: &DependencyGraph, conflict: &ConflictRecord) -> Option<Vec<VersionStep>> {
    compute_resolution_path_with(graph, conflict, ResolutionPolicy::default())
}

pub fn compute_resolution_path_with(
    graph: &DependencyGraph,
    conflict: &ConflictRecord,
    policy: ResolutionPolicy,
) -> Option<Vec<VersionStep>> {
    let target_id = conflict.target();
    let component = graph.node(target_id)?;
    let versions = component.versions();
    let start = versions.iter().position(|v| v == &component.version)?;

    let is_goal = |v: &Version| match conflict.kind {
        ConflictKind::MutualExclusion => !conflict.second.constraint.satisfies_version(v),
        ConflictKind::DisjointConstraints | ConflictKind::UnsatisfiedBySelection => {
            conflict.first.constraint.satisfies_version(v) && conflict.second.constraint.satisfies_version(v)
        }
    };

    if is_goal(&versions[start]) {
        return Some(Vec::new());
    }

    let current = &versions[start];
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut frontier = vec![start];
    let mut visited = vec![false; versions.len()];
    visited[start] = true;

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &node in &frontier {
            let mut adjacent = neighbours(&versions, node);
            adjacent.sort_by(|&a, &b| policy.compare(&versions[node], &versions[a], &versions[b]));
            for n in adjacent {
                if !visited[n] {
                    visited[n] = true;
                    parent.insert(n, node);
                    next.push(n);
                }
            }
        }

        let goals: Vec<&Version> = next.iter().map(|&i| &versions[i]).filter(|v| is_goal(v)).collect();
        if let Some(best) = policy.choose(current, goals) {
            let mut at = versions.iter().position(|v| v == best)?;
            let mut steps = Vec::new();
            while let Some(&prev) = parent.get(&at) {
                steps.push(VersionStep {
                    component: target_id.to_string(),
                    from: versions[prev].clone(),
                    to: versions[at].clone(),
                    direction: if versions[at] > versions[prev] {
                        StepDirection::Upgrade
                    } else {
                        StepDirection::Downgrade
                    },
                });
                at = prev;
            }
            steps.reverse();
            return Some(steps);
        }
        frontier = next;
    }

    None
}
