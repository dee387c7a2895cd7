//! Error types for graph analysis and planning

use serde::Serialize;
use thiserror::Error;

use crate::conflict::ConflictRecord;
use crate::plan::InstallationPlan;

/// A single fatal planning finding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "kebab-case")]
pub enum GraphIssue {
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("requested component '{id}' is not in the catalog")]
    MissingDependency { id: String, required_by: Vec<String> },

    #[error("unresolvable conflict between '{}' and '{}': {}", .0.first.component, .0.second.component, .0.reason)]
    UnresolvableConflict(Box<ConflictRecord>),
}

/// A requested id that the catalog does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("components not found in catalog: {}", .missing.join(", "))]
pub struct MissingDependencyError {
    pub missing: Vec<String>,
}

/// Planning failed for at least part of the request.
///
/// Carries every fatal issue found, plus a plan covering the components
/// unaffected by them.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub issues: Vec<GraphIssue>,
    pub(crate) partial: InstallationPlan,
}

impl GraphError {
    pub fn cycles(&self) -> Vec<&[String]> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                GraphIssue::CycleDetected { cycle } => Some(cycle.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn missing_dependencies(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                GraphIssue::MissingDependency { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn unresolvable_conflicts(&self) -> Vec<&ConflictRecord> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                GraphIssue::UnresolvableConflict(record) => Some(record.as_ref()),
                _ => None,
            })
            .collect()
    }

    /// The plan for components no issue touches. Excluded ids are listed on it.
    pub fn partial_plan(&self) -> &InstallationPlan {
        &self.partial
    }

    pub fn into_partial_plan(self) -> InstallationPlan {
        self.partial
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "planning failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphError {}
