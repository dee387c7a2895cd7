//! Installation report

use chrono::{DateTime, Utc};
use prov_catalog::Version;
use prov_rollback::RollbackOutcome;
use serde::Serialize;
use uuid::Uuid;

use crate::error::InstallError;
use crate::state::StateHistory;

/// Terminal status of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    Success,
    FailedRolledBack,
    Skipped,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComponentStatus::Success => "SUCCESS",
            ComponentStatus::FailedRolledBack => "FAILED_ROLLED_BACK",
            ComponentStatus::Skipped => "SKIPPED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SkipReason {
    /// Verification already passes; counts as satisfied for dependents.
    AlreadyInstalled,
    /// A dependency did not end in success.
    DependencyNotSatisfied { dependency: String },
    /// Left out of the plan by the analyzer.
    Excluded { reason: String },
    Cancelled,
    DryRun,
}

impl SkipReason {
    /// Whether the skip leaves the component usable by its dependents.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, SkipReason::AlreadyInstalled)
    }
}

/// Outcome for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentResult {
    pub id: String,
    pub version: Option<Version>,
    pub status: ComponentStatus,
    /// Human-readable reason for the status.
    pub detail: String,
    pub skip_reason: Option<SkipReason>,
    pub error: Option<InstallError>,
    pub states: StateHistory,
    pub rollback: Option<RollbackOutcome>,
}

impl ComponentResult {
    pub(crate) fn skipped(id: &str, version: Option<Version>, reason: SkipReason, detail: String) -> Self {
        let mut states = StateHistory::default();
        let advanced = states.advance(crate::state::ComponentState::Skipped);
        debug_assert!(advanced.is_ok(), "a fresh history always accepts Skipped");
        Self {
            id: id.to_string(),
            version,
            status: ComponentStatus::Skipped,
            detail,
            skip_reason: Some(reason),
            error: None,
            states,
            rollback: None,
        }
    }

    /// Whether dependents of this component may proceed.
    pub fn is_satisfied(&self) -> bool {
        match self.status {
            ComponentStatus::Success => true,
            ComponentStatus::Skipped => self.skip_reason.as_ref().is_some_and(SkipReason::is_satisfied),
            ComponentStatus::FailedRolledBack => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    Success,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub already_installed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// One entry per component, in execution order; excluded components last.
    pub results: Vec<ComponentResult>,
    pub rollbacks: Vec<RollbackOutcome>,
    pub warnings: Vec<String>,
}

impl InstallationReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            results: Vec::new(),
            rollbacks: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn result(&self, id: &str) -> Option<&ComponentResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn status(&self, id: &str) -> Option<ComponentStatus> {
        self.result(id).map(|r| r.status)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for result in &self.results {
            match result.status {
                ComponentStatus::Success => summary.succeeded += 1,
                ComponentStatus::FailedRolledBack => summary.failed += 1,
                ComponentStatus::Skipped => {
                    summary.skipped += 1;
                    if result.skip_reason == Some(SkipReason::AlreadyInstalled) {
                        summary.already_installed += 1;
                    }
                }
            }
        }
        summary
    }

    /// Whole-run verdict. Some failures next to some successes is a
    /// partial success, not a failure.
    pub fn outcome(&self) -> RunOutcome {
        let blocked = self
            .results
            .iter()
            .filter(|r| match (&r.status, &r.skip_reason) {
                (ComponentStatus::FailedRolledBack, _) => true,
                (ComponentStatus::Skipped, Some(reason)) => {
                    !matches!(reason, SkipReason::AlreadyInstalled | SkipReason::DryRun)
                }
                _ => false,
            })
            .count();
        if blocked == 0 {
            return RunOutcome::Success;
        }
        if self.results.iter().any(|r| r.is_satisfied()) {
            RunOutcome::PartialSuccess
        } else {
            RunOutcome::Failed
        }
    }
}

impl std::fmt::Display for InstallationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for result in &self.results {
            writeln!(f, "{:<24} {:<20} {}", result.id, result.status.to_string(), result.detail)?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        let summary = self.summary();
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        )
    }
}
