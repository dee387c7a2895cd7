//! Installation orchestrator.
//!
//! Executes an [`InstallationPlan`] one component at a time:
//!
//! 1. skip the component if cancelled, if a dependency is not satisfied, or
//!    if it is already verified-installed (unless forced)
//! 2. open a rollback transaction
//! 3. run the install-method handler
//! 4. verify
//! 5. on failure, roll back and mark `FAILED_ROLLED_BACK`
//! 6. on success, commit, mark `SUCCESS`, then run post-install commands
//!
//! Steps 2 to 6 run under one global install lock. Artifact fetches happen
//! before that, concurrently, through a bounded pool.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use prov_catalog::{Catalog, Component, Version};
use prov_graph::{GraphError, InstallationPlan, PlanOptions, PlannedComponent, plan_installation_with};
use prov_rollback::RollbackManager;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::{FetchError, InstallError};
use crate::fetch::{FileFetcher, Fetcher};
use crate::handler::{HandlerRegistry, InstallContext};
use crate::options::ExecutionOptions;
use crate::post_install::{PostInstallRunner, ProcessPostInstall};
use crate::report::{ComponentResult, ComponentStatus, InstallationReport, SkipReason};
use crate::state::{ComponentState, StateHistory};
use crate::telemetry::{Stage, TelemetryEvent, TelemetrySink, TracingTelemetry};
use crate::verify::{SpecVerifier, Verifier};

type Artifacts = HashMap<String, Result<PathBuf, FetchError>>;

pub struct Orchestrator {
    catalog: Arc<Catalog>,
    handlers: HandlerRegistry,
    fetcher: Arc<dyn Fetcher>,
    verifier: Arc<dyn Verifier>,
    post_install: Arc<dyn PostInstallRunner>,
    telemetry: Arc<dyn TelemetrySink>,
    plan_options: PlanOptions,
    /// The global install critical section.
    rollback: Arc<Mutex<RollbackManager>>,
}

impl Orchestrator {
    /// Create an orchestrator with the default collaborators.
    pub fn new(catalog: Arc<Catalog>, handlers: HandlerRegistry) -> Self {
        Self {
            catalog,
            handlers,
            fetcher: Arc::new(FileFetcher),
            verifier: Arc::new(SpecVerifier),
            post_install: Arc::new(ProcessPostInstall),
            telemetry: Arc::new(TracingTelemetry),
            plan_options: PlanOptions::default(),
            rollback: Arc::new(Mutex::new(RollbackManager::new())),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_post_install(mut self, runner: Arc<dyn PostInstallRunner>) -> Self {
        self.post_install = runner;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_plan_options(mut self, options: PlanOptions) -> Self {
        self.plan_options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle to the rollback manager guarding the install phase.
    pub fn rollback_manager(&self) -> Arc<Mutex<RollbackManager>> {
        self.rollback.clone()
    }

    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<InstallationPlan, GraphError> {
        plan_installation_with(requested, &self.catalog, self.plan_options)
    }

    /// Plan and execute. Planning issues become report warnings and the
    /// unaffected part of the request is still installed.
    pub async fn install<S: AsRef<str>>(&self, requested: &[S], options: &ExecutionOptions) -> InstallationReport {
        match self.plan(requested) {
            Ok(plan) => self.execute(&plan, options).await,
            Err(err) => {
                let mut report = self.execute(err.partial_plan(), options).await;
                report
                    .warnings
                    .extend(err.issues.iter().map(|issue| format!("planning: {issue}")));
                report
            }
        }
    }

    /// Execute `plan` and report every component's outcome.
    pub async fn execute(&self, plan: &InstallationPlan, options: &ExecutionOptions) -> InstallationReport {
        let mut report = InstallationReport::new(options.dry_run);
        report.warnings.extend(plan.warnings.iter().map(ToString::to_string));
        tracing::info!(
            run_id = %report.run_id,
            steps = plan.len(),
            dry_run = options.dry_run,
            "Executing installation plan"
        );

        if options.dry_run {
            for step in &plan.steps {
                report.results.push(ComponentResult::skipped(
                    &step.id,
                    Some(step.version.clone()),
                    SkipReason::DryRun,
                    format!("would install {} {}", step.id, step.version),
                ));
            }
        } else {
            let mut artifacts = self.prefetch(plan, options).await;
            let mut satisfied: HashSet<String> = HashSet::new();
            for step in &plan.steps {
                let (result, warnings) = self.run_step(step, options, &mut artifacts, &satisfied).await;
                if result.is_satisfied() {
                    satisfied.insert(step.id.clone());
                }
                self.emit(
                    TelemetryEvent::new(Stage::Complete, &step.id)
                        .with_status(result.status)
                        .with_detail(&result.detail),
                );
                report.warnings.extend(warnings);
                report.results.push(result);
            }
        }

        for excluded in &plan.excluded {
            report.results.push(ComponentResult::skipped(
                &excluded.id,
                None,
                SkipReason::Excluded {
                    reason: excluded.reason.clone(),
                },
                format!("excluded from plan: {}", excluded.reason),
            ));
        }

        report.rollbacks = report.results.iter().filter_map(|r| r.rollback.clone()).collect();
        report.finished_at = Some(Utc::now());
        let summary = report.summary();
        tracing::info!(
            run_id = %report.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            outcome = ?report.outcome(),
            "Installation finished"
        );
        report
    }

    /// Fetch every declared artifact into staging, at most
    /// `max_parallel_fetches` at a time.
    async fn prefetch(&self, plan: &InstallationPlan, options: &ExecutionOptions) -> Artifacts {
        let mut artifacts = Artifacts::new();
        if options.cancellation.is_cancelled() {
            return artifacts;
        }

        let semaphore = Arc::new(Semaphore::new(options.fetch_permits()));
        let mut set: JoinSet<(String, Result<PathBuf, FetchError>)> = JoinSet::new();
        for step in &plan.steps {
            let Some(source) = self.catalog.get(&step.id).and_then(|c| c.source.clone()) else {
                continue;
            };
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();
            let dest = staging_path(&options.staging_dir, &step.id, &step.version);
            let id = step.id.clone();
            self.emit(TelemetryEvent::new(Stage::Fetch, &id).with_detail(&source.url));
            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch(&source, &dest).await,
                    Err(e) => Err(FetchError::Network {
                        url: source.url.clone(),
                        message: e.to_string(),
                    }),
                };
                (id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, result)) => {
                    match &result {
                        Ok(path) => tracing::debug!(component = %id, path = %path.display(), "Prefetch complete"),
                        Err(e) => tracing::warn!(component = %id, error = %e, "Prefetch failed"),
                    }
                    artifacts.insert(id, result);
                }
                Err(e) => tracing::error!(error = %e, "Prefetch task aborted"),
            }
        }
        artifacts
    }

    async fn run_step(
        &self,
        step: &PlannedComponent,
        options: &ExecutionOptions,
        artifacts: &mut Artifacts,
        satisfied: &HashSet<String>,
    ) -> (ComponentResult, Vec<String>) {
        let version = Some(step.version.clone());
        if options.cancellation.is_cancelled() {
            tracing::info!(component = %step.id, "Skipping after cancellation");
            return (
                ComponentResult::skipped(&step.id, version, SkipReason::Cancelled, "installation cancelled".into()),
                Vec::new(),
            );
        }

        let Some(component) = self.catalog.get(&step.id) else {
            return (
                ComponentResult::skipped(
                    &step.id,
                    version,
                    SkipReason::Excluded {
                        reason: "not found in catalog".into(),
                    },
                    "not found in catalog".into(),
                ),
                Vec::new(),
            );
        };

        if let Some(dependency) = step.dependencies.iter().find(|d| !satisfied.contains(*d)) {
            tracing::info!(component = %step.id, %dependency, "Skipping: dependency not satisfied");
            return (
                ComponentResult::skipped(
                    &step.id,
                    version,
                    SkipReason::DependencyNotSatisfied {
                        dependency: dependency.clone(),
                    },
                    format!("dependency '{dependency}' was not installed"),
                ),
                Vec::new(),
            );
        }

        if !options.force && !component.verify.is_empty() {
            let check = self.verifier.verify(component, &step.version).await;
            if check.ok {
                tracing::info!(component = %step.id, version = %step.version, "Already installed");
                return (
                    ComponentResult::skipped(
                        &step.id,
                        version,
                        SkipReason::AlreadyInstalled,
                        format!("{} {} already installed", step.id, step.version),
                    ),
                    Vec::new(),
                );
            }
        }

        let artifact = match (artifacts.remove(&step.id), &component.source) {
            (Some(result), _) => Some(result),
            (None, Some(source)) => Some(Err(FetchError::Network {
                url: source.url.clone(),
                message: "artifact was not fetched".into(),
            })),
            (None, None) => None,
        };

        let mut manager = self.rollback.lock().await;
        self.install_one(component, &step.version, artifact, options, &mut manager)
            .await
    }

    /// Steps 2 to 6 for one component. The caller holds the install lock.
    async fn install_one(
        &self,
        component: &Component,
        version: &Version,
        artifact: Option<Result<PathBuf, FetchError>>,
        options: &ExecutionOptions,
        manager: &mut RollbackManager,
    ) -> (ComponentResult, Vec<String>) {
        let id = component.id.as_str();
        let mut states = StateHistory::default();
        self.advance(&mut states, id, ComponentState::Installing);
        let mut result = ComponentResult {
            id: id.to_string(),
            version: Some(version.clone()),
            status: ComponentStatus::FailedRolledBack,
            detail: String::new(),
            skip_reason: None,
            error: None,
            states: StateHistory::default(),
            rollback: None,
        };

        if let Err(e) = manager.start_transaction(id) {
            tracing::error!(component = %id, error = %e, "Could not open transaction");
            self.advance(&mut states, id, ComponentState::FailedRolledBack);
            result.detail = e.to_string();
            result.error = Some(e.into());
            result.states = states;
            return (result, Vec::new());
        }

        self.emit(TelemetryEvent::new(Stage::Install, id).with_detail(version.to_string()));
        let staging = staging_path(&options.staging_dir, id, version);
        let mut outcome = self
            .run_handler(component, version, artifact, &staging, manager)
            .await;

        if outcome.is_ok() {
            self.advance(&mut states, id, ComponentState::Verifying);
            self.emit(TelemetryEvent::new(Stage::Verify, id));
            let verification = self.verifier.verify(component, version).await;
            if !verification.ok {
                outcome = Err(InstallError::VerificationFailure {
                    issues: verification.issues,
                });
            }
        }

        let mut warnings = Vec::new();
        match settle(manager, id, outcome) {
            Ok(()) => {
                self.advance(&mut states, id, ComponentState::Success);
                result.status = ComponentStatus::Success;
                result.detail = format!("installed {id} {version}");
                tracing::info!(component = %id, %version, "Component installed");

                for command in &component.post_install {
                    self.emit(TelemetryEvent::new(Stage::PostInstall, id).with_detail(&command.program));
                    if let Err(message) = self.post_install.run(component, command).await {
                        tracing::warn!(component = %id, %message, "Post-install action failed");
                        warnings.push(format!("{id}: post-install '{}' failed: {message}", command.program));
                    }
                }
            }
            Err(error) => {
                tracing::warn!(component = %id, %error, "Install failed, rolling back");
                self.emit(TelemetryEvent::new(Stage::Rollback, id).with_detail(error.to_string()));
                let rollback = match manager.trigger_rollback(id) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        tracing::error!(component = %id, error = %e, "Rollback could not run");
                        None
                    }
                };
                self.advance(&mut states, id, ComponentState::FailedRolledBack);
                result.detail = match &rollback {
                    Some(r) if r.is_clean() => format!("{error}; rolled back {} step(s)", r.steps.len()),
                    Some(r) => format!(
                        "{error}; rolled back {} step(s), {} undo step(s) failed",
                        r.steps.len(),
                        r.failed().count()
                    ),
                    None => error.to_string(),
                };
                result.error = Some(error);
                result.rollback = rollback;
            }
        }

        result.states = states;
        (result, warnings)
    }

    async fn run_handler(
        &self,
        component: &Component,
        version: &Version,
        artifact: Option<Result<PathBuf, FetchError>>,
        staging: &Path,
        manager: &mut RollbackManager,
    ) -> Result<(), InstallError> {
        let artifact = artifact.transpose()?;
        let handler = self
            .handlers
            .get(&component.install.tag)
            .ok_or_else(|| InstallError::NoHandler {
                tag: component.install.tag.clone(),
            })?;
        let transaction = manager.scope(&component.id)?;
        let mut context = InstallContext {
            component,
            version,
            artifact: artifact.as_deref(),
            staging_dir: staging,
            transaction,
        };
        handler
            .install(&mut context)
            .await
            .map_err(|e| InstallError::HandlerFailure { message: e.to_string() })
    }

    fn advance(&self, states: &mut StateHistory, id: &str, next: ComponentState) {
        if let Err(e) = states.advance(next) {
            tracing::error!(component = %id, error = %e, "Invalid state transition");
        }
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Err(e) = self.telemetry.emit(&event) {
            tracing::debug!(error = %e, "Telemetry sink failed");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("components", &self.catalog.len())
            .field("handlers", &self.handlers)
            .field("plan_options", &self.plan_options)
            .finish()
    }
}

fn staging_path(root: &Path, id: &str, version: &Version) -> PathBuf {
    root.join(format!("{id}-{version}"))
}

/// Commit the transaction for `id` when every step passed. A commit that
/// fails turns the outcome into a failure.
fn settle(manager: &mut RollbackManager, id: &str, outcome: Result<(), InstallError>) -> Result<(), InstallError> {
    outcome?;
    manager.commit_transaction(id)?;
    Ok(())
}
