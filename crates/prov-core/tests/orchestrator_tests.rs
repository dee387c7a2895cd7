//! Orchestrator behaviour against scripted fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use prov_catalog::{Catalog, FetchSpec, VerifySpec};
use prov_core::{
    CancellationToken, ComponentState, ComponentStatus, HandlerError, HandlerRegistry, InstallContext, InstallError,
    InstallHandler, Orchestrator, RunOutcome, SkipReason, Stage,
};
use prov_rollback::TransactionState;
use prov_test_utils::{
    FakeFetcher, FakeSystem, FakeVerifier, RecordingTelemetry, Script, ScriptedHandler, catalog_of, component,
    constraint, staged_options,
};
use rstest::rstest;

fn orchestrator(catalog: Catalog, handler: ScriptedHandler, verifier: FakeVerifier, system: &FakeSystem) -> Orchestrator {
    Orchestrator::new(Arc::new(catalog), HandlerRegistry::new().with(Arc::new(handler)))
        .with_verifier(Arc::new(verifier))
        .with_telemetry(Arc::new(RecordingTelemetry::new(system)))
}

fn chain() -> Catalog {
    catalog_of(vec![
        component("c", "1.0"),
        component("b", "1.0").with_dependency("c", constraint("*")),
        component("a", "1.0").with_dependency("b", constraint("*")),
    ])
}

#[rstest]
#[case::leaf_requested(vec!["a"])]
#[case::whole_chain_requested(vec!["a", "b", "c"])]
#[tokio::test]
async fn test_verification_failure_rolls_back_and_skips_dependents(#[case] requested: Vec<&str>) {
    let system = FakeSystem::new();
    let handler = ScriptedHandler::new(&system).script("c", Script::succeed(3));
    let verifier = FakeVerifier::new(&system).failing("c");
    let orchestrator = orchestrator(chain(), handler, verifier, &system);
    let (_dir, options) = staged_options();

    let report = orchestrator.install(requested.as_slice(), &options).await;

    let order: Vec<_> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, ["c", "b", "a"]);

    assert_eq!(report.status("c"), Some(ComponentStatus::FailedRolledBack));
    assert_eq!(system.undo_log(), ["c:2", "c:1", "c:0"]);
    assert_eq!(
        report.result("b").unwrap().skip_reason,
        Some(SkipReason::DependencyNotSatisfied { dependency: "c".into() })
    );
    assert_eq!(
        report.result("a").unwrap().skip_reason,
        Some(SkipReason::DependencyNotSatisfied { dependency: "b".into() })
    );
    assert_eq!(system.install_calls(), ["c"]);
    assert!(matches!(
        report.result("c").unwrap().error,
        Some(InstallError::VerificationFailure { .. })
    ));
    assert_eq!(report.rollbacks.len(), 1);
    assert!(report.rollbacks[0].is_clean());
    assert_eq!(report.outcome(), RunOutcome::Failed);
}

#[rstest]
#[case::failing_first(["d", "e"])]
#[case::failing_last(["e", "d"])]
#[tokio::test]
async fn test_failure_isolated_from_unrelated_component(#[case] order: [&str; 2]) {
    let system = FakeSystem::new();
    let catalog = catalog_of(order.iter().map(|id| component(id, "1.0")).collect());
    let handler = ScriptedHandler::new(&system)
        .script("d", Script::fail_after(3, 2))
        .script("e", Script::succeed(2));
    let orchestrator = orchestrator(catalog, handler, FakeVerifier::new(&system), &system);
    let (_dir, options) = staged_options();

    let report = orchestrator.install(order.as_slice(), &options).await;

    assert_eq!(report.status("d"), Some(ComponentStatus::FailedRolledBack));
    assert_eq!(report.status("e"), Some(ComponentStatus::Success));
    assert_eq!(system.undo_log(), ["d:1", "d:0"]);
    assert_eq!(report.result("d").unwrap().rollback.as_ref().unwrap().steps.len(), 2);
    assert_eq!(report.outcome(), RunOutcome::PartialSuccess);

    let manager = orchestrator.rollback_manager();
    let manager = manager.lock().await;
    assert_eq!(manager.state("e"), Some(TransactionState::Committed));
    assert_eq!(manager.state("d"), Some(TransactionState::RolledBack));
}

#[tokio::test]
async fn test_cycle_never_reaches_handler() {
    let system = FakeSystem::new();
    let catalog = catalog_of(vec![
        component("x", "1.0").with_dependency("y", constraint("*")),
        component("y", "1.0").with_dependency("x", constraint("*")),
        component("z", "1.0"),
    ]);
    let orchestrator = orchestrator(catalog, ScriptedHandler::new(&system), FakeVerifier::new(&system), &system);

    let err = orchestrator.plan(&["x", "z"]).unwrap_err();
    let cycles = err.cycles();
    assert_eq!(cycles.len(), 1);
    let mut members = cycles[0].to_vec();
    members.sort();
    assert_eq!(members, ["x", "y"]);

    let (_dir, options) = staged_options();
    let report = orchestrator.install(&["x", "z"], &options).await;
    assert_eq!(system.install_calls(), ["z"]);
    assert_eq!(report.status("z"), Some(ComponentStatus::Success));
    assert!(matches!(
        report.result("x").unwrap().skip_reason,
        Some(SkipReason::Excluded { .. })
    ));
    assert!(report.warnings.iter().any(|w| w.starts_with("planning:")));
}

#[tokio::test]
async fn test_already_installed_satisfies_dependents() {
    let system = FakeSystem::new();
    system.mark_installed("git");
    let catalog = catalog_of(vec![
        component("git", "2.40").with_verify(VerifySpec {
            command: vec!["git".into(), "--version".into()],
            ..VerifySpec::default()
        }),
        component("tool", "1.0").with_dependency("git", constraint(">=2.0")),
    ]);
    let orchestrator = orchestrator(catalog, ScriptedHandler::new(&system), FakeVerifier::new(&system), &system);
    let (_dir, options) = staged_options();

    let report = orchestrator.install(&["tool"], &options).await;

    assert_eq!(report.result("git").unwrap().skip_reason, Some(SkipReason::AlreadyInstalled));
    assert_eq!(report.status("tool"), Some(ComponentStatus::Success));
    assert_eq!(system.install_calls(), ["tool"]);
    assert_eq!(report.outcome(), RunOutcome::Success);

    let forced = orchestrator.install(&["tool"], &options.clone().with_force(true)).await;
    assert_eq!(forced.status("git"), Some(ComponentStatus::Success));
}

#[tokio::test]
async fn test_integrity_failure_rolls_back_before_handler() {
    let system = FakeSystem::new();
    let source = FetchSpec {
        url: "https://mirror.example/go.tar.gz".into(),
        sha256: "ab".repeat(32),
    };
    let catalog = catalog_of(vec![component("go", "1.22").with_source(source.clone())]);
    let orchestrator = orchestrator(catalog, ScriptedHandler::new(&system), FakeVerifier::new(&system), &system)
        .with_fetcher(Arc::new(FakeFetcher::default().corrupt(&source.url)));
    let (_dir, options) = staged_options();

    let report = orchestrator.install(&["go"], &options).await;

    let result = report.result("go").unwrap();
    assert_eq!(result.status, ComponentStatus::FailedRolledBack);
    assert!(matches!(result.error, Some(InstallError::IntegrityFailure { .. })));
    assert!(system.install_calls().is_empty());
    assert_eq!(
        result.states.states(),
        [
            ComponentState::Pending,
            ComponentState::Installing,
            ComponentState::FailedRolledBack
        ]
    );
}

#[tokio::test]
async fn test_prefetch_respects_parallel_limit() {
    let system = FakeSystem::new();
    let components = (0..6)
        .map(|n| {
            component(&format!("pkg{n}"), "1.0").with_source(FetchSpec {
                url: format!("https://mirror.example/pkg{n}.tar.gz"),
                sha256: "00".repeat(32),
            })
        })
        .collect();
    let fetcher = Arc::new(FakeFetcher::new(Duration::from_millis(20)));
    let orchestrator = orchestrator(
        catalog_of(components),
        ScriptedHandler::new(&system),
        FakeVerifier::new(&system),
        &system,
    )
    .with_fetcher(fetcher.clone());
    let (_dir, mut options) = staged_options();
    options.max_parallel_fetches = 2;

    let ids: Vec<String> = (0..6).map(|n| format!("pkg{n}")).collect();
    let report = orchestrator.install(ids.as_slice(), &options).await;

    assert_eq!(report.summary().succeeded, 6);
    assert_eq!(fetcher.fetched().len(), 6);
    assert!(fetcher.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_telemetry_failures_do_not_affect_install() {
    let system = FakeSystem::new();
    let orchestrator = Orchestrator::new(
        Arc::new(chain()),
        HandlerRegistry::new().with(Arc::new(ScriptedHandler::new(&system))),
    )
    .with_verifier(Arc::new(FakeVerifier::new(&system)))
    .with_telemetry(Arc::new(RecordingTelemetry::new(&system).failing()));
    let (_dir, options) = staged_options();

    let report = orchestrator.install(&["a"], &options).await;

    assert_eq!(report.summary().succeeded, 3);
    let completions: Vec<_> = system
        .events()
        .into_iter()
        .filter(|e| e.stage == Stage::Complete)
        .map(|e| (e.component_id, e.status))
        .collect();
    assert_eq!(
        completions,
        [
            ("c".to_string(), Some(ComponentStatus::Success)),
            ("b".to_string(), Some(ComponentStatus::Success)),
            ("a".to_string(), Some(ComponentStatus::Success)),
        ]
    );
}

#[tokio::test]
async fn test_post_install_failure_is_a_warning() {
    let system = FakeSystem::new();
    let catalog = catalog_of(vec![component("node", "20.11").with_post_install(
        prov_catalog::PostInstallCommand {
            program: "definitely-not-a-real-program-xyz".into(),
            args: vec![],
        },
    )]);
    let orchestrator = orchestrator(catalog, ScriptedHandler::new(&system), FakeVerifier::new(&system), &system);
    let (_dir, options) = staged_options();

    let report = orchestrator.install(&["node"], &options).await;

    assert_eq!(report.status("node"), Some(ComponentStatus::Success));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("post-install"));
}

#[tokio::test]
async fn test_cancellation_between_components() {
    let system = FakeSystem::new();
    let catalog = catalog_of(vec![component("one", "1.0"), component("two", "1.0")]);
    let orchestrator = orchestrator(catalog, ScriptedHandler::new(&system), FakeVerifier::new(&system), &system);
    let (_dir, options) = staged_options();

    let plan = orchestrator.plan(&["one", "two"]).unwrap();
    let first = orchestrator.execute(&plan, &options).await;
    assert_eq!(first.summary().succeeded, 2);

    options.cancellation.cancel();
    let second = orchestrator.execute(&plan, &options).await;
    assert!(second.results.iter().all(|r| r.skip_reason == Some(SkipReason::Cancelled)));
    assert_eq!(system.install_calls(), ["one", "two"]);
}

/// Cancels the run from inside one component's install.
struct CancellingHandler {
    inner: ScriptedHandler,
    token: CancellationToken,
    cancel_during: &'static str,
}

#[async_trait]
impl InstallHandler for CancellingHandler {
    fn tag(&self) -> &str {
        self.inner.tag()
    }

    async fn install(&self, context: &mut InstallContext<'_>) -> Result<(), HandlerError> {
        if context.component.id == self.cancel_during {
            self.token.cancel();
        }
        self.inner.install(context).await
    }
}

#[tokio::test]
async fn test_cancellation_during_install_finishes_current_component() {
    let system = FakeSystem::new();
    let catalog = catalog_of(vec![component("one", "1.0"), component("two", "1.0")]);
    let (_dir, options) = staged_options();
    let handler = CancellingHandler {
        inner: ScriptedHandler::new(&system).script("one", Script::succeed(2)),
        token: options.cancellation.clone(),
        cancel_during: "one",
    };
    let orchestrator = Orchestrator::new(Arc::new(catalog), HandlerRegistry::new().with(Arc::new(handler)))
        .with_verifier(Arc::new(FakeVerifier::new(&system)));

    let report = orchestrator.install(&["one", "two"], &options).await;

    assert_eq!(report.status("one"), Some(ComponentStatus::Success));
    assert_eq!(report.status("two"), Some(ComponentStatus::Skipped));
    assert_eq!(report.result("two").unwrap().skip_reason, Some(SkipReason::Cancelled));
    assert_eq!(system.install_calls(), ["one"]);
    assert!(system.undo_log().is_empty());
    assert!(report.rollbacks.is_empty());

    let manager = orchestrator.rollback_manager();
    let manager = manager.lock().await;
    assert_eq!(manager.state("one"), Some(TransactionState::Committed));
    assert_eq!(manager.state("two"), None);
}

#[tokio::test]
async fn test_reports_are_deterministic() {
    let run = || async {
        let system = FakeSystem::new();
        let handler = ScriptedHandler::new(&system).script("b", Script::fail_after(2, 1));
        let orchestrator = orchestrator(chain(), handler, FakeVerifier::new(&system), &system);
        let (_dir, options) = staged_options();
        let report = orchestrator.install(&["a"], &options).await;
        report
            .results
            .iter()
            .map(|r| (r.id.clone(), r.status, r.detail.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run().await, run().await);
}
