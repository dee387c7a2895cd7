//! End-to-end provisioning scenarios.
//!
//! Each test loads a catalog from TOML, plans, and executes against a
//! temporary directory using the real fetcher, verifier and rollback
//! operations. Only the install method is defined here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use prov_catalog::Catalog;
use prov_core::{
    ComponentStatus, ExecutionOptions, HandlerError, HandlerRegistry, InstallContext, InstallError, InstallHandler,
    Orchestrator, ProvisionConfig, RunOutcome, SkipReason, sha256_hex,
};
use prov_graph::Resolution;
use prov_test_utils::{FakeSystem, FakeVerifier, Script, ScriptedHandler};
use tempfile::TempDir;

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Copies the fetched artifact into `params.dest`. With `params.marker`
/// set, also drops an untracked file into staging, which only the catalog
/// rollback template cleans up.
struct CopyHandler;

#[async_trait]
impl InstallHandler for CopyHandler {
    fn tag(&self) -> &str {
        "copy"
    }

    async fn install(&self, context: &mut InstallContext<'_>) -> Result<(), HandlerError> {
        context.register_rollback_template()?;
        let dest = PathBuf::from(context.component.install.param("dest").ok_or("missing 'dest' param")?);
        context.transaction.create_dir(&dest)?;

        if let Some(artifact) = context.artifact {
            let bytes = std::fs::read(artifact)?;
            let name = artifact.file_name().ok_or("artifact has no file name")?;
            context.transaction.write_file(&dest.join(name), &bytes)?;
        }
        if let Some(marker) = context.component.install.param("marker") {
            std::fs::create_dir_all(context.staging_dir)?;
            std::fs::write(context.staging_dir.join(marker), b"partial")?;
        }
        Ok(())
    }
}

/// A temporary machine: artifact mirror, install root, and staging area.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("mirror")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn opt(&self, name: &str) -> PathBuf {
        self.root().join("opt").join(name)
    }

    fn staging(&self) -> PathBuf {
        self.root().join("staging")
    }

    /// Publish an artifact and return its `file://` URL and digest.
    fn publish(&self, name: &str, content: &[u8]) -> (String, String) {
        let path = self.root().join("mirror").join(name);
        std::fs::write(&path, content).unwrap();
        (format!("file://{}", path.display()), sha256_hex(content))
    }

    /// Execution options read from a provisioner config file.
    fn options(&self) -> ExecutionOptions {
        let path = self.root().join("prov.toml");
        std::fs::write(
            &path,
            format!(
                "[orchestrator]\nmax_parallel_fetches = 2\nstaging_dir = '{}'\n",
                self.staging().display()
            ),
        )
        .unwrap();
        ProvisionConfig::load(&path).unwrap().execution_options()
    }

    fn orchestrator(&self, catalog: &str) -> Orchestrator {
        let catalog = Catalog::from_toml_str(catalog).unwrap();
        Orchestrator::new(Arc::new(catalog), HandlerRegistry::new().with(Arc::new(CopyHandler)))
    }
}

fn copy_component(id: &str, version: &str, dest: &Path, depends: &[(&str, &str)]) -> String {
    let mut out = format!(
        "[[component]]\nid = '{id}'\nversion = '{version}'\n\n[component.install]\ntag = 'copy'\nparams = {{ dest = '{}' }}\n",
        dest.display()
    );
    for (dep, constraint) in depends {
        out.push_str(&format!("\n[[component.depends]]\nid = '{dep}'\nconstraint = '{constraint}'\n"));
    }
    out
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_install_chain_then_rerun_is_idempotent() {
    let sandbox = Sandbox::new();
    let (url, digest) = sandbox.publish("jdk-17.tar", b"jdk bits");
    let jdk_dest = sandbox.opt("jdk");
    let sdk_dest = sandbox.opt("sdk");
    let catalog = format!(
        "{}\n[component.source]\nurl = '{url}'\nsha256 = '{digest}'\n\n[component.verify]\npaths = ['{}']\n\n{}\n[component.verify]\npaths = ['{}']\n",
        copy_component("jdk", "17.0", &jdk_dest, &[]),
        jdk_dest.join("jdk-17.tar").display(),
        copy_component("sdk", "34.0", &sdk_dest, &[("jdk", ">=17.0,<22.0")]),
        sdk_dest.display(),
    );
    let orchestrator = sandbox.orchestrator(&catalog);
    let options = sandbox.options();

    let report = orchestrator.install(&["sdk"], &options).await;

    assert_eq!(report.outcome(), RunOutcome::Success);
    let order: Vec<_> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, ["jdk", "sdk"]);
    assert_eq!(std::fs::read(jdk_dest.join("jdk-17.tar")).unwrap(), b"jdk bits");
    assert!(sdk_dest.is_dir());

    let rerun = orchestrator.install(&["sdk"], &options).await;
    assert_eq!(rerun.summary().already_installed, 2);
    assert_eq!(rerun.outcome(), RunOutcome::Success);
}

#[tokio::test]
async fn test_verification_failure_leaves_no_trace() {
    let sandbox = Sandbox::new();
    let (url, digest) = sandbox.publish("go.tar", b"go bits");
    let go_dest = sandbox.opt("go");
    let catalog = format!(
        "{}\n[component.source]\nurl = '{url}'\nsha256 = '{digest}'\n\n[component.verify]\npaths = ['{}']\n\n{}",
        copy_component("go", "1.22", &go_dest, &[]),
        go_dest.join("bin").join("go").display(),
        copy_component("gopls", "0.15", &sandbox.opt("gopls"), &[("go", ">=1.21")]),
    );
    let orchestrator = sandbox.orchestrator(&catalog);

    let report = orchestrator.install(&["gopls"], &sandbox.options()).await;

    let go = report.result("go").unwrap();
    assert_eq!(go.status, ComponentStatus::FailedRolledBack);
    assert!(matches!(go.error, Some(InstallError::VerificationFailure { .. })));
    assert!(!sandbox.root().join("opt").exists());
    assert_eq!(
        report.result("gopls").unwrap().skip_reason,
        Some(SkipReason::DependencyNotSatisfied { dependency: "go".into() })
    );
    assert_eq!(report.outcome(), RunOutcome::Failed);
}

#[tokio::test]
async fn test_digest_mismatch_fails_before_install() {
    let sandbox = Sandbox::new();
    let (url, _) = sandbox.publish("node.tar", b"node bits");
    let node_dest = sandbox.opt("node");
    let catalog = format!(
        "{}\n[component.source]\nurl = '{url}'\nsha256 = '{}'\n",
        copy_component("node", "20.11", &node_dest, &[]),
        "0".repeat(64),
    );
    let orchestrator = sandbox.orchestrator(&catalog);

    let report = orchestrator.install(&["node"], &sandbox.options()).await;

    assert!(matches!(
        report.result("node").unwrap().error,
        Some(InstallError::IntegrityFailure { .. })
    ));
    assert!(!node_dest.exists());
}

#[tokio::test]
async fn test_catalog_rollback_template_cleans_staging() {
    let sandbox = Sandbox::new();
    let dest = sandbox.opt("tool");
    let catalog = format!(
        "[[component]]\nid = 'tool'\nversion = '1.0'\n\n[component.install]\ntag = 'copy'\nparams = {{ dest = '{}', marker = 'half-done' }}\n\n[component.verify]\npaths = ['{}']\n\n[[component.rollback]]\nkind = 'delete-path'\npath = '{{staging}}'\n",
        dest.display(),
        dest.join("never-created").display(),
    );
    let orchestrator = sandbox.orchestrator(&catalog);

    let report = orchestrator.install(&["tool"], &sandbox.options()).await;

    let rollback = report.result("tool").unwrap().rollback.clone().unwrap();
    assert!(rollback.is_clean());
    assert_eq!(rollback.steps.len(), 2);
    assert!(!sandbox.staging().join("tool-1.0.0").exists());
}

#[tokio::test]
async fn test_dry_run_reports_plan_only() {
    let sandbox = Sandbox::new();
    let catalog = format!(
        "{}\n{}",
        copy_component("cmake", "3.28", &sandbox.opt("cmake"), &[]),
        copy_component("ninja", "1.11", &sandbox.opt("ninja"), &[("cmake", "*")]),
    );
    let orchestrator = sandbox.orchestrator(&catalog);
    let options = sandbox.options().with_dry_run(true);

    let report = orchestrator.install(&["ninja"], &options).await;

    assert!(report.dry_run);
    assert_eq!(report.result("cmake").unwrap().detail, "would install cmake 3.28.0");
    assert!(!sandbox.root().join("opt").exists());
}

// =============================================================================
// Planning outcomes surfaced in the report
// =============================================================================

#[tokio::test]
async fn test_unresolvable_conflict_blocks_only_its_roots() {
    let system = FakeSystem::new();
    let catalog = Catalog::from_toml_str(
        r#"
[[component]]
id = "lib"
version = "2.1"
available_versions = ["1.5"]
install = { tag = "fake" }

[[component]]
id = "new-app"
version = "1.0"
install = { tag = "fake" }
depends = [{ id = "lib", constraint = ">=2.0" }]

[[component]]
id = "old-app"
version = "1.0"
install = { tag = "fake" }
depends = [{ id = "lib", constraint = "<2.0" }]

[[component]]
id = "editor"
version = "1.0"
install = { tag = "fake" }
"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(catalog),
        HandlerRegistry::new().with(Arc::new(ScriptedHandler::new(&system))),
    )
    .with_verifier(Arc::new(FakeVerifier::new(&system)));

    let err = orchestrator.plan(&["new-app", "old-app", "editor"]).unwrap_err();
    let conflicts = err.unresolvable_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(conflicts[0].suggestion, Resolution::Unresolvable { .. }));

    let dir = TempDir::new().unwrap();
    let options = ExecutionOptions::default().with_staging_dir(dir.path());
    let report = orchestrator
        .install(&["new-app", "old-app", "editor"], &options)
        .await;

    assert_eq!(report.status("editor"), Some(ComponentStatus::Success));
    for app in ["new-app", "old-app"] {
        assert!(matches!(
            report.result(app).unwrap().skip_reason,
            Some(SkipReason::Excluded { .. })
        ));
    }
    assert!(!system.install_calls().iter().any(|id| id.ends_with("-app")));
    assert_eq!(report.outcome(), RunOutcome::PartialSuccess);
}

#[tokio::test]
async fn test_report_serializes_for_tooling() {
    let system = FakeSystem::new();
    let catalog = Catalog::from_toml_str(
        r#"
[[component]]
id = "python"
version = "3.12"
install = { tag = "fake" }

[[component]]
id = "poetry"
version = "1.8"
install = { tag = "fake" }
depends = [{ id = "python", constraint = ">=3.10" }]
"#,
    )
    .unwrap();
    let handler = ScriptedHandler::new(&system).script("poetry", Script::fail_after(2, 1));
    let orchestrator = Orchestrator::new(Arc::new(catalog), HandlerRegistry::new().with(Arc::new(handler)))
        .with_verifier(Arc::new(FakeVerifier::new(&system)));
    let dir = TempDir::new().unwrap();
    let options = ExecutionOptions::default().with_staging_dir(dir.path());

    let report = orchestrator.install(&["poetry"], &options).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["results"][0]["id"], "python");
    assert_eq!(json["results"][0]["status"], "SUCCESS");
    assert_eq!(json["results"][1]["status"], "FAILED_ROLLED_BACK");
    assert_eq!(json["results"][1]["error"]["kind"], "handler-failure");
    assert_eq!(json["rollbacks"][0]["steps"].as_array().unwrap().len(), 1);
    assert_eq!(system.undo_log(), ["poetry:0"]);
}
