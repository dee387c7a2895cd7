//! Scripted fakes for orchestrator tests.
//!
//! Every fake records into a shared [`FakeSystem`], so a test can assert on
//! the interleaving of install calls, undo steps and telemetry afterwards.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use prov_catalog::{Component, FetchSpec, Version};
use prov_core::{
    ExecutionOptions, FetchError, Fetcher, HandlerError, InstallContext, InstallHandler, TelemetryEvent,
    TelemetrySink, Verification, Verifier,
};
use prov_rollback::{UndoKind, UndoOperation};
use tempfile::TempDir;

use crate::catalog::FAKE_METHOD;

#[derive(Debug, Default)]
struct SystemState {
    installed: BTreeSet<String>,
    install_calls: Vec<String>,
    undo_log: Vec<String>,
    events: Vec<TelemetryEvent>,
}

/// Shared record of everything the fakes did.
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    state: Arc<Mutex<SystemState>>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SystemState> {
        self.state.lock().expect("FakeSystem: poisoned lock")
    }

    /// Pretend `id` is already present before the run.
    pub fn mark_installed(&self, id: &str) {
        self.lock().installed.insert(id.to_string());
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.lock().installed.contains(id)
    }

    /// Component ids whose handler ran, in call order.
    pub fn install_calls(&self) -> Vec<String> {
        self.lock().install_calls.clone()
    }

    /// Labels of applied undo operations, in application order.
    pub fn undo_log(&self) -> Vec<String> {
        self.lock().undo_log.clone()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock().events.clone()
    }

    /// A [`RecordingUndo`] that logs `label` into this system when applied.
    pub fn undo(&self, label: impl Into<String>) -> RecordingUndo {
        RecordingUndo {
            label: label.into(),
            system: self.clone(),
            fail: false,
        }
    }
}

/// Undo operation that only records that it ran.
#[derive(Debug)]
pub struct RecordingUndo {
    label: String,
    system: FakeSystem,
    fail: bool,
}

impl RecordingUndo {
    /// Make `apply` fail after recording.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl UndoOperation for RecordingUndo {
    fn kind(&self) -> UndoKind {
        UndoKind::Custom
    }

    fn describe(&self) -> String {
        format!("record {}", self.label)
    }

    fn apply(&self) -> prov_rollback::Result<()> {
        self.system.lock().undo_log.push(self.label.clone());
        if self.fail {
            return Err(prov_rollback::Error::CommandFailed {
                program: self.label.clone(),
                message: "scripted undo failure".to_string(),
            });
        }
        Ok(())
    }
}

/// What [`ScriptedHandler`] does for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script {
    /// Undo operations registered, labelled `"<id>:<n>"`.
    pub actions: usize,
    /// Fail once this many actions have been registered.
    pub fail_after: Option<usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self::succeed(1)
    }
}

impl Script {
    pub fn succeed(actions: usize) -> Self {
        Self {
            actions,
            fail_after: None,
        }
    }

    pub fn fail_after(actions: usize, fail_after: usize) -> Self {
        Self {
            actions,
            fail_after: Some(fail_after),
        }
    }
}

/// Install handler driven by per-component [`Script`]s.
///
/// On success the component is marked installed in the [`FakeSystem`].
#[derive(Debug, Clone)]
pub struct ScriptedHandler {
    tag: String,
    system: FakeSystem,
    scripts: HashMap<String, Script>,
}

impl ScriptedHandler {
    /// A handler for [`FAKE_METHOD`].
    pub fn new(system: &FakeSystem) -> Self {
        Self::with_tag(FAKE_METHOD, system)
    }

    pub fn with_tag(tag: &str, system: &FakeSystem) -> Self {
        Self {
            tag: tag.to_string(),
            system: system.clone(),
            scripts: HashMap::new(),
        }
    }

    pub fn script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }
}

#[async_trait]
impl InstallHandler for ScriptedHandler {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn install(&self, context: &mut InstallContext<'_>) -> Result<(), HandlerError> {
        let id = context.component.id.clone();
        self.system.lock().install_calls.push(id.clone());
        let script = self.scripts.get(&id).copied().unwrap_or_default();

        for n in 0..script.actions {
            if script.fail_after == Some(n) {
                return Err(format!("scripted failure in {id} after {n} action(s)").into());
            }
            context
                .transaction
                .register(Box::new(self.system.undo(format!("{id}:{n}"))))?;
        }
        if script.fail_after == Some(script.actions) {
            return Err(format!("scripted failure in {id} after {} action(s)", script.actions).into());
        }

        self.system.mark_installed(&id);
        Ok(())
    }
}

/// Passes for installed components, except those scripted to fail.
#[derive(Debug, Clone)]
pub struct FakeVerifier {
    system: FakeSystem,
    failing: HashSet<String>,
}

impl FakeVerifier {
    pub fn new(system: &FakeSystem) -> Self {
        Self {
            system: system.clone(),
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }
}

#[async_trait]
impl Verifier for FakeVerifier {
    async fn verify(&self, component: &Component, _version: &Version) -> Verification {
        if self.failing.contains(&component.id) {
            return Verification::failed(format!("{} failed scripted verification", component.id));
        }
        if self.system.is_installed(&component.id) {
            Verification::passed()
        } else {
            Verification::failed(format!("{} is not installed", component.id))
        }
    }
}

/// Fetcher that sleeps instead of downloading and tracks concurrency.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    delay: Duration,
    failing: HashSet<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fail fetches of `url` with an integrity error.
    pub fn corrupt(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Highest number of fetches observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().expect("FakeFetcher: poisoned lock").clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, spec: &FetchSpec, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.fetched
            .lock()
            .expect("FakeFetcher: poisoned lock")
            .push(spec.url.clone());

        if self.failing.contains(&spec.url) {
            return Err(FetchError::Integrity {
                url: spec.url.clone(),
                expected: spec.sha256.clone(),
                actual: "0".repeat(64),
            });
        }
        Ok(dest_dir.join("artifact"))
    }
}

/// Telemetry sink that records events, optionally failing every emit.
#[derive(Debug, Clone)]
pub struct RecordingTelemetry {
    system: FakeSystem,
    fail: bool,
}

impl RecordingTelemetry {
    pub fn new(system: &FakeSystem) -> Self {
        Self {
            system: system.clone(),
            fail: false,
        }
    }

    /// Record, then report an error from every emit.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.system.lock().events.push(event.clone());
        if self.fail {
            return Err("telemetry backend unavailable".into());
        }
        Ok(())
    }
}

/// Execution options staged in a fresh temporary directory.
pub fn staged_options() -> (TempDir, ExecutionOptions) {
    let dir = TempDir::new().expect("staged_options: failed to create temp dir");
    let options = ExecutionOptions::default().with_staging_dir(dir.path());
    (dir, options)
}
