//! Installation orchestrator for the toolchain provisioner.
//!
//! The [`Orchestrator`] turns an [`InstallationPlan`](prov_graph::InstallationPlan)
//! into side effects, one component at a time, each inside its own
//! rollback transaction. A failing component is unwound and marked
//! `FAILED_ROLLED_BACK`; its dependents are skipped; unrelated components
//! still install. Everything ends up in an [`InstallationReport`].
//!
//! Install methods plug in through [`InstallHandler`]. Fetching,
//! verification, post-install commands and telemetry sit behind the
//! [`Fetcher`], [`Verifier`], [`PostInstallRunner`] and [`TelemetrySink`]
//! traits.

pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod logging;
pub mod options;
pub mod orchestrator;
pub mod post_install;
pub mod report;
pub mod state;
pub mod telemetry;
pub mod verify;

pub use config::{LoggingConfig, OrchestratorConfig, ProvisionConfig, ResolutionConfig};
pub use error::{Error, FetchError, InstallError, Result};
pub use fetch::{FileFetcher, Fetcher, sha256_hex};
pub use handler::{HandlerError, HandlerRegistry, InstallContext, InstallHandler};
pub use options::{DEFAULT_MAX_PARALLEL_FETCHES, ExecutionOptions};
pub use orchestrator::Orchestrator;
pub use post_install::{PostInstallRunner, ProcessPostInstall};
pub use report::{ComponentResult, ComponentStatus, InstallationReport, ReportSummary, RunOutcome, SkipReason};
pub use state::{ComponentState, InvalidTransition, StateHistory};
pub use telemetry::{Stage, TelemetryEvent, TelemetrySink, TracingTelemetry};
pub use verify::{SpecVerifier, Verification, Verifier};

pub use tokio_util::sync::CancellationToken;
