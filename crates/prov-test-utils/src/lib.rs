//! Shared test utilities for the toolchain provisioner workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`catalog`] builders for catalogs, components and versions
//! - [`fakes`] scripted stand-ins for handlers, verification, fetching and
//!   telemetry, all reporting into one shared [`FakeSystem`]

pub mod catalog;
pub mod fakes;

pub use catalog::{FAKE_METHOD, catalog_of, component, constraint, version};
pub use fakes::{
    FakeFetcher, FakeSystem, FakeVerifier, RecordingTelemetry, RecordingUndo, Script, ScriptedHandler,
    staged_options,
};
