//! Install-method handlers and their registry

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use prov_catalog::{Component, Version};
use prov_rollback::TransactionScope;

/// Error type handlers may return; any error converts with `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a handler sees while installing one component.
pub struct InstallContext<'a> {
    pub component: &'a Component,
    /// Version selected by the planner; may differ from the catalog default.
    pub version: &'a Version,
    /// Artifact fetched ahead of time, if the component declares a source.
    pub artifact: Option<&'a Path>,
    /// Per-component staging directory.
    pub staging_dir: &'a Path,
    /// The component's open transaction. Every reversible action must be
    /// registered here before or as it is performed.
    pub transaction: TransactionScope<'a>,
}

impl InstallContext<'_> {
    /// Placeholder values for the catalog rollback template.
    pub fn bindings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.component.id.clone()),
            ("version", self.version.to_string()),
            ("staging", self.staging_dir.display().to_string()),
        ]
    }

    /// Register the component's catalog rollback template.
    pub fn register_rollback_template(&mut self) -> prov_rollback::Result<()> {
        let owned = self.bindings();
        let bindings: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.transaction
            .register_template(&self.component.rollback, &bindings)
    }
}

/// Performs one install method's side effects.
#[async_trait]
pub trait InstallHandler: Send + Sync {
    /// The install-method tag this handler serves.
    fn tag(&self) -> &str;

    async fn install(&self, context: &mut InstallContext<'_>) -> Result<(), HandlerError>;
}

/// Maps install-method tags to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn InstallHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own tag, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn InstallHandler>) {
        let tag = handler.tag().to_string();
        if self.handlers.insert(tag.clone(), handler).is_some() {
            tracing::debug!(%tag, "Replaced install handler");
        }
    }

    pub fn with(mut self, handler: Arc<dyn InstallHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn InstallHandler>> {
        self.handlers.get(tag).cloned()
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").field("tags", &self.tags()).finish()
    }
}
