//! Telemetry events

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::report::ComponentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Fetch,
    Install,
    Verify,
    Rollback,
    PostInstall,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub stage: Stage,
    pub component_id: String,
    pub status: Option<ComponentStatus>,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl TelemetryEvent {
    pub fn new(stage: Stage, component_id: impl Into<String>) -> Self {
        Self {
            stage,
            component_id: component_id.into(),
            status: None,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_status(mut self, status: ComponentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives stage events. Errors are logged and otherwise ignored.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            target: "prov::telemetry",
            stage = ?event.stage,
            component = %event.component_id,
            status = ?event.status,
            timestamp = %event.timestamp.to_rfc3339(),
            detail = event.detail.as_deref().unwrap_or(""),
            "Telemetry event"
        );
        Ok(())
    }
}
