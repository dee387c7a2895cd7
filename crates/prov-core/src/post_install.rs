//! Best-effort post-install actions

use async_trait::async_trait;
use prov_catalog::{Component, PostInstallCommand};
use tokio::process::Command;

/// Runs post-install commands. A failure becomes a report warning; the
/// component's install has already been committed.
#[async_trait]
pub trait PostInstallRunner: Send + Sync {
    async fn run(&self, component: &Component, command: &PostInstallCommand) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPostInstall;

#[async_trait]
impl PostInstallRunner for ProcessPostInstall {
    async fn run(&self, component: &Component, command: &PostInstallCommand) -> Result<(), String> {
        tracing::debug!(component = %component.id, program = %command.program, "Running post-install command");
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .await
            .map_err(|e| format!("failed to run '{}': {e}", command.program))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "'{}' exited with {}: {}",
                command.program,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}
