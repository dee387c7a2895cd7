//! Post-install verification

use async_trait::async_trait;
use prov_catalog::{Component, Version};
use serde::Serialize;
use tokio::process::Command;

/// Outcome of verifying one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub ok: bool,
    pub issues: Vec<String>,
}

impl Verification {
    pub fn passed() -> Self {
        Self {
            ok: true,
            issues: Vec::new(),
        }
    }

    pub fn failed(issue: impl Into<String>) -> Self {
        Self {
            ok: false,
            issues: vec![issue.into()],
        }
    }
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, component: &Component, version: &Version) -> Verification;
}

/// Checks a component's declared [`VerifySpec`](prov_catalog::VerifySpec):
/// required paths must exist and the verify command must exit zero, with
/// `expect_output` (after `{version}` substitution) present in its stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecVerifier;

#[async_trait]
impl Verifier for SpecVerifier {
    async fn verify(&self, component: &Component, version: &Version) -> Verification {
        let spec = &component.verify;
        let mut issues = Vec::new();

        for path in &spec.paths {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                issues.push(format!("missing path {}", path.display()));
            }
        }

        if let Some((program, args)) = spec.command.split_first() {
            match Command::new(program).args(args).output().await {
                Ok(output) if output.status.success() => {
                    if let Some(expected) = &spec.expect_output {
                        let expected = expected.replace("{version}", &version.to_string());
                        let stdout = String::from_utf8_lossy(&output.stdout);
                        if !stdout.contains(&expected) {
                            issues.push(format!("'{}' output does not contain '{expected}'", spec.command.join(" ")));
                        }
                    }
                }
                Ok(output) => issues.push(format!(
                    "'{}' exited with {}",
                    spec.command.join(" "),
                    output.status.code().unwrap_or(-1)
                )),
                Err(e) => issues.push(format!("failed to run '{program}': {e}")),
            }
        }

        tracing::debug!(component = %component.id, issues = issues.len(), "Verification finished");
        Verification {
            ok: issues.is_empty(),
            issues,
        }
    }
}
