//! Provisioner configuration.
//!
//! Loaded from `.toml` or `.json`, chosen by file extension:
//!
//! ```toml
//! [orchestrator]
//! force = false
//! dry_run = false
//! max_parallel_fetches = 4
//! staging_dir = "/var/tmp/prov"
//!
//! [resolution]
//! prefer_upgrade = true
//!
//! [logging]
//! filter = "info,prov_core=debug"
//! ```

use std::path::{Path, PathBuf};

use prov_graph::{PlanOptions, ResolutionPolicy};
use serde::{Deserialize, Serialize};

use crate::options::{DEFAULT_MAX_PARALLEL_FETCHES, ExecutionOptions, default_staging_dir};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub orchestrator: OrchestratorConfig,
    pub resolution: ResolutionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub force: bool,
    pub dry_run: bool,
    pub max_parallel_fetches: usize,
    pub staging_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            staging_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub prefer_upgrade: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { prefer_upgrade: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ProvisionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            })?,
            _ => {
                return Err(Error::UnsupportedFormat {
                    extension: extension.to_string(),
                });
            }
        };
        tracing::debug!(path = %path.display(), "Loaded provisioner config");
        Ok(config)
    }

    /// Save atomically in the format implied by the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = match extension.to_lowercase().as_str() {
            "toml" => toml::to_string_pretty(self).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            })?,
            "json" => serde_json::to_string_pretty(self).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            })?,
            _ => {
                return Err(Error::UnsupportedFormat {
                    extension: extension.to_string(),
                });
            }
        };
        prov_rollback::io::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            force: self.orchestrator.force,
            dry_run: self.orchestrator.dry_run,
            max_parallel_fetches: self.orchestrator.max_parallel_fetches.max(1),
            staging_dir: self
                .orchestrator
                .staging_dir
                .clone()
                .unwrap_or_else(default_staging_dir),
            ..ExecutionOptions::default()
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            policy: ResolutionPolicy {
                prefer_upgrade: self.resolution.prefer_upgrade,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: ProvisionConfig = toml::from_str("").unwrap();
        assert_eq!(config, ProvisionConfig::default());
        assert_eq!(config.execution_options().max_parallel_fetches, 4);
        assert!(config.plan_options().policy.prefer_upgrade);
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prov.toml");
        std::fs::write(
            &path,
            "[orchestrator]\nforce = true\nmax_parallel_fetches = 0\nstaging_dir = \"/srv/stage\"\n\n[resolution]\nprefer_upgrade = false\n",
        )
        .unwrap();
        let config = ProvisionConfig::load(&path).unwrap();
        let options = config.execution_options();
        assert!(options.force);
        assert_eq!(options.max_parallel_fetches, 1);
        assert_eq!(options.staging_dir, PathBuf::from("/srv/stage"));
        assert!(!config.plan_options().policy.prefer_upgrade);
    }

    #[test]
    fn test_save_and_reload_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prov.json");
        let mut config = ProvisionConfig::default();
        config.logging.filter = "debug".to_string();
        config.save(&path).unwrap();
        assert_eq!(ProvisionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prov.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            ProvisionConfig::load(&path),
            Err(Error::UnsupportedFormat { .. })
        ));
    }
}
