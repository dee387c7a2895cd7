//! Component records: the immutable unit the catalog hands out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::version::{VersionConstraint, parse_version};

/// A dependency edge as declared by the dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    #[serde(default)]
    pub constraint: VersionConstraint,
}

impl Dependency {
    pub fn new(id: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            id: id.into(),
            constraint,
        }
    }
}

/// A declared mutual exclusion with another component.
///
/// The exclusion only applies when the other component's selected version
/// satisfies `constraint`; `*` excludes every version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredConflict {
    pub id: String,
    #[serde(default)]
    pub constraint: VersionConstraint,
}

/// Which install-method handler performs this component's side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMethod {
    pub tag: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl InstallMethod {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Post-install verification requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySpec {
    /// Paths that must exist once the component is installed.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Command whose successful exit proves the install, e.g. `["node", "--version"]`.
    #[serde(default)]
    pub command: Vec<String>,
    /// Substring expected in the command's stdout. `{version}` is substituted.
    #[serde(default)]
    pub expect_output: Option<String>,
}

impl VerifySpec {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.command.is_empty()
    }
}

/// Where the component's artifact is fetched from before installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub url: String,
    /// Expected SHA-256 digest, lowercase hex.
    pub sha256: String,
}

/// A single templated undo step.
///
/// Placeholders such as `{id}`, `{version}` and `{staging}` are substituted
/// by [`RollbackTemplate::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RollbackStep {
    DeletePath {
        path: String,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Undo steps declared in the catalog for a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollbackTemplate {
    pub steps: Vec<RollbackStep>,
}

impl RollbackTemplate {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Substitute `{name}` placeholders in every step.
    pub fn render(&self, bindings: &[(&str, &str)]) -> Vec<RollbackStep> {
        let subst = |s: &str| {
            bindings.iter().fold(s.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        };
        self.steps
            .iter()
            .map(|step| match step {
                RollbackStep::DeletePath { path } => RollbackStep::DeletePath { path: subst(path) },
                RollbackStep::Command { program, args } => RollbackStep::Command {
                    program: subst(program),
                    args: args.iter().map(|a| subst(a)).collect(),
                },
            })
            .collect()
    }
}

/// A command run after a successful install. Failures are warnings only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInstallCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Runtime,
    Sdk,
    #[default]
    Tool,
    Library,
}

/// An installable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(deserialize_with = "de_version")]
    pub version: Version,
    /// Other versions the install method can provide.
    #[serde(default, deserialize_with = "de_versions")]
    pub available_versions: Vec<Version>,
    #[serde(default, rename = "depends")]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub conflicts: Vec<DeclaredConflict>,
    pub install: InstallMethod,
    #[serde(default)]
    pub verify: VerifySpec,
    #[serde(default)]
    pub rollback: RollbackTemplate,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub source: Option<FetchSpec>,
    #[serde(default)]
    pub post_install: Vec<PostInstallCommand>,
}

impl Component {
    pub fn new(id: impl Into<String>, version: Version, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version,
            available_versions: Vec::new(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            install: InstallMethod::new(method),
            verify: VerifySpec::default(),
            rollback: RollbackTemplate::default(),
            category: Category::default(),
            priority: 0,
            source: None,
            post_install: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>, constraint: VersionConstraint) -> Self {
        self.dependencies.push(Dependency::new(id, constraint));
        self
    }

    pub fn with_conflict(mut self, id: impl Into<String>, constraint: VersionConstraint) -> Self {
        self.conflicts.push(DeclaredConflict {
            id: id.into(),
            constraint,
        });
        self
    }

    pub fn with_available_versions(mut self, versions: impl IntoIterator<Item = Version>) -> Self {
        self.available_versions.extend(versions);
        self
    }

    pub fn with_verify(mut self, verify: VerifySpec) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_source(mut self, source: FetchSpec) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_post_install(mut self, command: PostInstallCommand) -> Self {
        self.post_install.push(command);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Every version this component can be installed at, ascending.
    pub fn versions(&self) -> Vec<Version> {
        let mut versions = self.available_versions.clone();
        versions.push(self.version.clone());
        versions.sort();
        versions.dedup();
        versions
    }

    /// Reject records that can never be planned.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidComponent {
                id: self.id.clone(),
                reason: "component id must not be empty".to_string(),
            });
        }
        if self.install.tag.trim().is_empty() {
            return Err(Error::InvalidComponent {
                id: self.id.clone(),
                reason: "install method tag must not be empty".to_string(),
            });
        }
        if self.dependencies.iter().any(|d| d.id == self.id) {
            return Err(Error::InvalidComponent {
                id: self.id.clone(),
                reason: "component depends on itself".to_string(),
            });
        }
        Ok(())
    }
}

fn de_version<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Version, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_version(&raw).map_err(serde::de::Error::custom)
}

fn de_versions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Version>, D::Error> {
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|raw| parse_version(raw).map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_versions_sorted_and_deduplicated() {
        let component = Component::new("node", Version::new(20, 0, 0), "archive")
            .with_available_versions([
                Version::new(22, 1, 0),
                Version::new(18, 4, 0),
                Version::new(20, 0, 0),
            ]);
        assert_eq!(
            component.versions(),
            vec![
                Version::new(18, 4, 0),
                Version::new(20, 0, 0),
                Version::new(22, 1, 0)
            ]
        );
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let component = Component::new("jdk", Version::new(21, 0, 0), "archive")
            .with_dependency("jdk", VersionConstraint::any());
        assert!(matches!(
            component.validate(),
            Err(Error::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_method() {
        let component = Component::new("jdk", Version::new(21, 0, 0), " ");
        assert!(component.validate().is_err());
    }

    #[test]
    fn test_rollback_template_render() {
        let template = RollbackTemplate {
            steps: vec![
                RollbackStep::DeletePath {
                    path: "{staging}/{id}-{version}".to_string(),
                },
                RollbackStep::Command {
                    program: "pkgutil".to_string(),
                    args: vec!["--forget".to_string(), "{id}".to_string()],
                },
            ],
        };
        let rendered = template.render(&[("id", "go"), ("version", "1.22.0"), ("staging", "/tmp/s")]);
        assert_eq!(
            rendered[0],
            RollbackStep::DeletePath {
                path: "/tmp/s/go-1.22.0".to_string()
            }
        );
        assert_eq!(
            rendered[1],
            RollbackStep::Command {
                program: "pkgutil".to_string(),
                args: vec!["--forget".to_string(), "go".to_string()],
            }
        );
    }

    #[test]
    fn test_component_from_toml() {
        let toml = r#"
id = "android-sdk"
version = "34.0"
available_versions = ["33.0", "35.0"]
category = "sdk"
priority = 5

[install]
tag = "archive"
params = { dest = "/opt/android" }

[[depends]]
id = "jdk"
constraint = ">=17.0,<22.0"

[[conflicts]]
id = "android-sdk-legacy"

[verify]
paths = ["/opt/android/platform-tools"]
command = ["sdkmanager", "--version"]

[[rollback]]
kind = "delete-path"
path = "/opt/android"
"#;
        let component: Component = toml::from_str(toml).unwrap();
        assert_eq!(component.version, Version::new(34, 0, 0));
        assert_eq!(component.available_versions.len(), 2);
        assert_eq!(component.category, Category::Sdk);
        assert_eq!(component.dependencies[0].constraint.as_str(), ">=17.0,<22.0");
        assert!(component.conflicts[0].constraint.is_any());
        assert_eq!(component.install.param("dest"), Some("/opt/android"));
        assert_eq!(component.rollback.steps.len(), 1);
        assert!(!component.verify.is_empty());
    }
}
