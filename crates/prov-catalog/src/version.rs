//! Version constraint parsing, checking, and range arithmetic.
//!
//! Constraints are comma-separated specifiers that must all match:
//!
//! - `>=2.0,<3.0` (half-open range)
//! - `==1.75.0` or a bare `1.75.0` (exact)
//! - `!=3.11` (single excluded version)
//! - `*` or an empty string (any version)
//!
//! Catalog versions may be written as `major.minor`; the patch component
//! defaults to 0.
//!
//! # Examples
//!
//! ```
//! use prov_catalog::version::VersionConstraint;
//!
//! let a = VersionConstraint::parse(">=2.0,<3.0").unwrap();
//! let b = VersionConstraint::parse(">=1.0,<2.0").unwrap();
//! assert!(!a.overlaps(&b));
//!
//! let c = VersionConstraint::parse(">=1.8").unwrap();
//! assert!(a.overlaps(&c));
//! assert!(a.satisfies("2.4"));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// The original text is kept so conflict reports can surface it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    raw: String,
}

impl VersionConstraint {
    /// A constraint matching every version.
    pub fn any() -> Self {
        Self {
            specifiers: Vec::new(),
            raw: "*".to_string(),
        }
    }

    /// A constraint matching exactly `version`.
    pub fn exact(version: &Version) -> Self {
        Self {
            specifiers: vec![Specifier {
                op: CompareOp::Eq,
                version: version.clone(),
            }],
            raw: format!("=={version}"),
        }
    }

    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let trimmed = constraint.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let specifiers = trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_specifier)
            .collect::<Result<Vec<_>>>()?;

        if specifiers.is_empty() {
            return Err(Error::VersionConstraintParse {
                constraint: trimmed.to_string(),
                reason: "no specifiers".to_string(),
            });
        }

        Ok(Self {
            specifiers,
            raw: trimmed.to_string(),
        })
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match parse_version(version) {
            Ok(v) => self.satisfies_version(&v),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// The interval of versions accepted by this constraint.
    pub fn range(&self) -> VersionRange {
        let mut range = VersionRange::full();
        for spec in &self.specifiers {
            let v = spec.version.clone();
            match spec.op {
                CompareOp::Gte => range.tighten_lower(Bound::inclusive(v)),
                CompareOp::Gt => range.tighten_lower(Bound::exclusive(v)),
                CompareOp::Lte => range.tighten_upper(Bound::inclusive(v)),
                CompareOp::Lt => range.tighten_upper(Bound::exclusive(v)),
                CompareOp::Eq => {
                    range.tighten_lower(Bound::inclusive(v.clone()));
                    range.tighten_upper(Bound::inclusive(v));
                }
                CompareOp::Ne => range.exclude(v),
            }
        }
        range
    }

    /// Whether some version satisfies both constraints.
    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        !self.range().intersect(&other.range()).is_empty()
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A contiguous interval of versions with optional excluded points.
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
    excluded: Vec<Version>,
}

impl VersionRange {
    /// The range containing every version.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn lower(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    fn tighten_lower(&mut self, bound: Bound) {
        self.lower = Some(match self.lower.take() {
            None => bound,
            Some(current) => match current.version.cmp(&bound.version) {
                Ordering::Greater => current,
                Ordering::Less => bound,
                Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn tighten_upper(&mut self, bound: Bound) {
        self.upper = Some(match self.upper.take() {
            None => bound,
            Some(current) => match current.version.cmp(&bound.version) {
                Ordering::Less => current,
                Ordering::Greater => bound,
                Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn exclude(&mut self, version: Version) {
        if !self.excluded.contains(&version) {
            self.excluded.push(version);
        }
    }

    /// The range of versions contained in both `self` and `other`.
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        let mut out = self.clone();
        if let Some(lower) = &other.lower {
            out.tighten_lower(lower.clone());
        }
        if let Some(upper) = &other.upper {
            out.tighten_upper(upper.clone());
        }
        for version in &other.excluded {
            out.exclude(version.clone());
        }
        out
    }

    /// Whether no version can fall inside this range.
    pub fn is_empty(&self) -> bool {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return false;
        };
        match lower.version.cmp(&upper.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                !(lower.inclusive && upper.inclusive) || self.excluded.contains(&lower.version)
            }
        }
    }

    /// Whether `version` falls inside this range.
    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below_upper = match &self.upper {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above_lower && below_upper && !self.excluded.contains(version)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            None => f.write_str("(-inf")?,
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
        }
        f.write_str(", ")?;
        match &self.upper {
            None => f.write_str("+inf)")?,
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' })?,
        }
        for version in &self.excluded {
            write!(f, " \\ {version}")?;
        }
        Ok(())
    }
}

/// Parse a single specifier like `>=3.12` or `<3.13.0`.
fn parse_specifier(s: &str) -> Result<Specifier> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else if let Some(rest) = s.strip_prefix('=') {
        (CompareOp::Eq, rest)
    } else {
        (CompareOp::Eq, s)
    };

    let version = parse_version(version_str).map_err(|_| Error::VersionConstraintParse {
        constraint: s.to_string(),
        reason: format!("invalid version: {}", version_str.trim()),
    })?;

    Ok(Specifier { op, version })
}

/// Parse a catalog version, appending `.0` when the patch is omitted.
///
/// - `"3.12"` -> `3.12.0`
/// - `"3.12.1"` -> `3.12.1`
/// - `"3"` -> error
pub fn parse_version(s: &str) -> Result<Version> {
    let s = s.trim();

    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }

    Version::parse(&format!("{s}.0")).map_err(|e| Error::InvalidVersion {
        version: s.to_string(),
        reason: e.to_string(),
    })
}
