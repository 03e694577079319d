// src/resolver/policy.rs

//! Resolution policy tables
//!
//! Published metadata is frequently wrong for specific packages. The
//! corrections live in a TOML table rather than in code:
//!
//! ```toml
//! host_prefix = "https://github.com/"
//!
//! [[repository_override]]
//! name = ["windows_i686_gnu", "windows_x86_64_gnu"]
//! version = "0.32.0"
//! repository = "https://github.com/microsoft/windows-rs"
//!
//! [[url_correction]]
//! from = "http://github.com/tailhook/quick-error"
//! to = "https://github.com/tailhook/quick-error"
//!
//! [[known_exception]]
//! name = "yansi"
//! version = "0.5.1"
//!
//! [[missing_lockfile]]
//! name = "libsqlite3-sys"
//!
//! [[subpath_correction]]
//! name = "anes"
//! versions = "=0.1.6"
//! path_in_vcs = "anes"
//! ```
//!
//! The built-in table is `policy/default.toml`.

use crate::error::{Error, Result};
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_POLICY: &str = include_str!("../../policy/default.toml");

/// Default accepted repository host
pub const DEFAULT_HOST_PREFIX: &str = "https://github.com/";

fn default_host_prefix() -> String {
    DEFAULT_HOST_PREFIX.to_string()
}

/// One package name or a list of them
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NameSet {
    One(String),
    Many(Vec<String>),
}

impl NameSet {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::One(n) => n == name,
            Self::Many(names) => names.iter().any(|n| n == name),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::One(n) => n.is_empty(),
            Self::Many(names) => names.is_empty() || names.iter().any(String::is_empty),
        }
    }
}

/// Selects packages by name and optionally by version
///
/// Every rule table carries `name` plus an optional exact `version` and an
/// optional semver `versions` requirement.
pub trait PackageMatcher {
    fn name(&self) -> &NameSet;

    /// Exact version string
    fn version(&self) -> Option<&str>;

    /// Version requirement; non-semver versions never match
    fn versions(&self) -> Option<&VersionReq>;

    fn matches(&self, name: &str, version: &str) -> bool {
        if !self.name().contains(name) {
            return false;
        }
        if let Some(exact) = self.version() {
            if exact != version {
                return false;
            }
        }
        if let Some(req) = self.versions() {
            match Version::parse(version) {
                Ok(v) if req.matches(&v) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Replace a package's declared repository URL
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryOverride {
    pub name: NameSet,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versions: Option<VersionReq>,
    pub repository: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Rewrite one exact URL literal
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlCorrection {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// A package singled out by a skip list
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageRule {
    pub name: NameSet,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versions: Option<VersionReq>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Replace the provenance subpath of a package
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubpathCorrection {
    pub name: NameSet,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versions: Option<VersionReq>,
    pub path_in_vcs: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// The full set of resolution tables
///
/// Unknown keys anywhere in the file are an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Only repositories under this origin are accepted
    #[serde(default = "default_host_prefix")]
    pub host_prefix: String,
    #[serde(default, rename = "repository_override")]
    pub repository_overrides: Vec<RepositoryOverride>,
    #[serde(default, rename = "url_correction")]
    pub url_corrections: Vec<UrlCorrection>,
    #[serde(default, rename = "known_exception")]
    pub known_exceptions: Vec<PackageRule>,
    #[serde(default, rename = "missing_lockfile")]
    pub missing_lockfiles: Vec<PackageRule>,
    #[serde(default, rename = "subpath_correction")]
    pub subpath_corrections: Vec<SubpathCorrection>,
}

impl PackageMatcher for RepositoryOverride {
    fn name(&self) -> &NameSet {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn versions(&self) -> Option<&VersionReq> {
        self.versions.as_ref()
    }
}

impl PackageMatcher for PackageRule {
    fn name(&self) -> &NameSet {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn versions(&self) -> Option<&VersionReq> {
        self.versions.as_ref()
    }
}

impl PackageMatcher for SubpathCorrection {
    fn name(&self) -> &NameSet {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn versions(&self) -> Option<&VersionReq> {
        self.versions.as_ref()
    }
}

impl Default for Policy {
    /// An empty policy: no corrections, default host
    fn default() -> Self {
        Self {
            host_prefix: default_host_prefix(),
            repository_overrides: Vec::new(),
            url_corrections: Vec::new(),
            known_exceptions: Vec::new(),
            missing_lockfiles: Vec::new(),
            subpath_corrections: Vec::new(),
        }
    }
}

impl Policy {
    /// The policy shipped with the tool
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_POLICY)
    }

    /// Load a policy file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::PolicyError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::PolicyError(msg) => Error::PolicyError(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse and validate policy TOML
    pub fn parse(content: &str) -> Result<Self> {
        let policy: Self =
            toml::from_str(content).map_err(|e| Error::PolicyError(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.host_prefix.starts_with("https://") || !self.host_prefix.ends_with('/') {
            return Err(Error::PolicyError(format!(
                "host_prefix must be an https:// origin ending in '/': {}",
                self.host_prefix
            )));
        }

        let names = self
            .repository_overrides
            .iter()
            .map(|r| &r.name)
            .chain(self.known_exceptions.iter().map(|r| &r.name))
            .chain(self.missing_lockfiles.iter().map(|r| &r.name))
            .chain(self.subpath_corrections.iter().map(|r| &r.name));
        for name in names {
            if name.is_empty() {
                return Err(Error::PolicyError("rule with an empty name".to_string()));
            }
        }

        for rule in &self.repository_overrides {
            if rule.repository.trim().is_empty() {
                return Err(Error::PolicyError(format!(
                    "repository_override for {:?} has an empty repository",
                    rule.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for correction in &self.url_corrections {
            if !seen.insert(correction.from.as_str()) {
                return Err(Error::PolicyError(format!(
                    "duplicate url_correction for {}",
                    correction.from
                )));
            }
        }

        Ok(())
    }

    pub fn repository_override(&self, name: &str, version: &str) -> Option<&RepositoryOverride> {
        self.repository_overrides
            .iter()
            .find(|r| r.matches(name, version))
    }

    /// Exact-match rewrite of a URL literal
    pub fn correct_url(&self, url: &str) -> Option<&str> {
        self.url_corrections
            .iter()
            .find(|c| c.from == url)
            .map(|c| c.to.as_str())
    }

    pub fn known_exception(&self, name: &str, version: &str) -> Option<&PackageRule> {
        self.known_exceptions
            .iter()
            .find(|r| r.matches(name, version))
    }

    pub fn missing_lockfile(&self, name: &str, version: &str) -> Option<&PackageRule> {
        self.missing_lockfiles
            .iter()
            .find(|r| r.matches(name, version))
    }

    pub fn subpath_correction(&self, name: &str, version: &str) -> Option<&SubpathCorrection> {
        self.subpath_corrections
            .iter()
            .find(|r| r.matches(name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_policy_loads() {
        let policy = Policy::builtin().unwrap();
        assert_eq!(policy.host_prefix, DEFAULT_HOST_PREFIX);
        assert!(policy.repository_override("crunchy", "0.2.2").is_some());
        assert!(policy.repository_override("windows_i686_gnu", "0.32.0").is_some());
        assert!(policy.repository_override("windows_i686_gnu", "0.48.0").is_none());
        assert_eq!(
            policy.correct_url("http://github.com/tailhook/quick-error"),
            Some("https://github.com/tailhook/quick-error")
        );
        assert!(policy.known_exception("yansi", "0.5.1").is_some());
        assert!(policy.known_exception("yansi", "1.0.0").is_none());
        assert!(policy.missing_lockfile("libsqlite3-sys", "0.27.0").is_some());
        assert!(
            policy
                .missing_lockfile("wasi", "0.11.0+wasi-snapshot-preview1")
                .is_some()
        );
        assert_eq!(
            policy
                .subpath_correction("anes", "0.1.6")
                .map(|c| c.path_in_vcs.as_str()),
            Some("anes")
        );
    }

    #[test]
    fn test_version_requirement_matching() {
        let policy = Policy::parse(
            r#"
            [[known_exception]]
            name = ["foo", "foo-derive"]
            versions = ">=1.2, <1.4"
            "#,
        )
        .unwrap();

        assert!(policy.known_exception("foo", "1.2.0").is_some());
        assert!(policy.known_exception("foo-derive", "1.3.9").is_some());
        assert!(policy.known_exception("foo", "1.4.0").is_none());
        assert!(policy.known_exception("bar", "1.2.0").is_none());
        assert!(policy.known_exception("foo", "not-semver").is_none());
    }

    #[test]
    fn test_exact_version_is_string_equality() {
        let rule = PackageRule {
            name: NameSet::One("wasi".to_string()),
            version: Some("0.11.0+wasi-snapshot-preview1".to_string()),
            versions: None,
            reference: None,
        };
        assert!(rule.matches("wasi", "0.11.0+wasi-snapshot-preview1"));
        assert!(!rule.matches("wasi", "0.11.0"));
    }

    #[test]
    fn test_first_matching_override_wins() {
        let policy = Policy::parse(
            r#"
            [[repository_override]]
            name = "foo"
            version = "1.0.0"
            repository = "https://github.com/a/foo"

            [[repository_override]]
            name = "foo"
            repository = "https://github.com/b/foo"
            "#,
        )
        .unwrap();

        assert_eq!(
            policy.repository_override("foo", "1.0.0").unwrap().repository,
            "https://github.com/a/foo"
        );
        assert_eq!(
            policy.repository_override("foo", "2.0.0").unwrap().repository,
            "https://github.com/b/foo"
        );
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            r#"host_prefix = "http://github.com/""#,
            r#"host_prefix = "https://github.com""#,
            "[[known_exception]]\nname = \"\"",
            "[[known_exception]]\nname = []",
            "[[repository_override]]\nname = \"x\"\nrepository = \"\"",
            "[[url_correction]]\nfrom = \"a\"\nto = \"b\"\n[[url_correction]]\nfrom = \"a\"\nto = \"c\"",
            "[[subpath_correction]]\nname = \"x\"\nversions = \"not a req\"\npath_in_vcs = \"x\"",
            "[[known_exception]]\nname = \"serde\"\nverison = \"1.0.0\"\n",
            "[[repository_override]]\nname = \"x\"\nrepo = \"https://github.com/o/x\"",
            "[[url_correction]]\nfrom = \"a\"\nto = \"b\"\nnote = \"c\"",
            "[[known_exceptions]]\nname = \"serde\"",
        ];
        for case in cases {
            assert!(
                matches!(Policy::parse(case), Err(Error::PolicyError(_))),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn test_load_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        fs::write(&path, "[[known_exception]]\nname = \"serde\"\nverison = \"1.0.0\"\n").unwrap();

        let err = Policy::load(&path).unwrap_err();
        assert!(matches!(err, Error::PolicyError(_)));
        let message = err.to_string();
        assert!(message.contains("policy.toml"), "{message}");
        assert!(message.contains("verison"), "{message}");

        let err = Policy::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_empty_policy() {
        let policy = Policy::parse("").unwrap();
        assert_eq!(policy.host_prefix, DEFAULT_HOST_PREFIX);
        assert!(policy.repository_override("crunchy", "0.2.2").is_none());
    }
}
