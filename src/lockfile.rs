// src/lockfile.rs

//! Cargo.lock loading and registry filtering
//!
//! Only the fields the pipeline needs are read: `name`, `version`, `source`
//! and `checksum` of every `[[package]]` entry. Old (v1) lockfiles keep their
//! checksums in a `[metadata]` table instead, keyed as
//! `checksum <name> <version> (<source>)`; both layouts are accepted.

use crate::error::{Error, Result};
use crate::hash::Sha256Digest;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// A package entry exactly as written in the lockfile
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Parsed lockfile
#[derive(Debug, Clone, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default, rename = "package")]
    pub packages: Vec<LockedPackage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A registry package selected for verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub registry_source: String,
    pub checksum: String,
}

impl PackageRecord {
    /// `<name>-<version>`, the key of every on-disk cache entry
    pub fn fullname(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

impl Lockfile {
    /// Load and parse a lockfile; any failure is fatal for the run
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::LockfileError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::LockfileError(msg) => {
                Error::LockfileError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse lockfile text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::LockfileError(e.to_string()))
    }

    /// Checksum of a package, from the entry itself or the v1 metadata table
    fn checksum_of(&self, package: &LockedPackage, source: &str) -> Option<String> {
        package.checksum.clone().or_else(|| {
            let key = format!("checksum {} {} ({source})", package.name, package.version);
            self.metadata.get(&key).cloned()
        })
    }

    /// Select the packages attributed to `registry_source`, in lockfile order
    ///
    /// A registry package without a well-formed checksum makes the lockfile
    /// unusable.
    pub fn registry_packages(&self, registry_source: &str) -> Result<Vec<PackageRecord>> {
        self.packages
            .iter()
            .filter(|package| is_from_registry(package, registry_source))
            .map(|package| {
                let checksum = self.checksum_of(package, registry_source).ok_or_else(|| {
                    Error::LockfileError(format!(
                        "registry package {}-{} has no checksum",
                        package.name, package.version
                    ))
                })?;
                let checksum = Sha256Digest::parse(&checksum).ok_or_else(|| {
                    Error::LockfileError(format!(
                        "registry package {}-{} has an invalid checksum: {checksum}",
                        package.name, package.version
                    ))
                })?;
                Ok(PackageRecord {
                    name: package.name.clone(),
                    version: package.version.clone(),
                    registry_source: registry_source.to_string(),
                    checksum: checksum.to_string(),
                })
            })
            .collect()
    }
}

/// Registry filter predicate
pub fn is_from_registry(package: &LockedPackage, registry_source: &str) -> bool {
    package.source.as_deref() == Some(registry_source)
}
