// src/registry/archive.rs

//! Metadata extraction from published crate archives
//!
//! A `.crate` file is a gzipped tarball whose entries all live under
//! `<name>-<version>/`. Two of them matter here:
//!
//! - `Cargo.toml`, the normalized manifest (declared repository URL, and the
//!   name/version upstream believes it published)
//! - `.cargo_vcs_info.json`, written by `cargo package` when the crate was
//!   packaged from a git checkout:
//!
//! ```json
//! {"git": {"sha1": "0123abcd...", "dirty": false}, "path_in_vcs": "subdir"}
//! ```
//!
//! Entries are read straight from the compressed stream; nothing is
//! extracted to disk.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tar::Archive;
use tracing::warn;

/// Manifest file name inside the archive root
pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Provenance file name inside the archive root
pub const VCS_INFO_FILE: &str = ".cargo_vcs_info.json";

/// Metadata declared in the packaged manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub repository: Option<String>,
}

#[derive(Deserialize)]
struct RawManifest {
    // Very old crates were published with a `[project]` table
    #[serde(alias = "project")]
    package: Option<RawPackage>,
}

#[derive(Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<String>,
    repository: Option<String>,
}

impl ManifestInfo {
    /// Parse the packaged `Cargo.toml`
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid Cargo.toml: {e}")))?;
        let package = raw
            .package
            .ok_or_else(|| Error::ParseError("Cargo.toml has no [package] table".to_string()))?;

        Ok(Self {
            name: package.name,
            version: package.version,
            repository: package.repository.filter(|r| !r.trim().is_empty()),
        })
    }
}

/// Provenance recorded by the publishing tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsInfo {
    /// Commit the archive was packaged from
    pub revision: String,
    /// Package directory relative to the repository root
    pub subpath: Option<String>,
    /// Whether the working tree had uncommitted changes when packaged
    pub dirty: bool,
}

#[derive(Deserialize)]
struct RawVcsInfo {
    git: Option<RawGitInfo>,
    path_in_vcs: Option<String>,
}

#[derive(Deserialize)]
struct RawGitInfo {
    sha1: Option<String>,
    #[serde(default)]
    dirty: bool,
}

impl VcsInfo {
    /// Parse `.cargo_vcs_info.json`; `None` if it names no git revision
    pub fn parse(content: &str) -> Result<Option<Self>> {
        let raw: RawVcsInfo = serde_json::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid {VCS_INFO_FILE}: {e}")))?;

        let Some(git) = raw.git else {
            return Ok(None);
        };
        let Some(revision) = git.sha1.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            revision,
            subpath: raw.path_in_vcs.filter(|p| !p.is_empty()),
            dirty: git.dirty,
        }))
    }
}

/// Metadata read from one archive
#[derive(Debug, Clone)]
pub struct ArchiveMetadata {
    pub manifest: ManifestInfo,
    /// `None` when the archive carries no usable provenance
    pub vcs: Option<VcsInfo>,
}

/// A published `.crate` archive
pub struct CrateArchive {
    path: PathBuf,
    root: String,
}

impl CrateArchive {
    /// Archive at `path` whose entries live under `<fullname>/`
    pub fn new(path: impl Into<PathBuf>, fullname: &str) -> Self {
        Self {
            path: path.into(),
            root: fullname.to_string(),
        }
    }

    /// Read the named root-level entries in a single pass
    ///
    /// Entries that are not present are simply missing from the map.
    pub fn read_entries(&self, names: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        let file = File::open(&self.path).map_err(|e| {
            Error::ArchiveError(format!("Failed to open {}: {e}", self.path.display()))
        })?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let wanted: HashMap<String, &str> = names
            .iter()
            .map(|name| (format!("{}/{}", self.root, name), *name))
            .collect();
        let mut found = HashMap::new();

        let entries = archive.entries().map_err(|e| {
            Error::ArchiveError(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        for entry in entries {
            let mut entry = entry.map_err(|e| {
                Error::ArchiveError(format!("Corrupt entry in {}: {e}", self.path.display()))
            })?;
            let entry_path = entry.path()?.to_string_lossy().into_owned();
            let entry_path = entry_path.trim_start_matches("./");

            if let Some(name) = wanted.get(entry_path) {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                found.insert((*name).to_string(), content);
                if found.len() == wanted.len() {
                    break;
                }
            }
        }

        Ok(found)
    }

    /// Read the manifest and VCS provenance
    ///
    /// A missing manifest is an error. Missing or malformed provenance is
    /// reported as `vcs: None`.
    pub fn metadata(&self) -> Result<ArchiveMetadata> {
        let mut entries = self.read_entries(&[MANIFEST_FILE, VCS_INFO_FILE])?;

        let manifest_bytes = entries.remove(MANIFEST_FILE).ok_or_else(|| {
            Error::ArchiveError(format!(
                "{} has no {}/{MANIFEST_FILE}",
                self.path.display(),
                self.root
            ))
        })?;
        let manifest = ManifestInfo::parse(&String::from_utf8_lossy(&manifest_bytes))?;

        let vcs = match entries.remove(VCS_INFO_FILE) {
            None => None,
            Some(bytes) => match VcsInfo::parse(&String::from_utf8_lossy(&bytes)) {
                Ok(vcs) => vcs,
                Err(e) => {
                    warn!("Ignoring provenance of {}: {}", self.root, e);
                    None
                }
            },
        };

        Ok(ArchiveMetadata { manifest, vcs })
    }
}
