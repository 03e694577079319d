// src/resolver/mod.rs

//! Source repository resolution
//!
//! Maps a published archive's metadata to the repository, revision and
//! package directory it should be rebuilt from. The steps run in a fixed
//! order, and the order decides which packages are skipped:
//!
//! 1. No VCS provenance in the archive: skip.
//! 2. Per-package repository override from the policy.
//! 3. Otherwise the manifest's declared `repository`; none declared: skip.
//! 4. Exact-match URL literal corrections.
//! 5. URL not on the accepted host: skip.
//! 6. Truncate to `origin/owner/repo`.
//! 7. Known-exception list (revision unrecoverable): skip.
//! 8. Missing-lockfile list (rebuild unreliable): skip.
//! 9. Per-package subpath correction.
//!
//! Resolution is pure: the same inputs and policy always give the same
//! [`Resolution`].

pub mod policy;
pub mod url;

pub use policy::{NameSet, PackageMatcher, Policy};
pub use url::HostFilter;

use crate::error::Result;
use crate::lockfile::PackageRecord;
use crate::registry::{ManifestInfo, VcsInfo};
use std::fmt;

/// Where and at which revision a package's source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    /// `origin/owner/repo`
    pub url: String,
    pub revision: String,
    /// Package directory inside the repository
    pub subpath: Option<String>,
}

/// Why a package was excluded before fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The archive carries no VCS provenance
    NoProvenance,
    /// No usable repository URL on the accepted host
    Unresolvable { repository: Option<String> },
    /// The recorded revision is known to be unrecoverable
    KnownException { reference: Option<String> },
    /// The repository has no lockfile at the recorded revision
    MissingLockInfo { reference: Option<String> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProvenance => write!(f, "has no VCS info"),
            Self::Unresolvable { repository: None } => write!(f, "has no repository"),
            Self::Unresolvable {
                repository: Some(url),
            } => write!(f, "is not hosted on a supported host: {url}"),
            Self::KnownException { reference } => {
                write!(f, "has a revision missing from its repository")?;
                if let Some(r) = reference {
                    write!(f, " ({r})")?;
                }
                Ok(())
            }
            Self::MissingLockInfo { reference } => {
                write!(f, "has no Cargo.lock in its repository")?;
                if let Some(r) = reference {
                    write!(f, " ({r})")?;
                }
                Ok(())
            }
        }
    }
}

/// Result of resolving one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedRepository),
    Skipped(SkipReason),
}

/// Applies a [`Policy`] to package metadata
pub struct Resolver {
    policy: Policy,
    host: HostFilter,
}

impl Resolver {
    pub fn new(policy: Policy) -> Result<Self> {
        let host = HostFilter::new(&policy.host_prefix)?;
        Ok(Self { policy, host })
    }

    pub fn resolve(
        &self,
        record: &PackageRecord,
        manifest: &ManifestInfo,
        vcs: Option<&VcsInfo>,
    ) -> Resolution {
        let (name, version) = (record.name.as_str(), record.version.as_str());

        let Some(vcs) = vcs else {
            return Resolution::Skipped(SkipReason::NoProvenance);
        };

        let declared = match self.policy.repository_override(name, version) {
            Some(rule) => Some(rule.repository.as_str()),
            None => manifest.repository.as_deref(),
        };
        let Some(declared) = declared else {
            return Resolution::Skipped(SkipReason::Unresolvable { repository: None });
        };

        let repository = self.policy.correct_url(declared).unwrap_or(declared);

        if !self.host.accepts(repository) {
            return Resolution::Skipped(SkipReason::Unresolvable {
                repository: Some(repository.to_string()),
            });
        }
        let Some(url) = self.host.normalize(repository) else {
            return Resolution::Skipped(SkipReason::Unresolvable {
                repository: Some(repository.to_string()),
            });
        };

        if let Some(rule) = self.policy.known_exception(name, version) {
            return Resolution::Skipped(SkipReason::KnownException {
                reference: rule.reference.clone(),
            });
        }
        if let Some(rule) = self.policy.missing_lockfile(name, version) {
            return Resolution::Skipped(SkipReason::MissingLockInfo {
                reference: rule.reference.clone(),
            });
        }

        let subpath = match self.policy.subpath_correction(name, version) {
            Some(correction) => Some(correction.path_in_vcs.clone()),
            None => vcs.subpath.clone(),
        };

        Resolution::Resolved(ResolvedRepository {
            url,
            revision: vcs.revision.clone(),
            subpath,
        })
    }
}
