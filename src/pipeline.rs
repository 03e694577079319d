// src/pipeline.rs

//! Per-package verification pipeline
//!
//! Each package runs through download, resolution, checkout, rebuild and
//! comparison in order and ends with exactly one [`Outcome`]. Nothing is
//! counted while the pipeline runs; [`RunSummary`] folds the outcomes once
//! every package is done.

use crate::compare::{Comparator, DiffReporter, Diffoscope, Verdict};
use crate::config::{CacheLayout, Config};
use crate::error::Result;
use crate::lockfile::{Lockfile, PackageRecord};
use crate::registry::{ArchiveCache, ArchiveDownloader, CrateArchive, RegistryClient};
use crate::rebuild::{CargoBuilder, PackageBuilder, Rebuilder};
use crate::resolver::{Policy, Resolution, Resolver, SkipReason};
use crate::source::{GitClient, SourceFetcher, VcsClient};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// The external collaborators of a run
pub struct Toolchain {
    pub downloader: Box<dyn ArchiveDownloader>,
    pub vcs: Box<dyn VcsClient>,
    pub builder: Box<dyn PackageBuilder>,
    pub differ: Box<dyn DiffReporter>,
}

impl Toolchain {
    /// The real registry client and command-line tools
    pub fn from_config(config: &Config) -> Result<Self> {
        let tools = &config.tools;
        Ok(Self {
            downloader: Box::new(RegistryClient::new(config.http_timeout())?),
            vcs: Box::new(GitClient::new(&tools.git, tools.clone_timeout())),
            builder: Box::new(CargoBuilder::new(&tools.cargo, tools.build_timeout())),
            differ: Box::new(Diffoscope::new(&tools.diff, tools.diff_timeout())),
        })
    }
}

/// Terminal state of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reproducible,
    ChecksumMismatch { diff_report: Option<PathBuf> },
    SkippedNoProvenance,
    SkippedUnresolvable,
    SkippedKnownException,
    SkippedMissingLockInfo,
    RebuildFailed,
    FetchFailed(String),
}

impl Outcome {
    /// Stable identifier used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reproducible => "reproducible",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::SkippedNoProvenance => "skipped_no_provenance",
            Self::SkippedUnresolvable => "skipped_unresolvable",
            Self::SkippedKnownException => "skipped_known_exception",
            Self::SkippedMissingLockInfo => "skipped_missing_lock_info",
            Self::RebuildFailed => "rebuild_failed",
            Self::FetchFailed(_) => "fetch_failed",
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedNoProvenance
                | Self::SkippedUnresolvable
                | Self::SkippedKnownException
                | Self::SkippedMissingLockInfo
        )
    }
}

impl From<&SkipReason> for Outcome {
    fn from(reason: &SkipReason) -> Self {
        match reason {
            SkipReason::NoProvenance => Self::SkippedNoProvenance,
            SkipReason::Unresolvable { .. } => Self::SkippedUnresolvable,
            SkipReason::KnownException { .. } => Self::SkippedKnownException,
            SkipReason::MissingLockInfo { .. } => Self::SkippedMissingLockInfo,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed(reason) => write!(f, "fetch_failed: {reason}"),
            other => f.write_str(other.kind()),
        }
    }
}

/// One line of the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub version: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip)]
    pub result: Outcome,
}

impl PackageReport {
    pub fn new(record: &PackageRecord, outcome: Outcome) -> Self {
        let diff_report = match &outcome {
            Outcome::ChecksumMismatch { diff_report } => diff_report.clone(),
            _ => None,
        };
        let detail = match &outcome {
            Outcome::FetchFailed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            outcome: outcome.kind(),
            diff_report,
            detail,
            result: outcome,
        }
    }

    pub fn fullname(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Counts folded from the outcomes of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Every package that passed the registry filter and selection
    pub total: usize,
    /// Packages whose rebuild is byte-identical to the published archive
    pub reproducible: usize,
    pub mismatched: usize,
    pub rebuild_failed: usize,
    pub fetch_failed: usize,
    pub skipped_no_provenance: usize,
    pub skipped_unresolvable: usize,
    pub skipped_known_exception: usize,
    pub skipped_missing_lock_info: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[PackageReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.total += 1;
            match &report.result {
                Outcome::Reproducible => summary.reproducible += 1,
                Outcome::ChecksumMismatch { .. } => summary.mismatched += 1,
                Outcome::RebuildFailed => summary.rebuild_failed += 1,
                Outcome::FetchFailed(_) => summary.fetch_failed += 1,
                Outcome::SkippedNoProvenance => summary.skipped_no_provenance += 1,
                Outcome::SkippedUnresolvable => summary.skipped_unresolvable += 1,
                Outcome::SkippedKnownException => summary.skipped_known_exception += 1,
                Outcome::SkippedMissingLockInfo => summary.skipped_missing_lock_info += 1,
            }
            summary
        })
    }

    /// Label and count of every outcome kind, in pipeline order
    pub fn breakdown(&self) -> [(&'static str, usize); 8] {
        [
            ("Skipped (no VCS info)", self.skipped_no_provenance),
            ("Skipped (unresolvable repository)", self.skipped_unresolvable),
            ("Skipped (known exception)", self.skipped_known_exception),
            ("Skipped (no lockfile in repository)", self.skipped_missing_lock_info),
            ("Fetch failed", self.fetch_failed),
            ("Rebuild failed", self.rebuild_failed),
            ("Checksum mismatch", self.mismatched),
            ("Reproducible", self.reproducible),
        ]
    }
}

/// Registry packages of a lockfile, optionally restricted to `selection`
///
/// Names in `selection` that match nothing are logged and ignored.
pub fn select_packages(
    lockfile: &Lockfile,
    registry_source: &str,
    selection: &[String],
) -> Result<Vec<PackageRecord>> {
    let packages = lockfile.registry_packages(registry_source)?;
    if selection.is_empty() {
        return Ok(packages);
    }

    let wanted: BTreeSet<&str> = selection.iter().map(String::as_str).collect();
    let selected: Vec<PackageRecord> = packages
        .into_iter()
        .filter(|p| wanted.contains(p.name.as_str()))
        .collect();

    for name in &wanted {
        if !selected.iter().any(|p| p.name == *name) {
            warn!("No registry package named {} in the lockfile", name);
        }
    }
    Ok(selected)
}

/// Run context: caches, resolver and tools for one verification run
pub struct Verifier {
    layout: CacheLayout,
    archives: ArchiveCache,
    resolver: Resolver,
    fetcher: SourceFetcher,
    rebuilder: Rebuilder,
    comparator: Comparator,
    tools: Toolchain,
}

impl Verifier {
    pub fn new(config: &Config, policy: Policy, tools: Toolchain) -> Result<Self> {
        let layout = config.layout();
        layout.ensure_dirs()?;
        Ok(Self {
            archives: ArchiveCache::new(layout.clone(), config.download_url.clone()),
            resolver: Resolver::new(policy)?,
            fetcher: SourceFetcher::new(layout.git_dir()),
            rebuilder: Rebuilder::new(&layout.rebuilt_dir())?,
            comparator: Comparator::new(layout.diff_dir()),
            layout,
            tools,
        })
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Verify every package in order
    ///
    /// Stops at the first error that is not local to one package.
    pub fn run(&self, packages: &[PackageRecord]) -> Result<Vec<PackageReport>> {
        let mut reports = Vec::with_capacity(packages.len());
        for (index, record) in packages.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, packages.len(), record);
            let outcome = self.verify_package(record)?;
            if !matches!(outcome, Outcome::Reproducible) && !outcome.is_skipped() {
                warn!("{}: {}", record, outcome);
            }
            reports.push(PackageReport::new(record, outcome));
        }
        Ok(reports)
    }

    /// Take one package through the whole pipeline
    pub fn verify_package(&self, record: &PackageRecord) -> Result<Outcome> {
        let fullname = record.fullname();
        let archive = self
            .archives
            .ensure(record, self.tools.downloader.as_ref())?;

        let metadata = CrateArchive::new(&archive.path, &fullname).metadata()?;
        let manifest = &metadata.manifest;
        let name = manifest.name.as_deref().unwrap_or(&record.name);
        let version = manifest.version.as_deref().unwrap_or(&record.version);
        if name != record.name || version != record.version {
            warn!(
                "{} declares itself as {}-{} in its manifest",
                record, name, version
            );
        }
        if metadata.vcs.as_ref().is_some_and(|vcs| vcs.dirty) {
            warn!("{} was published from a dirty working tree", record);
        }

        let repo = match self
            .resolver
            .resolve(record, manifest, metadata.vcs.as_ref())
        {
            Resolution::Resolved(repo) => repo,
            Resolution::Skipped(reason) => {
                info!("Skipping {}: {}", record, reason);
                return Ok(Outcome::from(&reason));
            }
        };

        let checkout = match self
            .fetcher
            .ensure_checkout(&fullname, &repo, self.tools.vcs.as_ref())
        {
            Ok(checkout) => checkout,
            Err(e) if e.is_package_local() => return Ok(Outcome::FetchFailed(e.to_string())),
            Err(e) => return Err(e),
        };

        let Some(package_dir) = checkout.package_dir(repo.subpath.as_deref()) else {
            return Ok(Outcome::RebuildFailed);
        };
        let Some(artifact) =
            self.rebuilder
                .ensure_artifact(&fullname, &package_dir, self.tools.builder.as_ref())?
        else {
            return Ok(Outcome::RebuildFailed);
        };

        let verdict = self.comparator.compare(
            &fullname,
            &record.checksum,
            &archive.path,
            &artifact.path,
            self.tools.differ.as_ref(),
        )?;
        Ok(match verdict {
            Verdict::Identical => {
                info!("{} is reproducible", record);
                Outcome::Reproducible
            }
            Verdict::Differs { diff_report } => Outcome::ChecksumMismatch { diff_report },
        })
    }
}
