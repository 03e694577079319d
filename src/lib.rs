// src/lib.rs

//! reprocheck
//!
//! Checks whether the registry packages pinned in a Cargo.lock can be
//! rebuilt byte-for-byte from the source repository and revision recorded
//! in their published archives.
//!
//! # Architecture
//!
//! - Registry: checksum-verified original archives, cached on disk
//! - Resolver: maps archive metadata to a repository and revision through a
//!   data-driven correction policy
//! - Source / rebuild / compare: memoized checkout, package build and diff
//!   steps behind tool traits
//! - Pipeline: one outcome per package, folded into a summary at the end
//!
//! Every stage is keyed by `<name>-<version>` on disk, so re-running the
//! tool resumes where the previous run stopped.

pub mod compare;
pub mod config;
mod error;
pub mod hash;
pub mod lockfile;
pub mod pipeline;
pub mod process;
pub mod rebuild;
pub mod registry;
pub mod resolver;
pub mod source;

pub use compare::{Comparator, DiffReporter, Diffoscope, Verdict};
pub use config::{CacheLayout, Config, ToolsConfig};
pub use error::{Error, Result};
pub use lockfile::{Lockfile, PackageRecord};
pub use pipeline::{Outcome, PackageReport, RunSummary, Toolchain, Verifier, select_packages};
pub use process::{ToolCommand, ToolOutcome, ToolOutput};
pub use rebuild::{BuildRequest, CargoBuilder, PackageBuilder, Rebuilder};
pub use registry::{ArchiveCache, ArchiveDownloader, CrateArchive, RegistryClient};
pub use resolver::{Policy, Resolution, ResolvedRepository, Resolver, SkipReason};
pub use source::{GitClient, SourceFetcher, VcsClient};
