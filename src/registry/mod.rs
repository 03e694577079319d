// src/registry/mod.rs

//! Published archive handling
//!
//! Downloads crate archives from the registry's static host, memoizes them
//! under `orig/`, asserts the lockfile checksum on every use, and reads the
//! manifest and VCS provenance out of the archive without extracting it.

pub mod archive;
pub mod cache;
pub mod client;

pub use archive::{CrateArchive, ManifestInfo, VcsInfo};
pub use cache::{ArchiveCache, ArchiveHandle};
pub use client::{ArchiveDownloader, RegistryClient};
