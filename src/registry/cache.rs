// src/registry/cache.rs

//! Memoized, checksum-verified original archives

use super::client::ArchiveDownloader;
use crate::config::{CacheLayout, expand_download_url};
use crate::error::{Error, Result};
use crate::hash::{self, Sha256Digest};
use crate::lockfile::PackageRecord;
use std::path::PathBuf;
use tracing::{debug, info};

/// A published archive on disk whose digest matched the lockfile
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    pub path: PathBuf,
    pub digest: Sha256Digest,
    /// Whether the archive was downloaded during this run
    pub fetched: bool,
}

/// Cache of original archives under `orig/`
///
/// Presence of `orig/<name>-<version>.crate` is the only cache signal. The
/// checksum is asserted on every use, cached or not, and a mismatch is fatal.
pub struct ArchiveCache {
    layout: CacheLayout,
    download_url: String,
}

impl ArchiveCache {
    pub fn new(layout: CacheLayout, download_url: impl Into<String>) -> Self {
        Self {
            layout,
            download_url: download_url.into(),
        }
    }

    /// Make sure the original archive for `record` exists and verifies
    pub fn ensure(
        &self,
        record: &PackageRecord,
        downloader: &dyn ArchiveDownloader,
    ) -> Result<ArchiveHandle> {
        let path = self.layout.original_archive(&record.fullname());

        let fetched = if path.exists() {
            debug!("Using cached archive {}", path.display());
            false
        } else {
            let url = expand_download_url(&self.download_url, &record.name, &record.version);
            downloader.download(&url, &path)?;
            if !path.exists() {
                return Err(Error::DownloadError(format!(
                    "Download of {url} reported success but {} is missing",
                    path.display()
                )));
            }
            info!("Downloaded {}", record);
            true
        };

        let digest = hash::sha256_file(&path).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;
        if !digest.matches(&record.checksum) {
            return Err(Error::ChecksumMismatch {
                path,
                expected: record.checksum.clone(),
                actual: digest.to_string(),
            });
        }

        Ok(ArchiveHandle {
            path,
            digest,
            fetched,
        })
    }
}
