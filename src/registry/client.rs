// src/registry/client.rs

//! HTTP client for registry archive downloads

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Fetches a published archive to a local path
pub trait ArchiveDownloader {
    /// Download `url` to `dest`. `dest` must only exist afterwards if the
    /// download completed.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking reqwest client for the registry's static host
///
/// Each download is attempted once; re-running the tool is the retry.
pub struct RegistryClient {
    client: Client,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reprocheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl ArchiveDownloader for RegistryClient {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest.display());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        // Write to a temporary sibling first so a cut-off transfer never
        // looks like a cached archive
        let temp_path = dest.with_extension("part");
        let mut file = File::create(&temp_path).map_err(|e| {
            Error::IoError(format!("Failed to create file {}: {e}", temp_path.display()))
        })?;

        if let Err(e) = io::copy(&mut response, &mut file) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::DownloadError(format!(
                "Failed to write downloaded data from {url}: {e}"
            )));
        }
        drop(file);

        fs::rename(&temp_path, dest).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                temp_path.display(),
                dest.display()
            ))
        })?;

        Ok(())
    }
}
