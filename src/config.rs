// src/config.rs

//! Run configuration and on-disk cache layout

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source identifier of the crates.io index as written in Cargo.lock
pub const CRATES_IO_SOURCE: &str = "registry+https://github.com/rust-lang/crates.io-index";

/// Static download location for published crates
pub const CRATES_IO_DOWNLOAD_URL: &str =
    "https://static.crates.io/crates/{name}/{name}-{version}.crate";

/// File extension of published crate archives
pub const ARCHIVE_EXTENSION: &str = "crate";

/// External programs invoked by the pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Version-control client
    pub git: String,
    /// Package build tool
    pub cargo: String,
    /// Diff-explanation tool
    pub diff: String,
    /// Timeout for clone and checkout, in seconds
    pub clone_timeout_secs: u64,
    /// Timeout for the package build, in seconds
    pub build_timeout_secs: u64,
    /// Timeout for the diff tool, in seconds
    pub diff_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            cargo: "cargo".to_string(),
            diff: "diffoscope".to_string(),
            clone_timeout_secs: 1800,
            build_timeout_secs: 1800,
            diff_timeout_secs: 600,
        }
    }
}

impl ToolsConfig {
    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn diff_timeout(&self) -> Duration {
        Duration::from_secs(self.diff_timeout_secs)
    }
}

/// Top-level configuration, optionally loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the cache directory is relative to
    pub work_dir: PathBuf,
    /// Root of all on-disk caches
    pub cache_dir: PathBuf,
    /// Lockfile `source` value of the registry being verified
    pub registry_source: String,
    /// Download URL template with `{name}` and `{version}` placeholders
    pub download_url: String,
    /// HTTP request timeout, in seconds
    pub http_timeout_secs: u64,
    /// Resolution policy file replacing the built-in table
    pub policy: Option<PathBuf>,
    /// External tool settings
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            cache_dir: PathBuf::from("crates"),
            registry_source: CRATES_IO_SOURCE.to_string(),
            download_url: CRATES_IO_DOWNLOAD_URL.to_string(),
            http_timeout_secs: 60,
            policy: None,
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.registry_source.is_empty() {
            return Err(Error::ConfigError("registry_source must not be empty".to_string()));
        }
        if !self.download_url.contains("{name}") || !self.download_url.contains("{version}") {
            return Err(Error::ConfigError(format!(
                "download_url must contain {{name}} and {{version}}: {}",
                self.download_url
            )));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Expand the download URL template for one package
    pub fn archive_url(&self, name: &str, version: &str) -> String {
        expand_download_url(&self.download_url, name, version)
    }

    /// Cache layout rooted at `work_dir/cache_dir`
    pub fn layout(&self) -> CacheLayout {
        CacheLayout::new(self.work_dir.join(&self.cache_dir))
    }
}

/// Substitute `{name}` and `{version}` in a download URL template
pub fn expand_download_url(template: &str, name: &str, version: &str) -> String {
    template.replace("{name}", name).replace("{version}", version)
}

/// On-disk cache paths
///
/// ```text
/// <root>/orig/<name>-<version>.crate      verified original archive
/// <root>/git/<name>-<version>/            source checkout
/// <root>/rebuilt/                         build-tool target directory
/// <root>/rebuilt/package/<name>-<version>.crate
/// <root>/diff/<name>-<version>            diff report
/// ```
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn orig_dir(&self) -> PathBuf {
        self.root.join("orig")
    }

    pub fn git_dir(&self) -> PathBuf {
        self.root.join("git")
    }

    pub fn rebuilt_dir(&self) -> PathBuf {
        self.root.join("rebuilt")
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.root.join("diff")
    }

    pub fn original_archive(&self, fullname: &str) -> PathBuf {
        self.orig_dir().join(format!("{fullname}.{ARCHIVE_EXTENSION}"))
    }

    /// Create the cache directories if they do not exist yet
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.orig_dir(),
            self.git_dir(),
            self.rebuilt_dir(),
            self.diff_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}
