// src/rebuild.rs

//! Rebuilding candidate archives from source checkouts

use crate::config::ARCHIVE_EXTENSION;
use crate::error::{Error, Result};
use crate::process::{ToolCommand, ToolOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lines of build stderr echoed when a build fails
const BUILD_LOG_TAIL: usize = 5;

/// One package-only build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Package directory inside the checkout; the build runs here
    pub source_dir: PathBuf,
    /// Absolute build-tool target directory
    pub target_dir: PathBuf,
    /// Where the build is expected to leave the archive
    pub artifact: PathBuf,
}

/// Builds a distributable archive without verifying it
pub trait PackageBuilder {
    fn package(&self, request: &BuildRequest) -> Result<ToolOutcome>;
}

/// `cargo package --no-verify`
pub struct CargoBuilder {
    program: String,
    timeout: Duration,
}

impl CargoBuilder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl PackageBuilder for CargoBuilder {
    fn package(&self, request: &BuildRequest) -> Result<ToolOutcome> {
        ToolCommand::new(&self.program, self.timeout)
            .args(["package", "--no-verify", "--target-dir"])
            .arg(&request.target_dir)
            .current_dir(&request.source_dir)
            .run()
    }
}

/// A rebuilt archive on disk
#[derive(Debug, Clone)]
pub struct RebuiltArtifact {
    pub path: PathBuf,
    /// Whether the build ran during this run
    pub built: bool,
}

/// Memoized rebuilds into a shared target directory
///
/// Every package builds into the same `rebuilt/` target directory, where the
/// build tool leaves `package/<name>-<version>.crate`.
pub struct Rebuilder {
    target_dir: PathBuf,
}

impl Rebuilder {
    pub fn new(target_dir: &Path) -> Result<Self> {
        let target_dir = std::path::absolute(target_dir).map_err(|e| {
            Error::IoError(format!("Failed to resolve {}: {e}", target_dir.display()))
        })?;
        Ok(Self { target_dir })
    }

    pub fn artifact_path(&self, fullname: &str) -> PathBuf {
        self.target_dir
            .join("package")
            .join(format!("{fullname}.{ARCHIVE_EXTENSION}"))
    }

    /// Produce the candidate archive unless it already exists
    ///
    /// Returns `None` when no artifact exists after the build ran.
    pub fn ensure_artifact(
        &self,
        fullname: &str,
        package_dir: &Path,
        builder: &dyn PackageBuilder,
    ) -> Result<Option<RebuiltArtifact>> {
        let artifact = self.artifact_path(fullname);
        if artifact.exists() {
            debug!("Using cached rebuild {}", artifact.display());
            return Ok(Some(RebuiltArtifact {
                path: artifact,
                built: false,
            }));
        }

        if !package_dir.is_dir() {
            warn!(
                "Package directory {} does not exist in the checkout",
                package_dir.display()
            );
            return Ok(None);
        }

        info!("Rebuilding {} in {}", fullname, package_dir.display());
        let request = BuildRequest {
            source_dir: package_dir.to_path_buf(),
            target_dir: self.target_dir.clone(),
            artifact: artifact.clone(),
        };
        let outcome = builder.package(&request)?;
        if !outcome.is_success() {
            warn!("Build of {} {}", fullname, outcome);
            if let Some(output) = outcome.output() {
                let stderr = output.stderr_lossy();
                let lines: Vec<&str> = stderr.lines().collect();
                for line in &lines[lines.len().saturating_sub(BUILD_LOG_TAIL)..] {
                    warn!("[build] {}", line);
                }
            }
        }

        if artifact.exists() {
            Ok(Some(RebuiltArtifact {
                path: artifact,
                built: true,
            }))
        } else {
            Ok(None)
        }
    }
}
