// src/source.rs

//! Source checkouts pinned to the recorded revision

use crate::error::{Error, Result};
use crate::process::{ToolCommand, ToolOutcome};
use crate::resolver::ResolvedRepository;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Version-control operations the fetcher needs
pub trait VcsClient {
    /// Blob-less clone of `url` into `dest`
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()>;

    /// Detach the working tree in `repo` at `revision`
    fn checkout_detached(&self, repo: &Path, revision: &str) -> Result<()>;
}

/// The `git` command-line client
pub struct GitClient {
    program: String,
    timeout: Duration,
}

impl GitClient {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn run(&self, command: ToolCommand) -> Result<()> {
        let display = command.display();
        match command.run()? {
            ToolOutcome::Success(_) => Ok(()),
            ToolOutcome::Failed { output, .. } => Err(Error::FetchError(format!(
                "'{display}' failed: {}",
                output.stderr_lossy()
            ))),
            outcome @ ToolOutcome::TimedOut { .. } => {
                Err(Error::FetchError(format!("'{display}' {outcome}")))
            }
        }
    }
}

impl VcsClient for GitClient {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        self.run(
            ToolCommand::new(&self.program, self.timeout)
                .args(["clone", "--filter=blob:none", "--"])
                .arg(url)
                .arg(dest),
        )
    }

    fn checkout_detached(&self, repo: &Path, revision: &str) -> Result<()> {
        self.run(
            ToolCommand::new(&self.program, self.timeout)
                .args(["switch", "--detach"])
                .arg(revision)
                .current_dir(repo),
        )
    }
}

/// A working tree at the resolved revision
#[derive(Debug, Clone)]
pub struct RepoCheckout {
    pub path: PathBuf,
    /// Whether the checkout was created during this run
    pub fetched: bool,
}

impl RepoCheckout {
    /// Directory the package lives in
    ///
    /// Returns `None` for a subpath that is absolute or climbs out of the
    /// checkout with `..`.
    pub fn package_dir(&self, subpath: Option<&str>) -> Option<PathBuf> {
        let Some(sub) = subpath else {
            return Some(self.path.clone());
        };
        let inside = Path::new(sub)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside {
            warn!("Refusing path_in_vcs '{}' outside of {}", sub, self.path.display());
            return None;
        }
        Some(self.path.join(sub))
    }
}

/// Memoized checkouts under `git/<name>-<version>/`
///
/// Clone and checkout happen in a `.partial` sibling that is only renamed
/// into place once both succeed, so the final directory existing always
/// means a complete checkout.
pub struct SourceFetcher {
    git_dir: PathBuf,
}

impl SourceFetcher {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    pub fn checkout_path(&self, fullname: &str) -> PathBuf {
        self.git_dir.join(fullname)
    }

    pub fn ensure_checkout(
        &self,
        fullname: &str,
        repo: &ResolvedRepository,
        vcs: &dyn VcsClient,
    ) -> Result<RepoCheckout> {
        let path = self.checkout_path(fullname);
        if path.exists() {
            debug!("Using cached checkout {}", path.display());
            return Ok(RepoCheckout {
                path,
                fetched: false,
            });
        }

        let partial = self.git_dir.join(format!("{fullname}.partial"));
        if partial.exists() {
            warn!("Removing stale partial checkout {}", partial.display());
            fs::remove_dir_all(&partial).map_err(|e| {
                Error::IoError(format!("Failed to remove {}: {e}", partial.display()))
            })?;
        }

        info!("Cloning {} at {}", repo.url, repo.revision);
        vcs.clone_repository(&repo.url, &partial)?;
        vcs.checkout_detached(&partial, &repo.revision)?;

        fs::rename(&partial, &path).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                partial.display(),
                path.display()
            ))
        })?;

        Ok(RepoCheckout {
            path,
            fetched: true,
        })
    }
}
