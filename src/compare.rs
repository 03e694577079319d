// src/compare.rs

//! Checksum comparison of rebuilt archives and mismatch reports

use crate::error::{Error, Result};
use crate::hash;
use crate::process::{ToolCommand, ToolOutcome};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Explains how two archives differ
pub trait DiffReporter {
    fn explain(&self, original: &Path, candidate: &Path) -> Result<ToolOutcome>;
}

/// The `diffoscope` command-line tool
///
/// diffoscope exits with status 1 when the inputs differ, so that exit still
/// carries a usable report on stdout. Any other status is a tool failure.
pub struct Diffoscope {
    program: String,
    timeout: Duration,
}

impl Diffoscope {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl DiffReporter for Diffoscope {
    fn explain(&self, original: &Path, candidate: &Path) -> Result<ToolOutcome> {
        ToolCommand::new(&self.program, self.timeout)
            .arg("--")
            .arg(original)
            .arg(candidate)
            .run()
    }
}

/// Result of comparing one rebuilt archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Byte-identical to the published archive
    Identical,
    /// Digest differs; `diff_report` is set once a report exists on disk
    Differs { diff_report: Option<PathBuf> },
}

/// Compares candidates against the lockfile checksum
///
/// Reports are keyed by `diff/<name>-<version>` and written at most once.
pub struct Comparator {
    diff_dir: PathBuf,
}

impl Comparator {
    pub fn new(diff_dir: impl Into<PathBuf>) -> Self {
        Self {
            diff_dir: diff_dir.into(),
        }
    }

    pub fn report_path(&self, fullname: &str) -> PathBuf {
        self.diff_dir.join(fullname)
    }

    pub fn compare(
        &self,
        fullname: &str,
        expected: &str,
        original: &Path,
        candidate: &Path,
        differ: &dyn DiffReporter,
    ) -> Result<Verdict> {
        let digest = hash::sha256_file(candidate).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {e}", candidate.display()))
        })?;
        if digest.matches(expected) {
            return Ok(Verdict::Identical);
        }

        warn!(
            "{} does not match: expected {}, rebuilt {}",
            fullname, expected, digest
        );

        let report = self.report_path(fullname);
        if report.exists() {
            debug!("Using cached diff report {}", report.display());
            return Ok(Verdict::Differs {
                diff_report: Some(report),
            });
        }

        info!("Generating diff report for {}", fullname);
        let outcome = match differ.explain(original, candidate) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Could not diff {}: {}", fullname, e);
                return Ok(Verdict::Differs { diff_report: None });
            }
        };

        match &outcome {
            ToolOutcome::Success(output) | ToolOutcome::Failed { code: Some(1), output }
                if !output.stdout.is_empty() =>
            {
                self.persist(&report, &output.stdout)?;
                Ok(Verdict::Differs {
                    diff_report: Some(report),
                })
            }
            _ => {
                warn!("Diff of {} {} without a usable report", fullname, outcome);
                if let Some(output) = outcome.output() {
                    let stderr = output.stderr_lossy();
                    if !stderr.is_empty() {
                        warn!("[diff] {}", stderr);
                    }
                }
                Ok(Verdict::Differs { diff_report: None })
            }
        }
    }

    fn persist(&self, report: &Path, content: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.diff_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create directory {}: {e}",
                self.diff_dir.display()
            ))
        })?;

        let mut file = NamedTempFile::new_in(&self.diff_dir)?;
        file.write_all(content)?;
        file.persist(report).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", report.display(), e.error))
        })?;
        Ok(())
    }
}
