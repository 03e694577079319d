// src/process.rs

//! Bounded execution of external tools
//!
//! Every git, cargo and diff invocation goes through [`ToolCommand`]:
//!
//! - stdin is nulled so a tool can never block waiting for input
//! - stdout and stderr spill into temporary files rather than pipes, so a
//!   chatty child cannot deadlock against a parent that is only waiting
//! - the child is killed and reaped once its timeout elapses
//!
//! The result is a [`ToolOutcome`] rather than an error, leaving each stage
//! to decide whether a failure is fatal, package-local, or expected.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured output of a finished tool
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim_end().to_string()
    }
}

/// How a tool invocation ended
#[derive(Debug)]
pub enum ToolOutcome {
    /// Exited with status 0
    Success(ToolOutput),
    /// Exited with a non-zero status, or was killed by a signal (`code` is None)
    Failed {
        code: Option<i32>,
        output: ToolOutput,
    },
    /// Still running when the timeout elapsed; the child was killed
    TimedOut { after: Duration },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Output of a tool that ran to completion, whatever its status
    pub fn output(&self) -> Option<&ToolOutput> {
        match self {
            Self::Success(output) | Self::Failed { output, .. } => Some(output),
            Self::TimedOut { .. } => None,
        }
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => write!(f, "succeeded"),
            Self::Failed { code: Some(code), .. } => write!(f, "exited with status {code}"),
            Self::Failed { code: None, .. } => write!(f, "was terminated by a signal"),
            Self::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

/// An external command with a mandatory timeout
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>, timeout: Duration) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command to completion or until the timeout elapses
    ///
    /// Only a failure to spawn (missing program, bad working directory) is
    /// returned as an error.
    pub fn run(&self) -> Result<ToolOutcome> {
        let mut stdout_file = tempfile::tempfile()?;
        let mut stderr_file = tempfile::tempfile()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?));
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        debug!("Running: {}", self.display());

        let mut child = command.spawn().map_err(|e| {
            Error::ToolError(format!("Failed to spawn '{}': {e}", self.display()))
        })?;

        let status: ExitStatus = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ToolOutcome::TimedOut {
                    after: self.timeout,
                });
            }
        };

        let output = ToolOutput {
            stdout: read_spill(&mut stdout_file)?,
            stderr: read_spill(&mut stderr_file)?,
        };

        if status.success() {
            Ok(ToolOutcome::Success(output))
        } else {
            Ok(ToolOutcome::Failed {
                code: status.code(),
                output,
            })
        }
    }
}

fn read_spill(file: &mut File) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
