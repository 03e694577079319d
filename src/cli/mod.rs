// src/cli/mod.rs
//! CLI definitions for reprocheck
//!
//! A single command: verify every registry package of a lockfile. Flags
//! given here take precedence over the configuration file.

use clap::{ArgAction, Parser};
use reprocheck::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reprocheck")]
#[command(author = "reprocheck contributors")]
#[command(version)]
#[command(
    about = "Verify that crates.io packages in a Cargo.lock rebuild byte-for-byte from source",
    long_about = None
)]
pub struct Cli {
    /// Path to the Cargo.lock to verify
    pub lockfile: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root of the download, checkout, rebuild and diff caches
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Resolution policy replacing the built-in one
    #[arg(long, value_name = "PATH")]
    pub policy: Option<PathBuf>,

    /// Lockfile `source` of the registry to verify
    #[arg(long, value_name = "SOURCE")]
    pub registry: Option<String>,

    /// Only verify packages with this name (repeatable)
    #[arg(short, long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Write per-package results as JSON
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, action = ArgAction::SetTrue, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(policy) = &self.policy {
            config.policy = Some(policy.clone());
        }
        if let Some(registry) = &self.registry {
            config.registry_source = registry.clone();
        }
    }
}
