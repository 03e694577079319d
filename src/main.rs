// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use reprocheck::{
    Config, Lockfile, Outcome, Policy, RunSummary, Toolchain, Verifier, select_packages,
};
use std::fs;
use tracing::info;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply_to(&mut config);
    config.validate()?;

    let policy = match &config.policy {
        Some(path) => Policy::load(path)
            .with_context(|| format!("Failed to load policy {}", path.display()))?,
        None => Policy::builtin().context("Built-in resolution policy is invalid")?,
    };

    let lockfile = Lockfile::load(&cli.lockfile)
        .with_context(|| format!("Failed to read lockfile {}", cli.lockfile.display()))?;
    let packages = select_packages(&lockfile, &config.registry_source, &cli.packages)?;
    info!(
        "Verifying {} packages from {}",
        packages.len(),
        cli.lockfile.display()
    );

    let tools = Toolchain::from_config(&config)?;
    let verifier = Verifier::new(&config, policy, tools)?;
    info!("Using cache at {}", verifier.layout().root().display());
    let reports = verifier.run(&packages)?;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Wrote report to {}", path.display());
    }

    let summary = RunSummary::from_reports(&reports);
    println!("Total number of packages: {}", summary.total);
    println!("Number of reproducible packages: {}", summary.reproducible);
    println!();
    for (label, count) in summary.breakdown() {
        if count > 0 {
            println!("  {:<38} {}", format!("{label}:"), count);
        }
    }

    let failures: Vec<_> = reports
        .iter()
        .filter(|r| !r.result.is_skipped() && r.result != Outcome::Reproducible)
        .collect();
    if !failures.is_empty() {
        println!();
        println!("Not reproducible:");
        for report in failures {
            match &report.diff_report {
                Some(diff) => println!(
                    "  {} ({}): {}",
                    report.fullname(),
                    report.outcome,
                    diff.display()
                ),
                None => println!("  {} ({})", report.fullname(), report.outcome),
            }
        }
    }

    Ok(())
}
