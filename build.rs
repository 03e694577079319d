// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common shape of a path-valued option
fn path_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).value_name("PATH").help(help)
}

fn build_cli() -> Command {
    Command::new("reprocheck")
        .version(env!("CARGO_PKG_VERSION"))
        .author("reprocheck contributors")
        .about("Verify that crates.io packages in a Cargo.lock rebuild byte-for-byte from source")
        .arg(
            Arg::new("lockfile")
                .required(true)
                .value_name("LOCKFILE")
                .help("Path to the Cargo.lock to verify"),
        )
        .arg(path_arg("config", "config", "Configuration file (TOML)").short('c'))
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .value_name("DIR")
                .help("Root of the download, checkout, rebuild and diff caches"),
        )
        .arg(path_arg(
            "policy",
            "policy",
            "Resolution policy replacing the built-in one",
        ))
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("SOURCE")
                .help("Lockfile source of the registry to verify"),
        )
        .arg(
            Arg::new("package")
                .short('p')
                .long("package")
                .value_name("NAME")
                .action(ArgAction::Append)
                .help("Only verify packages with this name (repeatable)"),
        )
        .arg(path_arg("report", "report", "Write per-package results as JSON"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Show debug output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only show warnings and errors"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("reprocheck.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
