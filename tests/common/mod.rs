// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! A [`Harness`] owns a scratch directory, a lockfile under construction and
//! a [`World`] of fake external tools. The fakes count every call so tests
//! can assert what a run did and did not touch.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use reprocheck::config::CRATES_IO_SOURCE;
use reprocheck::hash::sha256_bytes;
use reprocheck::process::ToolOutput;
use reprocheck::{
    ArchiveDownloader, BuildRequest, Config, DiffReporter, Error, Lockfile, PackageBuilder,
    PackageReport, Policy, Result, Toolchain, ToolOutcome, VcsClient, Verifier, select_packages,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";

/// State shared by all fake tools of one harness
#[derive(Default)]
pub struct World {
    /// Download URL -> archive bytes
    pub archives: RefCell<HashMap<String, Vec<u8>>>,
    /// Repository URL -> directories present in a checkout
    pub repos: RefCell<HashMap<String, Vec<String>>>,
    pub broken_repos: RefCell<HashSet<String>>,
    /// `<name>-<version>` -> bytes the build produces
    pub rebuilt: RefCell<HashMap<String, Vec<u8>>>,
    pub downloads: Cell<usize>,
    pub clones: Cell<usize>,
    pub builds: Cell<usize>,
    pub diffs: Cell<usize>,
    /// The diff tool cannot be started
    pub diff_missing: Cell<bool>,
}

impl World {
    /// Download, clone and build calls so far
    pub fn network_and_build_calls(&self) -> (usize, usize, usize) {
        (self.downloads.get(), self.clones.get(), self.builds.get())
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// One handle implementing every tool trait over a shared [`World`]
#[derive(Clone)]
pub struct FakeTools(pub Rc<World>);

impl ArchiveDownloader for FakeTools {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        bump(&self.0.downloads);
        let archives = self.0.archives.borrow();
        let bytes = archives
            .get(url)
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 Not Found from {url}")))?;
        fs::create_dir_all(dest.parent().unwrap())?;
        fs::write(dest, bytes)?;
        Ok(())
    }
}

impl VcsClient for FakeTools {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        bump(&self.0.clones);
        if self.0.broken_repos.borrow().contains(url) {
            return Err(Error::FetchError(format!("'git clone {url}' failed: not found")));
        }
        fs::create_dir_all(dest)?;
        if let Some(dirs) = self.0.repos.borrow().get(url) {
            for dir in dirs {
                fs::create_dir_all(dest.join(dir))?;
            }
        }
        Ok(())
    }

    fn checkout_detached(&self, _repo: &Path, _revision: &str) -> Result<()> {
        Ok(())
    }
}

impl PackageBuilder for FakeTools {
    fn package(&self, request: &BuildRequest) -> Result<ToolOutcome> {
        bump(&self.0.builds);
        let fullname = request
            .artifact
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        match self.0.rebuilt.borrow().get(&fullname) {
            Some(bytes) => {
                fs::create_dir_all(request.artifact.parent().unwrap())?;
                fs::write(&request.artifact, bytes)?;
                Ok(ToolOutcome::Success(ToolOutput::default()))
            }
            None => Ok(ToolOutcome::Failed {
                code: Some(101),
                output: ToolOutput {
                    stdout: Vec::new(),
                    stderr: b"error: could not compile".to_vec(),
                },
            }),
        }
    }
}

impl DiffReporter for FakeTools {
    fn explain(&self, original: &Path, candidate: &Path) -> Result<ToolOutcome> {
        bump(&self.0.diffs);
        if self.0.diff_missing.get() {
            return Err(Error::ToolError(
                "Failed to spawn 'diffoscope': No such file or directory".to_string(),
            ));
        }
        let report = format!("--- {}\n+++ {}\n", original.display(), candidate.display());
        Ok(ToolOutcome::Failed {
            code: Some(1),
            output: ToolOutput {
                stdout: report.into_bytes(),
                stderr: Vec::new(),
            },
        })
    }
}

/// Build a gzipped tarball laid out like a published `.crate`
pub fn crate_archive(fullname: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{fullname}/{name}"), content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// What happens when a package is rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    Identical,
    Different,
    Fails,
}

/// A package published to the fake registry
#[derive(Debug, Clone)]
pub struct PublishedCrate {
    pub name: String,
    pub version: String,
    pub repository: Option<String>,
    /// `None` publishes without `.cargo_vcs_info.json`
    pub path_in_vcs: Option<Option<String>>,
    pub rebuild: Rebuild,
}

impl PublishedCrate {
    /// A package with provenance at the repository root that rebuilds identically
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            repository: Some(format!("https://github.com/example/{name}")),
            path_in_vcs: Some(None),
            rebuild: Rebuild::Identical,
        }
    }

    pub fn rebuild(mut self, rebuild: Rebuild) -> Self {
        self.rebuild = rebuild;
        self
    }

    pub fn repository(mut self, repository: Option<&str>) -> Self {
        self.repository = repository.map(str::to_string);
        self
    }

    pub fn path_in_vcs(mut self, path: &str) -> Self {
        self.path_in_vcs = Some(Some(path.to_string()));
        self
    }

    pub fn without_vcs_info(mut self) -> Self {
        self.path_in_vcs = None;
        self
    }

    pub fn fullname(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

struct LockEntry {
    name: String,
    version: String,
    source: Option<String>,
    checksum: Option<String>,
}

pub struct Harness {
    pub dir: TempDir,
    pub world: Rc<World>,
    entries: Vec<LockEntry>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            world: Rc::new(World::default()),
            entries: Vec::new(),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("crates")
    }

    pub fn config(&self) -> Config {
        Config {
            cache_dir: self.cache_dir(),
            ..Config::default()
        }
    }

    pub fn download_url(&self, name: &str, version: &str) -> String {
        self.config().archive_url(name, version)
    }

    /// Publish a package and lock it from the registry; returns the checksum
    pub fn publish(&mut self, krate: PublishedCrate) -> String {
        let fullname = krate.fullname();
        let mut manifest = format!(
            "[package]\nname = \"{}\"\nversion = \"{}\"\n",
            krate.name, krate.version
        );
        if let Some(repository) = &krate.repository {
            manifest.push_str(&format!("repository = \"{repository}\"\n"));
        }

        let vcs_info = krate.path_in_vcs.as_ref().map(|path| match path {
            Some(path) => format!(r#"{{"git":{{"sha1":"{REVISION}"}},"path_in_vcs":"{path}"}}"#),
            None => format!(r#"{{"git":{{"sha1":"{REVISION}"}},"path_in_vcs":""}}"#),
        });

        let mut files = vec![("Cargo.toml", manifest.as_str()), ("src/lib.rs", "")];
        if let Some(vcs_info) = &vcs_info {
            files.push((".cargo_vcs_info.json", vcs_info.as_str()));
        }
        let bytes = crate_archive(&fullname, &files);
        let checksum = sha256_bytes(&bytes).to_string();

        if let Some(repository) = &krate.repository {
            let dirs = match &krate.path_in_vcs {
                Some(Some(path)) => vec![path.clone()],
                _ => Vec::new(),
            };
            self.world
                .repos
                .borrow_mut()
                .insert(repository.clone(), dirs);
        }

        match krate.rebuild {
            Rebuild::Identical => {
                self.world.rebuilt.borrow_mut().insert(fullname, bytes.clone());
            }
            Rebuild::Different => {
                let mut different = bytes.clone();
                different.extend_from_slice(b"trailing");
                self.world.rebuilt.borrow_mut().insert(fullname, different);
            }
            Rebuild::Fails => {}
        }

        self.world
            .archives
            .borrow_mut()
            .insert(self.download_url(&krate.name, &krate.version), bytes);
        self.lock(&krate.name, &krate.version, Some(CRATES_IO_SOURCE), Some(&checksum));
        checksum
    }

    /// Add a raw lockfile entry
    pub fn lock(
        &mut self,
        name: &str,
        version: &str,
        source: Option<&str>,
        checksum: Option<&str>,
    ) {
        self.entries.push(LockEntry {
            name: name.to_string(),
            version: version.to_string(),
            source: source.map(str::to_string),
            checksum: checksum.map(str::to_string),
        });
    }

    pub fn break_repository(&self, url: &str) {
        self.world.broken_repos.borrow_mut().insert(url.to_string());
    }

    pub fn write_lockfile(&self) -> PathBuf {
        let mut content = String::from("version = 3\n");
        for entry in &self.entries {
            content.push_str(&format!(
                "\n[[package]]\nname = \"{}\"\nversion = \"{}\"\n",
                entry.name, entry.version
            ));
            if let Some(source) = &entry.source {
                content.push_str(&format!("source = \"{source}\"\n"));
            }
            if let Some(checksum) = &entry.checksum {
                content.push_str(&format!("checksum = \"{checksum}\"\n"));
            }
        }
        let path = self.dir.path().join("Cargo.lock");
        fs::write(&path, content).unwrap();
        path
    }

    pub fn toolchain(&self) -> Toolchain {
        let tools = FakeTools(Rc::clone(&self.world));
        Toolchain {
            downloader: Box::new(tools.clone()),
            vcs: Box::new(tools.clone()),
            builder: Box::new(tools.clone()),
            differ: Box::new(tools),
        }
    }

    /// Run the whole pipeline over the current lockfile with the built-in policy
    pub fn run(&self) -> Result<Vec<PackageReport>> {
        let config = self.config();
        let lockfile = Lockfile::load(&self.write_lockfile())?;
        let packages = select_packages(&lockfile, &config.registry_source, &[])?;
        let verifier = Verifier::new(&config, Policy::builtin()?, self.toolchain())?;
        verifier.run(&packages)
    }
}
