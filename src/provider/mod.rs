//! Ecosystem providers and the detection registry.
//!
//! A [`Provider`] wraps an ecosystem's parsers with filesystem detection,
//! lockfile lifecycle management, and the manifest-fallback policy.
//! Detection runs in a fixed priority order: Node, Go, Python-Poetry,
//! Python-Pip. Poetry is checked before pip because its manifest file,
//! `pyproject.toml`, is the more specific signal.
//!
//! # Example
//!
//! ```no_run
//! use depscan::provider::{select_provider, GatherOptions, GatherSource};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), depscan::ScanError> {
//! let dir = Path::new(".");
//! let (provider, detection) = select_provider(dir, None)?;
//! let deps = provider.gather(
//!     &GatherSource::Directory(dir.to_path_buf()),
//!     &GatherOptions { include_dev: false },
//! )?;
//! println!("{}: {} dependencies", detection.name, deps.len());
//! # Ok(())
//! # }
//! ```

mod go;
mod node;
mod python;

pub use go::GoProvider;
pub use node::NodeProvider;
pub use python::{PipProvider, PoetryProvider};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::model::{Dependency, Detection, Ecosystem};

/// Where a gather call reads its dependency set from.
///
/// The two modes carry different failure policies: a directory gather may
/// fall back from a broken lockfile to the manifest, a standalone lockfile
/// gather never substitutes another file for the one the user named.
#[derive(Debug, Clone)]
pub enum GatherSource {
    Directory(PathBuf),
    StandaloneLockfile(PathBuf),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GatherOptions {
    pub include_dev: bool,
}

/// Controls for [`Provider::ensure_lockfile`].
///
/// A forced refresh or validate always invokes the package manager; the
/// non-forced flags only act when the lockfile is missing (create) or
/// present (validate).
#[derive(Debug, Clone, Copy, Default)]
pub struct LockfileOptions {
    pub force_refresh: bool,
    pub force_validate: bool,
    pub create_if_missing: bool,
    pub validate_if_present: bool,
}

/// Capability contract implemented per ecosystem variant.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name, e.g. "Node.js".
    fn name(&self) -> &'static str;

    fn ecosystem(&self) -> Ecosystem;

    /// Human-authored manifest filenames this provider recognizes.
    fn manifest_filenames(&self) -> &[&'static str];

    /// Machine-generated lockfile filenames this provider recognizes.
    fn lockfile_filenames(&self) -> &[&'static str];

    /// Cheap filesystem probe; no mutation. Returns `None` when the
    /// directory shows no trace of this ecosystem.
    fn detect(&self, dir: &Path) -> Option<Detection>;

    /// Creates, refreshes, or validates the lockfile by invoking the
    /// ecosystem's package manager. A non-zero exit is fatal for this
    /// call.
    async fn ensure_lockfile(&self, dir: &Path, opts: &LockfileOptions) -> Result<(), ScanError>;

    /// Gathers the dependency list, preferring the resolved lockfile over
    /// the manifest when both exist.
    fn gather(&self, source: &GatherSource, opts: &GatherOptions)
        -> Result<Vec<Dependency>, ScanError>;
}

/// All providers in detection priority order.
pub fn all_providers() -> Vec<Box<dyn Provider>> {
    vec![
        Box::new(NodeProvider),
        Box::new(GoProvider),
        Box::new(PoetryProvider),
        Box::new(PipProvider),
    ]
}

/// Selects the provider for a directory, or for a standalone lockfile
/// path when one is given. Standalone selection maps the filename through
/// a static table without touching the filesystem beyond that one path.
pub fn select_provider(
    dir: &Path,
    standalone_lockfile: Option<&Path>,
) -> Result<(Box<dyn Provider>, Detection), ScanError> {
    if let Some(path) = standalone_lockfile {
        return detect_standalone(path);
    }

    for provider in all_providers() {
        if let Some(detection) = provider.detect(dir) {
            return Ok((provider, detection));
        }
    }

    Err(detection_failed(dir))
}

fn detection_failed(path: &Path) -> ScanError {
    let supported = all_providers()
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ");
    ScanError::DetectionFailed {
        path: path.to_path_buf(),
        supported,
    }
}

/// Maps a standalone manifest or lockfile name directly to a provider and
/// detection, covering every supported filename across ecosystems.
fn detect_standalone(path: &Path) -> Result<(Box<dyn Provider>, Detection), ScanError> {
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("");

    let (provider, variant): (Box<dyn Provider>, Option<&'static str>) = match filename {
        "package.json" | "package-lock.json" => (Box::new(NodeProvider), Some("npm")),
        "pnpm-lock.yaml" => (Box::new(NodeProvider), Some("pnpm")),
        "yarn.lock" => (Box::new(NodeProvider), Some("yarn")),
        "go.mod" | "go.sum" => (Box::new(GoProvider), None),
        "pyproject.toml" | "poetry.lock" => (Box::new(PoetryProvider), None),
        "requirements.txt" => (Box::new(PipProvider), None),
        _ => return Err(detection_failed(path)),
    };

    let mut detection = Detection::new(provider.ecosystem(), provider.name(), 1.0);
    detection.variant = variant;
    Ok((provider, detection))
}

/// Union of every provider's recognized manifest and lockfile names.
/// External callers use this to validate uploads before scanning.
pub fn supported_manifest_filenames() -> BTreeSet<&'static str> {
    let mut names = BTreeSet::new();
    for provider in all_providers() {
        names.extend(provider.manifest_filenames().iter().copied());
        names.extend(provider.lockfile_filenames().iter().copied());
    }
    names
}

/// Reads a lockfile or manifest, mapping a missing file to
/// [`ScanError::LockfileMissing`].
pub(crate) fn read_lockfile(path: &Path) -> Result<String, ScanError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ScanError::LockfileMissing(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Runs a package manager with an explicit argument vector (never through
/// a shell), waiting for exit. Non-zero exit is a fatal
/// [`ScanError::PackageManager`] carrying a stderr excerpt.
pub(crate) fn run_package_manager(
    program: &str,
    args: &[&str],
    dir: &Path,
) -> Result<(), ScanError> {
    tracing::debug!(program, ?args, "invoking package manager");
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|err| ScanError::PackageManager {
            program: program.to_string(),
            message: format!("failed to spawn: {err}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.lines().take(5).collect::<Vec<_>>().join("\n");
        return Err(ScanError::PackageManager {
            program: program.to_string(),
            message: format!("exit status {}: {excerpt}", output.status),
        });
    }

    Ok(())
}
