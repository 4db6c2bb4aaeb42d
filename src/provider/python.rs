//! Python providers: Poetry (pyproject.toml / poetry.lock) and plain pip
//! (requirements.txt).

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    read_lockfile, run_package_manager, GatherOptions, GatherSource, LockfileOptions, Provider,
};
use crate::error::ScanError;
use crate::model::{Dependency, Detection, Ecosystem};
use crate::parser;

#[derive(Debug)]
pub struct PoetryProvider;

const PYPROJECT: &str = "pyproject.toml";
const POETRY_LOCK: &str = "poetry.lock";

#[async_trait]
impl Provider for PoetryProvider {
    fn name(&self) -> &'static str {
        "Python (Poetry)"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    fn manifest_filenames(&self) -> &[&'static str] {
        &[PYPROJECT]
    }

    fn lockfile_filenames(&self) -> &[&'static str] {
        &[POETRY_LOCK]
    }

    fn detect(&self, dir: &Path) -> Option<Detection> {
        if dir.join(POETRY_LOCK).is_file() {
            Some(Detection::new(Ecosystem::PyPI, self.name(), 1.0))
        } else if dir.join(PYPROJECT).is_file() {
            Some(Detection::new(Ecosystem::PyPI, self.name(), 0.7))
        } else {
            None
        }
    }

    async fn ensure_lockfile(&self, dir: &Path, opts: &LockfileOptions) -> Result<(), ScanError> {
        let present = dir.join(POETRY_LOCK).is_file();

        let args: &[&str] = if opts.force_refresh {
            &["lock"]
        } else if opts.force_validate {
            &["check", "--lock"]
        } else if !present && opts.create_if_missing {
            &["lock"]
        } else if present && opts.validate_if_present {
            &["check", "--lock"]
        } else {
            return Ok(());
        };

        run_package_manager("poetry", args, dir)
    }

    fn gather(
        &self,
        source: &GatherSource,
        opts: &GatherOptions,
    ) -> Result<Vec<Dependency>, ScanError> {
        match source {
            GatherSource::StandaloneLockfile(path) => {
                parse_standalone_poetry(path, opts.include_dev)
            }
            GatherSource::Directory(dir) => {
                let lock_path = dir.join(POETRY_LOCK);
                if lock_path.is_file() {
                    match parse_standalone_poetry(&lock_path, opts.include_dev) {
                        Ok(deps) => return Ok(deps),
                        Err(err) => {
                            warn!(path = %lock_path.display(), %err,
                                "poetry.lock parse failed, falling back to pyproject.toml");
                        }
                    }
                }
                let manifest = dir.join(PYPROJECT);
                if !manifest.is_file() {
                    return Err(ScanError::ManifestMissing(manifest));
                }
                debug!(path = %manifest.display(), "gathering declared ranges from pyproject");
                let text = std::fs::read_to_string(&manifest)?;
                parser::poetry::parse_pyproject(&text, opts.include_dev)
                    .map_err(|err| ScanError::parse(&manifest, err.to_string()))
            }
        }
    }
}

fn parse_standalone_poetry(path: &Path, include_dev: bool) -> Result<Vec<Dependency>, ScanError> {
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("");
    let text = read_lockfile(path)?;
    let result = match filename {
        POETRY_LOCK => parser::poetry::parse_poetry_lock(&text, include_dev),
        PYPROJECT => parser::poetry::parse_pyproject(&text, include_dev),
        other => {
            return Err(ScanError::parse(
                path,
                format!("unsupported Poetry file name: {other}"),
            ))
        }
    };
    result.map_err(|err| ScanError::parse(path, err.to_string()))
}

#[derive(Debug)]
pub struct PipProvider;

const REQUIREMENTS: &str = "requirements.txt";

#[async_trait]
impl Provider for PipProvider {
    fn name(&self) -> &'static str {
        "Python (pip)"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    fn manifest_filenames(&self) -> &[&'static str] {
        &[REQUIREMENTS]
    }

    fn lockfile_filenames(&self) -> &[&'static str] {
        &[]
    }

    fn detect(&self, dir: &Path) -> Option<Detection> {
        if dir.join(REQUIREMENTS).is_file() {
            Some(Detection::new(Ecosystem::PyPI, self.name(), 0.6))
        } else {
            None
        }
    }

    /// pip has no lockfile lifecycle; requirements files are authored by
    /// hand.
    async fn ensure_lockfile(&self, _dir: &Path, _opts: &LockfileOptions) -> Result<(), ScanError> {
        debug!("pip provider has no lockfile to manage");
        Ok(())
    }

    fn gather(
        &self,
        source: &GatherSource,
        _opts: &GatherOptions,
    ) -> Result<Vec<Dependency>, ScanError> {
        let path = match source {
            GatherSource::StandaloneLockfile(path) => path.clone(),
            GatherSource::Directory(dir) => {
                let path = dir.join(REQUIREMENTS);
                if !path.is_file() {
                    return Err(ScanError::ManifestMissing(path));
                }
                path
            }
        };
        let text = read_lockfile(&path)?;
        parser::requirements::parse(&text).map_err(|err| ScanError::parse(&path, err.to_string()))
    }
}
