//! Node.js provider: npm, pnpm, and yarn (classic + berry) variants.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{read_lockfile, run_package_manager, GatherOptions, GatherSource, LockfileOptions, Provider};
use crate::error::ScanError;
use crate::model::{Dependency, Detection, Ecosystem};
use crate::parser::{self, DepList};

#[derive(Debug)]
pub struct NodeProvider;

const MANIFEST: &str = "package.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Npm,
    Pnpm,
    Yarn,
}

impl Variant {
    fn as_str(self) -> &'static str {
        match self {
            Variant::Npm => "npm",
            Variant::Pnpm => "pnpm",
            Variant::Yarn => "yarn",
        }
    }
}

/// Lockfile lookup in preference order. npm's lockfile is checked first
/// as the most common layout.
fn lockfile_in(dir: &Path) -> Option<(PathBuf, Variant)> {
    for (name, variant) in [
        ("package-lock.json", Variant::Npm),
        ("pnpm-lock.yaml", Variant::Pnpm),
        ("yarn.lock", Variant::Yarn),
    ] {
        let path = dir.join(name);
        if path.is_file() {
            return Some((path, variant));
        }
    }
    None
}

#[async_trait]
impl Provider for NodeProvider {
    fn name(&self) -> &'static str {
        "Node.js"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    fn manifest_filenames(&self) -> &[&'static str] {
        &[MANIFEST]
    }

    fn lockfile_filenames(&self) -> &[&'static str] {
        &["package-lock.json", "pnpm-lock.yaml", "yarn.lock"]
    }

    fn detect(&self, dir: &Path) -> Option<Detection> {
        if let Some((_, variant)) = lockfile_in(dir) {
            return Some(
                Detection::new(Ecosystem::Npm, self.name(), 1.0).with_variant(variant.as_str()),
            );
        }
        if dir.join(MANIFEST).is_file() {
            return Some(
                Detection::new(Ecosystem::Npm, self.name(), 0.5).with_variant(Variant::Npm.as_str()),
            );
        }
        None
    }

    async fn ensure_lockfile(&self, dir: &Path, opts: &LockfileOptions) -> Result<(), ScanError> {
        let existing = lockfile_in(dir);
        let variant = existing.as_ref().map(|(_, v)| *v).unwrap_or(Variant::Npm);
        let present = existing.is_some();

        let args = if opts.force_refresh {
            refresh_command(variant)
        } else if opts.force_validate {
            validate_command(variant, dir)
        } else if !present && opts.create_if_missing {
            refresh_command(variant)
        } else if present && opts.validate_if_present {
            validate_command(variant, dir)
        } else {
            return Ok(());
        };

        run_package_manager(variant.as_str(), &args, dir)
    }

    fn gather(
        &self,
        source: &GatherSource,
        opts: &GatherOptions,
    ) -> Result<Vec<Dependency>, ScanError> {
        match source {
            GatherSource::StandaloneLockfile(path) => parse_standalone(path, opts.include_dev),
            GatherSource::Directory(dir) => {
                if let Some((lock_path, _)) = lockfile_in(dir) {
                    match parse_standalone(&lock_path, opts.include_dev) {
                        Ok(deps) => return Ok(deps),
                        Err(err) => {
                            warn!(path = %lock_path.display(), %err,
                                "lockfile parse failed, falling back to manifest");
                        }
                    }
                }
                gather_manifest(dir, opts.include_dev)
            }
        }
    }
}

fn refresh_command(variant: Variant) -> Vec<&'static str> {
    match variant {
        Variant::Npm => vec!["install", "--package-lock-only"],
        Variant::Pnpm => vec!["install", "--lockfile-only"],
        Variant::Yarn => vec!["install", "--mode", "update-lockfile"],
    }
}

fn validate_command(variant: Variant, dir: &Path) -> Vec<&'static str> {
    match variant {
        Variant::Npm => vec!["ls", "--all"],
        Variant::Pnpm => vec!["ls"],
        Variant::Yarn => {
            // Berry and classic spell "refuse to change the lockfile"
            // differently.
            let berry = std::fs::read_to_string(dir.join("yarn.lock"))
                .map(|text| text.contains("__metadata"))
                .unwrap_or(false);
            if berry {
                vec!["install", "--immutable"]
            } else {
                vec!["install", "--frozen-lockfile"]
            }
        }
    }
}

/// Parses a single lockfile or manifest, inferring the parser purely from
/// the filename. Parse failures propagate; this path never falls back.
fn parse_standalone(path: &Path, include_dev: bool) -> Result<Vec<Dependency>, ScanError> {
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("");
    let text = read_lockfile(path)?;

    let result = match filename {
        "package-lock.json" => parser::npm::parse(&text, include_dev),
        "pnpm-lock.yaml" => parser::pnpm::parse(&text, include_dev),
        "yarn.lock" => parser::yarn::parse(&text),
        MANIFEST => parse_manifest_text(&text, include_dev),
        other => {
            return Err(ScanError::parse(
                path,
                format!("unsupported Node.js file name: {other}"),
            ))
        }
    };

    result.map_err(|err| ScanError::parse(path, err.to_string()))
}

fn gather_manifest(dir: &Path, include_dev: bool) -> Result<Vec<Dependency>, ScanError> {
    let path = dir.join(MANIFEST);
    if !path.is_file() {
        return Err(ScanError::ManifestMissing(path));
    }
    debug!(path = %path.display(), "gathering declared ranges from manifest");
    let text = std::fs::read_to_string(&path)?;
    parse_manifest_text(&text, include_dev).map_err(|err| ScanError::parse(&path, err.to_string()))
}

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies", default)]
    dev_dependencies: BTreeMap<String, String>,
}

fn parse_manifest_text(
    text: &str,
    include_dev: bool,
) -> Result<Vec<Dependency>, parser::ParseError> {
    let manifest: PackageManifest = serde_json::from_str(text)?;
    let mut list = DepList::new(Ecosystem::Npm);
    for (name, range) in &manifest.dependencies {
        list.push(name, range);
    }
    if include_dev {
        for (name, range) in &manifest.dev_dependencies {
            list.push(name, range);
        }
    }
    Ok(list.into_vec())
}
