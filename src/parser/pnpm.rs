//! `pnpm-lock.yaml` parsing.
//!
//! Package spec keys look like `/foo@1.0.0` (older lockfiles) or
//! `foo@1.0.0`, optionally followed by a parenthesized peer-dependency
//! suffix such as `foo@1.0.0(bar@2.0.0)`. Catalog references carry the
//! resolved version on the package record itself.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

#[derive(Deserialize)]
struct PnpmLock {
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
}

#[derive(Deserialize, Default)]
struct PackageRecord {
    #[serde(default)]
    dev: bool,
    version: Option<String>,
}

/// Parses a `pnpm-lock.yaml` document.
pub fn parse(text: &str, include_dev: bool) -> Result<Vec<Dependency>, ParseError> {
    let lock: PnpmLock = serde_yaml_ng::from_str(text)?;
    let mut list = DepList::new(Ecosystem::Npm);

    for (spec, record) in &lock.packages {
        if record.dev && !include_dev {
            continue;
        }
        if spec.contains("workspace:") {
            continue;
        }
        let Some((name, spec_version)) = split_spec(spec) else {
            continue;
        };
        // Catalog references resolve on the record; the spec's trailing
        // token is the fallback.
        let version = record.version.as_deref().unwrap_or(spec_version);
        if version.starts_with("catalog:") || version.starts_with("link:") {
            continue;
        }
        list.push(name, version);
    }

    Ok(list.into_vec())
}

/// Splits a package spec key into `(name, version)`. The leading `/` of
/// older lockfile formats and any peer-dependency suffix are stripped
/// before the trailing `@` token is taken as the version.
fn split_spec(spec: &str) -> Option<(&str, &str)> {
    let spec = spec.strip_prefix('/').unwrap_or(spec);
    let spec = match spec.find('(') {
        Some(idx) => &spec[..idx],
        None => spec,
    };
    // Skip position 0 so scoped names keep their leading `@`.
    let at = spec.rfind('@').filter(|&idx| idx > 0)?;
    let (name, version) = (&spec[..at], &spec[at + 1..]);
    if name.is_empty() || version.is_empty() {
        None
    } else {
        Some((name, version))
    }
}
