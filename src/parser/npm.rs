//! `package-lock.json` parsing for lockfile versions 1 through 3.
//!
//! Version 3 lockfiles carry a flat `packages` map keyed by install path;
//! versions 1 and 2 are read from both the flat map (when present) and the
//! recursively nested `dependencies` tree, merged by `(name, version)`.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

#[derive(Deserialize)]
struct PackageLock {
    #[serde(rename = "lockfileVersion", default)]
    lockfile_version: u32,
    #[serde(default)]
    packages: BTreeMap<String, PackageEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, TreeEntry>,
}

#[derive(Deserialize)]
struct PackageEntry {
    version: Option<String>,
    #[serde(default)]
    dev: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    version: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, TreeEntry>,
}

/// Parses a `package-lock.json` document.
pub fn parse(text: &str, include_dev: bool) -> Result<Vec<Dependency>, ParseError> {
    let lock: PackageLock = serde_json::from_str(text)?;
    let mut list = DepList::new(Ecosystem::Npm);

    collect_packages(&lock.packages, include_dev, &mut list);
    if lock.lockfile_version < 3 {
        collect_tree(&lock.dependencies, include_dev, &mut list);
    }

    Ok(list.into_vec())
}

/// Flat `packages` map. The key is an install path: the package identity is
/// the final `node_modules/` segment chain. The empty root key and
/// `packages/...` workspace keys are skipped.
fn collect_packages(packages: &BTreeMap<String, PackageEntry>, include_dev: bool, list: &mut DepList) {
    for (key, entry) in packages {
        if key.is_empty() || key.starts_with("packages/") {
            continue;
        }
        if entry.dev && !include_dev {
            continue;
        }
        let Some(name) = name_from_path(key) else {
            continue;
        };
        if let Some(version) = &entry.version {
            list.push(name, version);
        }
    }
}

fn collect_tree(tree: &BTreeMap<String, TreeEntry>, include_dev: bool, list: &mut DepList) {
    for (name, entry) in tree {
        if !(entry.dev && !include_dev) {
            if let Some(version) = &entry.version {
                list.push(name, version);
            }
        }
        collect_tree(&entry.dependencies, include_dev, list);
    }
}

/// Extracts the package name from an install path key, e.g.
/// `node_modules/a/node_modules/@scope/b` -> `@scope/b`.
fn name_from_path(key: &str) -> Option<&str> {
    let idx = key.rfind("node_modules/")?;
    let name = &key[idx + "node_modules/".len()..];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_skips_root_and_workspace_keys() {
        let text = r#"{
            "lockfileVersion": 3,
            "packages": {
                "": { "version": "1.0.0" },
                "packages/app-a": { "version": "0.1.0" },
                "node_modules/lodash": { "version": "4.17.21" },
                "node_modules/a/node_modules/@scope/b": { "version": "2.0.0" }
            }
        }"#;
        let deps = parse(text, false).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["@scope/b@2.0.0", "lodash@4.17.21"]);
    }

    #[test]
    fn v3_excludes_dev_unless_requested() {
        let text = r#"{
            "lockfileVersion": 3,
            "packages": {
                "node_modules/jest": { "version": "29.0.0", "dev": true },
                "node_modules/lodash": { "version": "4.17.21" }
            }
        }"#;
        let deps = parse(text, false).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "lodash");

        let deps = parse(text, true).unwrap();
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn v1_walks_nested_tree() {
        let text = r#"{
            "lockfileVersion": 1,
            "dependencies": {
                "a": {
                    "version": "1.0.0",
                    "dependencies": {
                        "b": { "version": "2.0.0" }
                    }
                }
            }
        }"#;
        let deps = parse(text, false).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["a@1.0.0", "b@2.0.0"]);
    }

    #[test]
    fn v2_merges_flat_map_and_tree() {
        let text = r#"{
            "lockfileVersion": 2,
            "packages": {
                "": {},
                "node_modules/a": { "version": "1.0.0" }
            },
            "dependencies": {
                "a": { "version": "1.0.0" },
                "c": { "version": "3.0.0" }
            }
        }"#;
        let deps = parse(text, false).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["a@1.0.0", "c@3.0.0"]);
    }

    #[test]
    fn parse_is_idempotent() {
        let text = r#"{
            "lockfileVersion": 3,
            "packages": {
                "node_modules/lodash": { "version": "4.17.21" },
                "node_modules/ms": { "version": "2.1.3" }
            }
        }"#;
        assert_eq!(parse(text, false).unwrap(), parse(text, false).unwrap());
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse("not json", false).is_err());
    }
}
