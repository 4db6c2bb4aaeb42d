//! Lockfile and manifest parsers.
//!
//! Every parser in this module is a pure function from raw file text (plus
//! an include-dev flag where the format records dev dependencies) to an
//! ordered list of [`Dependency`]. No I/O, no side effects. All parsers
//! deduplicate by `(name, version)` and keep the first occurrence, so
//! parsing the same text twice yields identical lists.

pub mod go;
pub mod npm;
pub mod pnpm;
pub mod poetry;
pub mod requirements;
pub mod yarn;

use std::collections::HashSet;

use crate::model::{Dependency, Ecosystem};

/// A parse failure, carrying only a message. Callers attach the file path
/// when converting to [`crate::ScanError`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(String);

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for ParseError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ParseError {
    fn from(err: toml::de::Error) -> Self {
        ParseError(err.to_string())
    }
}

/// Ordered dependency accumulator, unique by `(name, version)`.
pub(crate) struct DepList {
    ecosystem: Ecosystem,
    seen: HashSet<(String, String)>,
    deps: Vec<Dependency>,
}

impl DepList {
    pub(crate) fn new(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem,
            seen: HashSet::new(),
            deps: Vec::new(),
        }
    }

    /// Appends a dependency unless the `(name, version)` pair was already
    /// recorded. Empty names and versions are dropped.
    pub(crate) fn push(&mut self, name: &str, version: &str) {
        if name.is_empty() || version.is_empty() {
            return;
        }
        let key = (name.to_string(), version.to_string());
        if self.seen.insert(key) {
            self.deps
                .push(Dependency::new(name, version, self.ecosystem));
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Dependency> {
        self.deps
    }
}

/// Strips the conventional leading `v` from a version tag (`v1.2.3`).
pub(crate) fn strip_v_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_list_dedups_and_preserves_order() {
        let mut list = DepList::new(Ecosystem::Npm);
        list.push("b", "2.0.0");
        list.push("a", "1.0.0");
        list.push("b", "2.0.0");
        list.push("b", "2.0.1");

        let deps = list.into_vec();
        let names: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(names, vec!["b@2.0.0", "a@1.0.0", "b@2.0.1"]);
    }

    #[test]
    fn dep_list_drops_empty_fields() {
        let mut list = DepList::new(Ecosystem::Go);
        list.push("", "1.0.0");
        list.push("a/b", "");
        assert!(list.into_vec().is_empty());
    }

    #[test]
    fn strips_version_prefix() {
        assert_eq!(strip_v_prefix("v1.2.3"), "1.2.3");
        assert_eq!(strip_v_prefix("1.2.3"), "1.2.3");
    }
}
