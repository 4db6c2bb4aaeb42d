//! `yarn.lock` parsing for both classic (v1) and berry (v2+) lockfiles.
//!
//! Classic lockfiles use yarn's own indented text format; berry lockfiles
//! are YAML with entries keyed `name@npm:range`. Both key forms may list
//! several comma-separated range specifiers for one package; the first is
//! canonical. Entries resolved through `file:`, `git:`, `git+` or
//! `github:` protocols are skipped in both formats.

use std::collections::BTreeMap;

use super::{DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

const SKIPPED_PROTOCOLS: [&str; 4] = ["file:", "git:", "git+", "github:"];

/// Parses a `yarn.lock` document, sniffing the format from its content.
pub fn parse(text: &str) -> Result<Vec<Dependency>, ParseError> {
    if is_berry(text) {
        parse_berry(text)
    } else {
        parse_classic(text)
    }
}

fn is_berry(text: &str) -> bool {
    text.lines()
        .any(|line| line.trim_start_matches('"').starts_with("__metadata"))
}

/// Classic (v1) format: an unindented `key:` line opens an entry, the
/// following indented `version "x.y.z"` line carries the version.
pub fn parse_classic(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut list = DepList::new(Ecosystem::Npm);
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.starts_with(' ') && line.trim_end().ends_with(':') {
            let key = line.trim_end().trim_end_matches(':');
            current = entry_name(key);
            continue;
        }
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("version ") {
            if let Some(name) = current.take() {
                let version = rest.trim().trim_matches('"');
                list.push(&name, version);
            }
        }
    }

    Ok(list.into_vec())
}

/// Berry (v2+) format: YAML keyed `name@npm:range`, with a `__metadata`
/// block describing the lockfile itself.
pub fn parse_berry(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: BTreeMap<String, serde_yaml_ng::Value> = serde_yaml_ng::from_str(text)?;
    let mut list = DepList::new(Ecosystem::Npm);

    for (key, entry) in &doc {
        if key.starts_with("__metadata") {
            continue;
        }
        let (Some(name), Some(version)) = (entry_name(key), entry_version(entry)) else {
            continue;
        };
        list.push(&name, &version);
    }

    Ok(list.into_vec())
}

/// Berry writes versions as YAML scalars, which may parse as strings or
/// numbers depending on quoting.
fn entry_version(entry: &serde_yaml_ng::Value) -> Option<String> {
    match entry.get("version")? {
        serde_yaml_ng::Value::String(s) => Some(s.clone()),
        serde_yaml_ng::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extracts the canonical package name from an entry key. The first
/// comma-separated specifier wins; protocol-resolved specifiers yield
/// `None`.
fn entry_name(key: &str) -> Option<String> {
    let first = key.split(',').next()?.trim().trim_matches('"');
    let at = first.rfind('@').filter(|&idx| idx > 0)?;
    let (name, range) = (&first[..at], &first[at + 1..]);
    let range = range.strip_prefix("npm:").unwrap_or(range);
    if SKIPPED_PROTOCOLS.iter().any(|p| range.starts_with(p)) {
        return None;
    }
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.8.3":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame"

lodash@^4.17.0:
  version "4.17.21"

local-pkg@file:../local:
  version "0.0.1"
"#;

    #[test]
    fn classic_uses_first_specifier_as_name() {
        let deps = parse(CLASSIC).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(
            keys,
            vec!["@babel/code-frame@7.12.13", "lodash@4.17.21"]
        );
    }

    #[test]
    fn classic_skips_protocol_entries() {
        for proto in ["file:../x", "git:x", "git+ssh://x", "github:a/b"] {
            let text = format!("pkg@{proto}:\n  version \"1.0.0\"\n");
            assert!(parse_classic(&text).unwrap().is_empty(), "{proto}");
        }
    }

    #[test]
    fn berry_skips_metadata_block() {
        let text = r#"
"__metadata":
  version: 6
  cacheKey: 8

"lodash@npm:^4.17.0":
  version: "4.17.21"

"@scope/a@npm:^1.0.0, @scope/a@npm:^1.2.0":
  version: "1.2.3"
"#;
        let deps = parse(text).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["@scope/a@1.2.3", "lodash@4.17.21"]);
    }

    #[test]
    fn berry_skips_protocol_entries() {
        let text = "\"__metadata\":\n  version: 6\n\"pkg@github:a/b\":\n  version: \"1.0.0\"\n";
        assert!(parse(text).unwrap().is_empty());
    }
}
