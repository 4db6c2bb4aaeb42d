//! `go.sum` and `go.mod` parsing.

use super::{strip_v_prefix, DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

/// Parses a `go.sum` file: one `module version hash` triple per line.
/// Lines whose version token ends in `/go.mod` are checksums of go.mod
/// files, not module versions, and are skipped.
pub fn parse_go_sum(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut list = DepList::new(Ecosystem::Go);

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(module), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        if version.ends_with("/go.mod") {
            continue;
        }
        list.push(module, strip_v_prefix(version));
    }

    Ok(list.into_vec())
}

/// Parses a `go.mod` file: both parenthesized `require (...)` blocks and
/// bare `require module version` statements. A trailing `// indirect`
/// comment marks a transitive dependency, excluded unless `include_dev`.
pub fn parse_go_mod(text: &str, include_dev: bool) -> Result<Vec<Dependency>, ParseError> {
    let mut list = DepList::new(Ecosystem::Go);
    let mut in_require_block = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if in_require_block {
            if trimmed == ")" {
                in_require_block = false;
                continue;
            }
            push_requirement(trimmed, include_dev, &mut list);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_require_block = true;
            } else {
                push_requirement(rest, include_dev, &mut list);
            }
        }
    }

    Ok(list.into_vec())
}

fn push_requirement(line: &str, include_dev: bool, list: &mut DepList) {
    if line.is_empty() || line.starts_with("//") {
        return;
    }
    let indirect = line.contains("// indirect");
    if indirect && !include_dev {
        return;
    }
    let mut parts = line.split_whitespace();
    let (Some(module), Some(version)) = (parts.next(), parts.next()) else {
        return;
    };
    list.push(module, strip_v_prefix(version));
}
