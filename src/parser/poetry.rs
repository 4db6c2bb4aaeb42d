//! `poetry.lock` and `pyproject.toml` (Poetry) parsing.
//!
//! The lockfile carries resolved versions; the manifest is the
//! declared-ranges fallback when no lockfile exists.

use serde::Deserialize;

use super::{DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

#[derive(Deserialize)]
struct PoetryLock {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    category: Option<String>,
}

/// Parses a `poetry.lock` file. Packages with `category = "dev"` are
/// excluded unless `include_dev`.
pub fn parse_poetry_lock(text: &str, include_dev: bool) -> Result<Vec<Dependency>, ParseError> {
    let lock: PoetryLock = toml::from_str(text)?;
    let mut list = DepList::new(Ecosystem::PyPI);

    for pkg in &lock.package {
        let dev = pkg.category.as_deref() == Some("dev");
        if dev && !include_dev {
            continue;
        }
        list.push(&pkg.name, &pkg.version);
    }

    Ok(list.into_vec())
}

/// Parses a Poetry `pyproject.toml` manifest: declared ranges only.
///
/// `[tool.poetry.dependencies]` is always read; with `include_dev`, the
/// legacy `[tool.poetry.dev-dependencies]` table and the modern
/// `[tool.poetry.group.dev.dependencies]` table are read too. The
/// `python` pseudo-entry is excluded.
pub fn parse_pyproject(text: &str, include_dev: bool) -> Result<Vec<Dependency>, ParseError> {
    let doc: toml::Value = toml::from_str(text)?;
    let mut list = DepList::new(Ecosystem::PyPI);

    let poetry = doc.get("tool").and_then(|t| t.get("poetry"));
    let Some(poetry) = poetry else {
        return Ok(Vec::new());
    };

    collect_table(poetry.get("dependencies"), &mut list);
    if include_dev {
        collect_table(poetry.get("dev-dependencies"), &mut list);
        let group_dev = poetry
            .get("group")
            .and_then(|g| g.get("dev"))
            .and_then(|d| d.get("dependencies"));
        collect_table(group_dev, &mut list);
    }

    Ok(list.into_vec())
}

fn collect_table(table: Option<&toml::Value>, list: &mut DepList) {
    let Some(table) = table.and_then(|t| t.as_table()) else {
        return;
    };
    for (name, constraint) in table {
        if name == "python" {
            continue;
        }
        let version = match constraint {
            toml::Value::String(s) => s.clone(),
            // Table form: { version = "^1.0", extras = [...] }
            toml::Value::Table(t) => match t.get("version").and_then(|v| v.as_str()) {
                Some(v) => v.to_string(),
                None => "*".to_string(),
            },
            _ => "*".to_string(),
        };
        list.push(name, &version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_excludes_dev_category() {
        let text = r#"
[[package]]
name = "django"
version = "4.2.0"
category = "main"

[[package]]
name = "pytest"
version = "7.4.0"
category = "dev"
"#;
        let deps = parse_poetry_lock(text, false).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].key(), "django@4.2.0");

        assert_eq!(parse_poetry_lock(text, true).unwrap().len(), 2);
    }

    #[test]
    fn lock_without_category_is_main() {
        let text = "[[package]]\nname = \"requests\"\nversion = \"2.31.0\"\n";
        assert_eq!(parse_poetry_lock(text, false).unwrap().len(), 1);
    }

    #[test]
    fn pyproject_excludes_python_entry() {
        let text = r#"
[tool.poetry.dependencies]
python = "^3.11"
django = "^4.2"
requests = { version = ">=2.0", extras = ["security"] }
"#;
        let deps = parse_pyproject(text, false).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["django@^4.2", "requests@>=2.0"]);
    }

    #[test]
    fn pyproject_reads_dev_tables_when_requested() {
        let text = r#"
[tool.poetry.dependencies]
django = "^4.2"

[tool.poetry.dev-dependencies]
black = "^24.0"

[tool.poetry.group.dev.dependencies]
pytest = "^7.4"
"#;
        assert_eq!(parse_pyproject(text, false).unwrap().len(), 1);

        let deps = parse_pyproject(text, true).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["django", "black", "pytest"]);
    }

    #[test]
    fn pyproject_without_poetry_section_is_empty() {
        let text = "[project]\nname = \"x\"\n";
        assert!(parse_pyproject(text, true).unwrap().is_empty());
    }
}
