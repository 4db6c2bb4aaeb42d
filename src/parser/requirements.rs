//! `requirements.txt` parsing (pip manifest, declared constraints only).

use super::{DepList, ParseError};
use crate::model::{Dependency, Ecosystem};

const CONSTRAINT_CHARS: [char; 5] = ['=', '>', '<', '~', '!'];

/// Parses a `requirements.txt` file.
///
/// Skips blank lines, `#` comments, `-e` editable installs, URL-form
/// lines, and `-`-prefixed option flags. An `==` clause yields an exact
/// version; any other constraint is retained verbatim; a bare name gets
/// `*`. Extras brackets and trailing inline comments are stripped, and
/// package names are lower-cased per registry normalization.
pub fn parse(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut list = DepList::new(Ecosystem::PyPI);

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if line.contains("://") {
            continue;
        }
        // Trailing inline comment.
        let line = match line.find(" #") {
            Some(idx) => line[..idx].trim_end(),
            None => line,
        };

        let (raw_name, version) = match line.split_once("==") {
            Some((name, version)) => (name, version.trim().to_string()),
            None => match line.find(CONSTRAINT_CHARS) {
                Some(idx) => (&line[..idx], line[idx..].trim().to_string()),
                None => (line, "*".to_string()),
            },
        };

        let name = strip_extras(raw_name.trim()).to_lowercase();
        list.push(&name, &version);
    }

    Ok(list.into_vec())
}

/// `package[extra1,extra2]` -> `package`.
fn strip_extras(name: &str) -> &str {
    match name.find('[') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_and_range_constraints() {
        let text = "django==4.2.0\nrequests>=2.0,<3.0\n# note\n-e git+https://x\n";
        let deps = parse(text).unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["django@4.2.0", "requests@>=2.0,<3.0"]);
    }

    #[test]
    fn bare_name_defaults_to_star() {
        let deps = parse("flask\n").unwrap();
        assert_eq!(deps[0].version, "*");
    }

    #[test]
    fn skips_urls_options_and_editable_installs() {
        let text = "--index-url https://pypi.org/simple\n-r other.txt\nhttps://files.example/pkg.whl\nflask==2.0.0\n";
        let deps = parse(text).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "flask");
    }

    #[test]
    fn strips_extras_and_inline_comments() {
        let deps = parse("uvicorn[standard]==0.23.0  # server\n").unwrap();
        assert_eq!(deps[0].key(), "uvicorn@0.23.0");
    }

    #[test]
    fn lowercases_package_names() {
        let deps = parse("Django==4.2.0\n").unwrap();
        assert_eq!(deps[0].name, "django");
    }

    #[test]
    fn tilde_constraint_is_retained_verbatim() {
        let deps = parse("celery~=5.3\n").unwrap();
        assert_eq!(deps[0].version, "~=5.3");
    }
}
