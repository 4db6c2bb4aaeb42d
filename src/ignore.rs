//! Ignore-rule engine: user-authored suppression of advisories.
//!
//! The ignore file is an externally authored JSON document:
//!
//! ```json
//! {
//!   "version": "1",
//!   "ignores": [
//!     { "id": "GHSA-xxxx-yyyy-zzzz", "reason": "not reachable" },
//!     { "package": "lodash", "packageVersion": "4.17.20", "expires": "2026-12-31" }
//!   ]
//! }
//! ```
//!
//! Suppression only affects the returned view, never the underlying
//! merged advisory set.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Dependency, UnifiedAdvisory};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub ignores: Vec<IgnoreRule>,
}

/// One suppression directive. Inert once `expires` is in the past.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreRule {
    /// Advisory id, CVE alias, or `package@version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(rename = "packageVersion", skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD` (midnight UTC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IgnoreRule {
    /// A rule with an unparsable or past expiry behaves as if absent.
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        match &self.expires {
            None => true,
            Some(raw) => match parse_expiry(raw) {
                Some(expires) => expires > now,
                None => false,
            },
        }
    }

    fn matches(&self, advisory: &UnifiedAdvisory, dep: Option<&Dependency>) -> bool {
        if let Some(id) = &self.id {
            if id == &advisory.id {
                return true;
            }
            if advisory.cve_ids.iter().any(|cve| cve == id) {
                return true;
            }
            // `package@version` form: both components must match the
            // dependency the advisory is attached to.
            if let (Some(dep), Some((name, version))) = (dep, split_package_id(id)) {
                if dep.name == name && dep.version == version {
                    return true;
                }
            }
        }

        if let (Some(package), Some(dep)) = (&self.package, dep) {
            if package == &dep.name {
                return match &self.package_version {
                    Some(version) => version == &dep.version,
                    None => true,
                };
            }
        }

        false
    }
}

/// Splits `package@version`, tolerating scoped npm names like
/// `@scope/name@1.0.0`.
fn split_package_id(id: &str) -> Option<(&str, &str)> {
    let at = id.rfind('@').filter(|&idx| idx > 0)?;
    Some((&id[..at], &id[at + 1..]))
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

/// Loads the ignore file. A missing or unparsable file yields `None` and
/// never aborts the scan.
pub fn load_ignore_config(path: &Path) -> Option<IgnoreConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "no ignore file loaded");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignore file is not valid JSON, ignoring it");
            None
        }
    }
}

/// Applies the ignore rules to the merged advisory map. Rules are
/// evaluated in file order; the first active match suppresses the
/// advisory. Returns the filtered view and the suppressed count.
pub fn filter_advisories(
    advisories_by_package: &BTreeMap<String, Vec<UnifiedAdvisory>>,
    deps: &[Dependency],
    config: Option<&IgnoreConfig>,
) -> (BTreeMap<String, Vec<UnifiedAdvisory>>, usize) {
    let Some(config) = config else {
        return (advisories_by_package.clone(), 0);
    };

    let now = Utc::now();
    let deps_by_key: HashMap<String, &Dependency> =
        deps.iter().map(|dep| (dep.key(), dep)).collect();

    let mut filtered = BTreeMap::new();
    let mut suppressed = 0usize;

    for (key, advisories) in advisories_by_package {
        let dep = deps_by_key.get(key).copied();
        let kept: Vec<UnifiedAdvisory> = advisories
            .iter()
            .filter(|advisory| {
                let hit = config
                    .ignores
                    .iter()
                    .find(|rule| rule.is_active(now) && rule.matches(advisory, dep));
                if let Some(rule) = hit {
                    suppressed += 1;
                    debug!(
                        advisory = %advisory.id,
                        package = %key,
                        reason = rule.reason.as_deref().unwrap_or("unspecified"),
                        "advisory suppressed by ignore rule"
                    );
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        if !kept.is_empty() {
            filtered.insert(key.clone(), kept);
        }
    }

    (filtered, suppressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdvisorySource, Ecosystem, Severity};

    fn advisory(id: &str, cve: Option<&str>) -> UnifiedAdvisory {
        UnifiedAdvisory {
            id: id.to_string(),
            source: AdvisorySource::Osv,
            severity: Severity::High,
            summary: None,
            details: None,
            references: vec![],
            first_patched_version: None,
            cve_ids: cve.map(|c| vec![c.to_string()]).unwrap_or_default(),
        }
    }

    fn fixture() -> (BTreeMap<String, Vec<UnifiedAdvisory>>, Vec<Dependency>) {
        let deps = vec![
            Dependency::new("lodash", "4.17.20", Ecosystem::Npm),
            Dependency::new("lodash", "3.0.0", Ecosystem::Npm),
        ];
        let mut map = BTreeMap::new();
        map.insert(
            "lodash@4.17.20".to_string(),
            vec![advisory("GHSA-aaaa", Some("CVE-2021-23337"))],
        );
        map.insert("lodash@3.0.0".to_string(), vec![advisory("GHSA-bbbb", None)]);
        (map, deps)
    }

    fn config(rule: IgnoreRule) -> IgnoreConfig {
        IgnoreConfig {
            version: None,
            ignores: vec![rule],
        }
    }

    #[test]
    fn no_config_passes_everything_through() {
        let (map, deps) = fixture();
        let (filtered, suppressed) = filter_advisories(&map, &deps, None);
        assert_eq!(filtered.len(), 2);
        assert_eq!(suppressed, 0);
    }

    #[test]
    fn package_rule_without_version_suppresses_all_versions() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            package: Some("lodash".to_string()),
            ..Default::default()
        });
        let (filtered, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert!(filtered.is_empty());
        assert_eq!(suppressed, 2);
    }

    #[test]
    fn package_rule_with_version_suppresses_only_that_version() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            package: Some("lodash".to_string()),
            package_version: Some("4.17.20".to_string()),
            ..Default::default()
        });
        let (filtered, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert_eq!(suppressed, 1);
        assert!(!filtered.contains_key("lodash@4.17.20"));
        assert!(filtered.contains_key("lodash@3.0.0"));
    }

    #[test]
    fn id_rule_matches_advisory_id_and_cve_alias() {
        let (map, deps) = fixture();

        let by_id = config(IgnoreRule {
            id: Some("GHSA-aaaa".to_string()),
            ..Default::default()
        });
        let (_, suppressed) = filter_advisories(&map, &deps, Some(&by_id));
        assert_eq!(suppressed, 1);

        let by_cve = config(IgnoreRule {
            id: Some("CVE-2021-23337".to_string()),
            ..Default::default()
        });
        let (_, suppressed) = filter_advisories(&map, &deps, Some(&by_cve));
        assert_eq!(suppressed, 1);
    }

    #[test]
    fn package_at_version_id_form_matches_dependency() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            id: Some("lodash@4.17.20".to_string()),
            ..Default::default()
        });
        let (filtered, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert_eq!(suppressed, 1);
        assert!(filtered.contains_key("lodash@3.0.0"));
    }

    #[test]
    fn expired_rule_behaves_as_absent() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            package: Some("lodash".to_string()),
            expires: Some("2000-01-01".to_string()),
            ..Default::default()
        });
        let (filtered, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert_eq!(filtered.len(), 2);
        assert_eq!(suppressed, 0);
    }

    #[test]
    fn future_expiry_keeps_rule_active() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            package: Some("lodash".to_string()),
            expires: Some("2999-01-01T00:00:00Z".to_string()),
            ..Default::default()
        });
        let (_, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert_eq!(suppressed, 2);
    }

    #[test]
    fn unparsable_expiry_disables_the_rule() {
        let (map, deps) = fixture();
        let cfg = config(IgnoreRule {
            package: Some("lodash".to_string()),
            expires: Some("next tuesday".to_string()),
            ..Default::default()
        });
        let (_, suppressed) = filter_advisories(&map, &deps, Some(&cfg));
        assert_eq!(suppressed, 0);
    }

    #[test]
    fn load_missing_file_is_absent() {
        assert!(load_ignore_config(Path::new("/nonexistent/ignores.json")).is_none());
    }

    #[test]
    fn load_unparsable_file_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ignores.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_ignore_config(&path).is_none());
    }

    #[test]
    fn load_valid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ignores.json");
        std::fs::write(
            &path,
            r#"{ "version": "1", "ignores": [{ "package": "lodash", "reason": "vendored" }] }"#,
        )
        .unwrap();
        let cfg = load_ignore_config(&path).unwrap();
        assert_eq!(cfg.ignores.len(), 1);
        assert_eq!(cfg.ignores[0].package.as_deref(), Some("lodash"));
    }
}
