//! Source A: the OSV.dev batch vulnerability index.

use serde::{Deserialize, Serialize};

use super::retry::{with_retry, ATTEMPT_TIMEOUT};
use crate::error::ScanError;
use crate::model::{AdvisorySource, Dependency, Severity, UnifiedAdvisory};

/// Maximum number of queries OSV.dev accepts in a single batch request.
/// A longer caller-assembled batch fails before any network call.
pub const OSV_BATCH_LIMIT: usize = 50;

const DEFAULT_BASE_URL: &str = "https://api.osv.dev";

pub struct OsvClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsvClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Overrides the API host, for tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(ATTEMPT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    /// Queries one batch of up to [`OSV_BATCH_LIMIT`] dependencies.
    ///
    /// The result has the same length and order as `deps`: entry `i`
    /// holds the advisories for `deps[i]`.
    pub async fn query_batch(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<Vec<UnifiedAdvisory>>, ScanError> {
        if deps.len() > OSV_BATCH_LIMIT {
            return Err(ScanError::BatchTooLarge {
                len: deps.len(),
                limit: OSV_BATCH_LIMIT,
            });
        }
        if deps.is_empty() {
            return Ok(Vec::new());
        }

        let batch = OsvBatchQuery {
            queries: deps
                .iter()
                .map(|dep| OsvBatchQueryItem {
                    package: OsvPackage {
                        name: dep.name.clone(),
                        ecosystem: dep.ecosystem.osv_name().to_string(),
                    },
                    version: dep.version.clone(),
                })
                .collect(),
        };

        let url = format!("{}/v1/querybatch", self.base_url);
        let client = &self.client;
        let url = url.as_str();
        let batch = &batch;
        let response: OsvBatchResponse = with_retry(move || async move {
            let response = client
                .post(url)
                .json(&batch)
                .send()
                .await
                .map_err(|err| ScanError::advisory(AdvisorySource::Osv, err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ScanError::advisory(
                    AdvisorySource::Osv,
                    format!("unexpected status {status}"),
                ));
            }

            response
                .json::<OsvBatchResponse>()
                .await
                .map_err(|err| ScanError::advisory(AdvisorySource::Osv, err.to_string()))
        })
        .await?;

        if response.results.len() != deps.len() {
            return Err(ScanError::advisory(
                AdvisorySource::Osv,
                format!(
                    "response has {} results for {} queries",
                    response.results.len(),
                    deps.len()
                ),
            ));
        }

        Ok(response
            .results
            .into_iter()
            .map(|result| {
                result
                    .vulns
                    .unwrap_or_default()
                    .into_iter()
                    .map(unify)
                    .collect()
            })
            .collect())
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OsvBatchQuery {
    queries: Vec<OsvBatchQueryItem>,
}

#[derive(Serialize)]
struct OsvBatchQueryItem {
    package: OsvPackage,
    version: String,
}

#[derive(Serialize)]
struct OsvPackage {
    name: String,
    ecosystem: String,
}

#[derive(Deserialize)]
struct OsvBatchResponse {
    results: Vec<OsvBatchResult>,
}

#[derive(Deserialize, Default)]
struct OsvBatchResult {
    vulns: Option<Vec<OsvVuln>>,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
    details: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    severity: Option<Vec<OsvSeverity>>,
    affected: Option<Vec<OsvAffected>>,
    references: Option<Vec<OsvReference>>,
}

#[derive(Deserialize)]
struct OsvSeverity {
    score: Option<String>,
}

#[derive(Deserialize)]
struct OsvAffected {
    ranges: Option<Vec<OsvRange>>,
}

#[derive(Deserialize)]
struct OsvRange {
    events: Option<Vec<OsvEvent>>,
}

#[derive(Deserialize)]
struct OsvEvent {
    fixed: Option<String>,
}

#[derive(Deserialize)]
struct OsvReference {
    url: Option<String>,
}

fn unify(vuln: OsvVuln) -> UnifiedAdvisory {
    let severity = parse_severity(&vuln);
    let first_patched_version = extract_fixed_version(&vuln);
    let references = vuln
        .references
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.url)
        .collect();
    let cve_ids = vuln
        .aliases
        .into_iter()
        .filter(|alias| alias.starts_with("CVE-"))
        .collect();

    UnifiedAdvisory {
        id: vuln.id,
        source: AdvisorySource::Osv,
        severity,
        summary: vuln.summary,
        details: vuln.details,
        references,
        first_patched_version,
        cve_ids,
    }
}

/// Parses a CVSS score into a severity level.
///
/// Supports both numeric scores and CVSS vector strings.
pub fn parse_cvss_score(score: &str) -> Severity {
    // Try parsing as numeric CVSS score
    if let Ok(cvss) = score.parse::<f32>() {
        return match cvss {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            s if s > 0.0 => Severity::Low,
            _ => Severity::Unknown,
        };
    }

    // Extract from a vector like "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"
    // based on its impact metrics.
    if score.contains("CVSS:") {
        if score.contains("/C:H") || score.contains("/I:H") || score.contains("/A:H") {
            return Severity::High;
        }
        if score.contains("/C:L") || score.contains("/I:L") || score.contains("/A:L") {
            return Severity::Medium;
        }
        return Severity::Low;
    }

    Severity::Unknown
}

fn parse_severity(vuln: &OsvVuln) -> Severity {
    if let Some(severities) = &vuln.severity {
        for sev in severities {
            if let Some(score) = &sev.score {
                let severity = parse_cvss_score(score);
                if severity != Severity::Unknown {
                    return severity;
                }
            }
        }
    }

    Severity::Unknown
}

fn extract_fixed_version(vuln: &OsvVuln) -> Option<String> {
    vuln.affected.as_ref()?.iter().find_map(|affected| {
        affected.ranges.as_ref()?.iter().find_map(|range| {
            range
                .events
                .as_ref()?
                .iter()
                .find_map(|event| event.fixed.clone())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Ecosystem;

    #[tokio::test]
    async fn oversized_batch_fails_before_any_network_call() {
        // Unroutable base URL: a network attempt would fail differently.
        let client = OsvClient::with_base_url("http://192.0.2.1");
        let deps: Vec<_> = (0..51)
            .map(|i| Dependency::new(format!("pkg{i}"), "1.0.0", Ecosystem::Npm))
            .collect();

        let err = client.query_batch(&deps).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::BatchTooLarge { len: 51, limit: 50 }
        ));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let client = OsvClient::with_base_url("http://192.0.2.1");
        assert!(client.query_batch(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn unify_maps_aliases_and_fixed_version() {
        let vuln: OsvVuln = serde_json::from_str(
            r#"{
                "id": "GHSA-xxxx",
                "summary": "Prototype pollution",
                "aliases": ["CVE-2021-23337", "SNYK-JS-1"],
                "severity": [{ "type": "CVSS_V3", "score": "7.2" }],
                "affected": [{ "ranges": [{ "events": [{ "introduced": "0" }, { "fixed": "4.17.21" }] }] }],
                "references": [{ "url": "https://example.com/advisory" }]
            }"#,
        )
        .unwrap();

        let advisory = unify(vuln);
        assert_eq!(advisory.source, AdvisorySource::Osv);
        assert_eq!(advisory.severity, Severity::High);
        assert_eq!(advisory.cve_ids, vec!["CVE-2021-23337"]);
        assert_eq!(advisory.first_patched_version.as_deref(), Some("4.17.21"));
        assert_eq!(advisory.references, vec!["https://example.com/advisory"]);
    }

    #[test]
    fn parse_cvss_score_levels() {
        assert_eq!(parse_cvss_score("9.8"), Severity::Critical);
        assert_eq!(parse_cvss_score("7.0"), Severity::High);
        assert_eq!(parse_cvss_score("5.5"), Severity::Medium);
        assert_eq!(parse_cvss_score("0.1"), Severity::Low);
        assert_eq!(parse_cvss_score("0.0"), Severity::Unknown);
        assert_eq!(parse_cvss_score("not a number"), Severity::Unknown);
    }

    #[test]
    fn parse_cvss_vector_strings() {
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N"),
            Severity::High
        );
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:L/AC:H/PR:L/UI:R/S:U/C:L/I:N/A:N"),
            Severity::Medium
        );
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:L/AC:H/PR:H/UI:R/S:U/C:N/I:N/A:N"),
            Severity::Low
        );
    }
}
