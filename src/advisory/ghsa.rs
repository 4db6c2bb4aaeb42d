//! Source B: the GitHub security-advisory GraphQL API.
//!
//! Queries are issued one package at a time and paginated; the returned
//! affected-package nodes are grouped by their GHSA advisory id, since one
//! advisory can list several affected version ranges.

use std::process::Command;
use std::sync::Mutex;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::retry::{with_retry, ATTEMPT_TIMEOUT};
use crate::error::ScanError;
use crate::model::{AdvisorySource, Dependency, Severity, UnifiedAdvisory};

const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";
const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

const VULNERABILITIES_QUERY: &str = r#"
query($ecosystem: SecurityAdvisoryEcosystem!, $package: String!, $after: String) {
  securityVulnerabilities(ecosystem: $ecosystem, package: $package, first: 100, after: $after) {
    pageInfo { hasNextPage endCursor }
    nodes {
      advisory {
        ghsaId
        summary
        description
        severity
        identifiers { type value }
        references { url }
      }
      firstPatchedVersion { identifier }
      vulnerableVersionRange
    }
  }
}
"#;

/// In-process cache for the GitHub bearer token.
///
/// Resolution order: the `GITHUB_TOKEN` environment variable, then the
/// `gh auth token` credential helper. The first successful resolution is
/// cached for the process lifetime; [`reset`](Self::reset) clears it for
/// test isolation.
#[derive(Default)]
pub struct CredentialCache {
    token: Mutex<Option<String>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cache directly, bypassing resolution.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    /// Returns the cached token, resolving it on first use.
    pub fn resolve(&self) -> Result<String, ScanError> {
        let mut guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = resolve_uncached().ok_or(ScanError::CredentialMissing)?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Clears the cached token.
    pub fn reset(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn resolve_uncached() -> Option<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        if !token.trim().is_empty() {
            debug!("resolved GitHub token from environment");
            return Some(token.trim().to_string());
        }
    }

    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        None
    } else {
        debug!("resolved GitHub token from gh credential helper");
        Some(token)
    }
}

pub struct GhsaClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GhsaClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Overrides the GraphQL endpoint, for tests.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(ATTEMPT_TIMEOUT)
                .user_agent("depscan")
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// Fetches every advisory affecting one package, across all result
    /// pages, grouped by advisory id in first-seen order.
    pub async fn query_package(
        &self,
        dep: &Dependency,
        token: &str,
    ) -> Result<Vec<UnifiedAdvisory>, ScanError> {
        let mut nodes = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self.fetch_page(dep, token, after.as_deref()).await?;
            nodes.extend(page.nodes);
            if !page.page_info.has_next_page {
                break;
            }
            after = page.page_info.end_cursor;
            if after.is_none() {
                break;
            }
        }

        Ok(group_nodes(nodes))
    }

    async fn fetch_page(
        &self,
        dep: &Dependency,
        token: &str,
        after: Option<&str>,
    ) -> Result<VulnerabilityConnection, ScanError> {
        let body = json!({
            "query": VULNERABILITIES_QUERY,
            "variables": {
                "ecosystem": dep.ecosystem.ghsa_name(),
                "package": dep.name,
                "after": after,
            },
        });

        let client = &self.client;
        let endpoint = self.endpoint.as_str();
        let body = &body;
        let response: GraphQlResponse = with_retry(move || async move {
            let response = client
                .post(endpoint)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .map_err(|err| ScanError::advisory(AdvisorySource::Ghsa, err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ScanError::advisory(
                    AdvisorySource::Ghsa,
                    format!("unexpected status {status}"),
                ));
            }

            response
                .json::<GraphQlResponse>()
                .await
                .map_err(|err| ScanError::advisory(AdvisorySource::Ghsa, err.to_string()))
        })
        .await?;

        if let Some(errors) = response.errors {
            let message = errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown GraphQL error".to_string());
            return Err(ScanError::advisory(AdvisorySource::Ghsa, message));
        }

        response
            .data
            .map(|d| d.security_vulnerabilities)
            .ok_or_else(|| {
                ScanError::advisory(AdvisorySource::Ghsa, "response body missing data")
            })
    }
}

impl Default for GhsaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ResponseData {
    #[serde(rename = "securityVulnerabilities")]
    security_vulnerabilities: VulnerabilityConnection,
}

#[derive(Deserialize)]
struct VulnerabilityConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<VulnerabilityNode>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct VulnerabilityNode {
    advisory: GhsaAdvisory,
    #[serde(rename = "firstPatchedVersion")]
    first_patched_version: Option<PatchedVersion>,
}

#[derive(Deserialize)]
struct GhsaAdvisory {
    #[serde(rename = "ghsaId")]
    ghsa_id: String,
    summary: Option<String>,
    description: Option<String>,
    severity: Option<String>,
    #[serde(default)]
    identifiers: Vec<Identifier>,
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Deserialize)]
struct Identifier {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Deserialize)]
struct Reference {
    url: Option<String>,
}

#[derive(Deserialize)]
struct PatchedVersion {
    identifier: String,
}

/// Groups affected-package nodes by advisory id, keeping first-seen order.
/// The first node with a patched version supplies `first_patched_version`.
fn group_nodes(nodes: Vec<VulnerabilityNode>) -> Vec<UnifiedAdvisory> {
    let mut advisories: Vec<UnifiedAdvisory> = Vec::new();

    for node in nodes {
        let patched = node.first_patched_version.map(|p| p.identifier);

        if let Some(existing) = advisories
            .iter_mut()
            .find(|a| a.id == node.advisory.ghsa_id)
        {
            if existing.first_patched_version.is_none() {
                existing.first_patched_version = patched;
            }
            continue;
        }

        let advisory = node.advisory;
        advisories.push(UnifiedAdvisory {
            id: advisory.ghsa_id,
            source: AdvisorySource::Ghsa,
            severity: parse_severity_label(advisory.severity.as_deref()),
            summary: advisory.summary,
            details: advisory.description,
            references: advisory
                .references
                .into_iter()
                .filter_map(|r| r.url)
                .collect(),
            first_patched_version: patched,
            cve_ids: advisory
                .identifiers
                .into_iter()
                .filter(|id| id.kind == "CVE")
                .map(|id| id.value)
                .collect(),
        });
    }

    advisories
}

fn parse_severity_label(label: Option<&str>) -> Severity {
    match label {
        Some("CRITICAL") => Severity::Critical,
        Some("HIGH") => Severity::High,
        Some("MODERATE") => Severity::Medium,
        Some("LOW") => Severity::Low,
        _ => Severity::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(ghsa_id: &str, patched: Option<&str>) -> VulnerabilityNode {
        VulnerabilityNode {
            advisory: GhsaAdvisory {
                ghsa_id: ghsa_id.to_string(),
                summary: Some("test advisory".to_string()),
                description: None,
                severity: Some("HIGH".to_string()),
                identifiers: vec![Identifier {
                    kind: "CVE".to_string(),
                    value: "CVE-2024-0001".to_string(),
                }],
                references: vec![],
            },
            first_patched_version: patched.map(|p| PatchedVersion {
                identifier: p.to_string(),
            }),
        }
    }

    #[test]
    fn groups_nodes_by_advisory_id() {
        let advisories = group_nodes(vec![
            node("GHSA-aaaa", None),
            node("GHSA-bbbb", Some("2.0.0")),
            node("GHSA-aaaa", Some("1.5.0")),
        ]);

        assert_eq!(advisories.len(), 2);
        assert_eq!(advisories[0].id, "GHSA-aaaa");
        // Backfilled from the second GHSA-aaaa node.
        assert_eq!(advisories[0].first_patched_version.as_deref(), Some("1.5.0"));
        assert_eq!(advisories[1].id, "GHSA-bbbb");
    }

    #[test]
    fn grouped_advisory_carries_cve_ids() {
        let advisories = group_nodes(vec![node("GHSA-aaaa", None)]);
        assert_eq!(advisories[0].cve_ids, vec!["CVE-2024-0001"]);
        assert_eq!(advisories[0].severity, Severity::High);
        assert_eq!(advisories[0].source, AdvisorySource::Ghsa);
    }

    #[test]
    fn severity_labels_map_to_levels() {
        assert_eq!(parse_severity_label(Some("CRITICAL")), Severity::Critical);
        assert_eq!(parse_severity_label(Some("MODERATE")), Severity::Medium);
        assert_eq!(parse_severity_label(Some("bogus")), Severity::Unknown);
        assert_eq!(parse_severity_label(None), Severity::Unknown);
    }

    #[test]
    fn credential_cache_reset_clears_seeded_token() {
        let cache = CredentialCache::with_token("abc123");
        assert_eq!(cache.resolve().unwrap(), "abc123");

        cache.reset();
        // After reset, resolution starts over; with a token in the
        // environment this may still succeed, so only the cleared state
        // is asserted here.
        assert!(cache.token.lock().unwrap().is_none());
    }
}
