use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Dependency, Detection};

/// Which vulnerability source produced an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorySource {
    /// OSV.dev batch vulnerability index.
    Osv,
    /// GitHub security-advisory GraphQL API.
    Ghsa,
}

impl std::fmt::Display for AdvisorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorySource::Osv => write!(f, "OSV.dev"),
            AdvisorySource::Ghsa => write!(f, "GitHub Advisory"),
        }
    }
}

impl std::error::Error for AdvisorySource {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One advisory normalized from either source.
///
/// `id` is unique within a package's advisory list after merging; the same
/// id reported by both sources collapses to the OSV record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAdvisory {
    pub id: String,
    pub source: AdvisorySource,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_patched_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cve_ids: Vec<String>,
}

/// The complete, immutable output of one scan. Never partially populated:
/// a failed scan yields an error, not a truncated result.
///
/// `deps` preserves the original gather order; `advisories_by_package` is
/// keyed by `name@version` and sorted for deterministic serialization.
/// Renderers that need detection order iterate `deps` and look keys up.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub detection: Detection,
    pub deps: Vec<Dependency>,
    pub advisories_by_package: BTreeMap<String, Vec<UnifiedAdvisory>>,
    /// Advisories hidden by ignore rules in this scan.
    pub suppressed_count: usize,
    pub scan_duration_ms: u64,
}

impl ScanResult {
    /// Total advisories remaining after ignore filtering.
    pub fn advisory_count(&self) -> usize {
        self.advisories_by_package.values().map(Vec::len).sum()
    }
}
