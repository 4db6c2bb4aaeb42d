//! Cross-source advisory merging.

use crate::model::UnifiedAdvisory;

/// Merges one package's advisories from both sources, deduplicating by
/// advisory id. When both sources report the same id, the OSV record (the
/// richer structured version-range shape) is kept as canonical and the
/// GHSA record is discarded. First-seen order is preserved.
///
/// No cross-id correlation happens here: two advisories sharing a CVE
/// alias under different native ids stay distinct.
pub fn merge_package_advisories(
    osv: Vec<UnifiedAdvisory>,
    ghsa: Vec<UnifiedAdvisory>,
) -> Vec<UnifiedAdvisory> {
    let mut merged: Vec<UnifiedAdvisory> = Vec::with_capacity(osv.len() + ghsa.len());

    for advisory in osv.into_iter().chain(ghsa) {
        if merged.iter().any(|existing| existing.id == advisory.id) {
            continue;
        }
        merged.push(advisory);
    }

    merged
}
