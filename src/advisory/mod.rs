//! Advisory query engine: two independent vulnerability sources behind a
//! shared retry policy and a bounded worker pool.
//!
//! Source A ([`OsvClient`]) is the OSV.dev batch index, queried in chunks
//! of up to [`OSV_BATCH_LIMIT`] dependencies. Source B ([`GhsaClient`]) is
//! the credential-gated GitHub advisory graph, queried one package at a
//! time. Lookups from both sources share one pool so that no more than
//! the configured number of requests is in flight at once; one lookup's
//! failure or slowness never blocks or cancels its siblings.

mod ghsa;
mod merge;
mod osv;
mod retry;

pub use ghsa::{CredentialCache, GhsaClient};
pub use merge::merge_package_advisories;
pub use osv::{parse_cvss_score, OsvClient, OSV_BATCH_LIMIT};

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::debug;

use crate::error::ScanError;
use crate::model::{Dependency, UnifiedAdvisory};

/// Default width of the advisory lookup pool.
pub const DEFAULT_CONCURRENCY: usize = 10;

pub struct QueryEngine {
    osv: OsvClient,
    ghsa: GhsaClient,
    credentials: Arc<CredentialCache>,
    concurrency: usize,
}

enum Lookup {
    /// One OSV batch covering `deps[start..start + deps.len()]`.
    OsvBatch { start: usize, deps: Vec<Dependency> },
    /// One GHSA package query for `deps[index]`.
    GhsaPackage { index: usize, dep: Dependency },
}

enum Outcome {
    Osv(usize, Vec<UnifiedAdvisory>),
    Ghsa(usize, Vec<UnifiedAdvisory>),
}

impl QueryEngine {
    pub fn new(concurrency: usize, credentials: Arc<CredentialCache>) -> Self {
        Self::with_clients(OsvClient::new(), GhsaClient::new(), credentials, concurrency)
    }

    /// Injects preconfigured clients, for tests.
    pub fn with_clients(
        osv: OsvClient,
        ghsa: GhsaClient,
        credentials: Arc<CredentialCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            osv,
            ghsa,
            credentials,
            concurrency: concurrency.max(1),
        }
    }

    /// Queries both sources for every dependency and merges the results
    /// into a `name@version` -> advisory-list map.
    ///
    /// The GitHub credential is resolved before any request goes out.
    /// Source failures surface only after the pool drains, so sibling
    /// lookups are never cancelled mid-flight.
    pub async fn query(
        &self,
        deps: &[Dependency],
    ) -> Result<BTreeMap<String, Vec<UnifiedAdvisory>>, ScanError> {
        if deps.is_empty() {
            return Ok(BTreeMap::new());
        }

        let token = self.credentials.resolve()?;
        let lookups = build_lookups(deps);
        debug!(
            deps = deps.len(),
            lookups = lookups.len(),
            width = self.concurrency,
            "querying advisory sources"
        );

        let mut osv_results: Vec<Vec<UnifiedAdvisory>> = vec![Vec::new(); deps.len()];
        let mut ghsa_results: Vec<Vec<UnifiedAdvisory>> = vec![Vec::new(); deps.len()];
        let mut first_error: Option<ScanError> = None;

        let osv = &self.osv;
        let ghsa = &self.ghsa;
        let token = token.as_str();
        let mut stream = futures::stream::iter(lookups.into_iter().map(move |lookup| {
            async move {
                match lookup {
                    Lookup::OsvBatch { start, deps } => {
                        let lists = osv.query_batch(&deps).await?;
                        Ok(lists
                            .into_iter()
                            .enumerate()
                            .map(|(offset, list)| Outcome::Osv(start + offset, list))
                            .collect::<Vec<_>>())
                    }
                    Lookup::GhsaPackage { index, dep } => {
                        let advisories = ghsa.query_package(&dep, token).await?;
                        Ok(vec![Outcome::Ghsa(index, advisories)])
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some(result) = stream.next().await {
            match result {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        match outcome {
                            Outcome::Osv(index, list) => osv_results[index] = list,
                            Outcome::Ghsa(index, list) => ghsa_results[index] = list,
                        }
                    }
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        drop(stream);

        if let Some(err) = first_error {
            return Err(err);
        }

        let mut by_package = BTreeMap::new();
        for (index, dep) in deps.iter().enumerate() {
            let merged = merge_package_advisories(
                std::mem::take(&mut osv_results[index]),
                std::mem::take(&mut ghsa_results[index]),
            );
            if !merged.is_empty() {
                by_package.insert(dep.key(), merged);
            }
        }

        Ok(by_package)
    }
}

/// Splits the dependency list into OSV batches of at most
/// [`OSV_BATCH_LIMIT`] plus one GHSA lookup per dependency.
fn build_lookups(deps: &[Dependency]) -> Vec<Lookup> {
    let mut lookups = Vec::new();

    for (chunk_index, chunk) in deps.chunks(OSV_BATCH_LIMIT).enumerate() {
        lookups.push(Lookup::OsvBatch {
            start: chunk_index * OSV_BATCH_LIMIT,
            deps: chunk.to_vec(),
        });
    }
    for (index, dep) in deps.iter().enumerate() {
        lookups.push(Lookup::GhsaPackage {
            index,
            dep: dep.clone(),
        });
    }

    lookups
}
