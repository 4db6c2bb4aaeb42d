//! Scan orchestration: one forward pipeline from detection to result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::advisory::{CredentialCache, QueryEngine, DEFAULT_CONCURRENCY};
use crate::error::ScanError;
use crate::ignore::{filter_advisories, load_ignore_config};
use crate::model::ScanResult;
use crate::provider::{select_provider, GatherOptions, GatherSource, LockfileOptions};

/// Options for a single [`scan`] call.
#[derive(Clone)]
pub struct ScanOptions {
    /// Include dev / indirect dependencies where the format records them.
    pub include_dev: bool,
    /// Force a lockfile validation run before gathering.
    pub validate_lock: bool,
    /// Force a lockfile refresh before gathering. Takes precedence over
    /// `validate_lock`.
    pub refresh_lock: bool,
    /// Width of the advisory lookup pool.
    pub concurrency: usize,
    /// Path to the ignore-rule file, if any.
    pub ignore_file_path: Option<PathBuf>,
    /// Accepted for interface parity; the maintenance data source sits
    /// outside this core.
    pub check_maintenance: bool,
    /// Shared GitHub credential cache. One cache serves every scan in the
    /// process; reset it for test isolation.
    pub credentials: Arc<CredentialCache>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_dev: false,
            validate_lock: false,
            refresh_lock: false,
            concurrency: DEFAULT_CONCURRENCY,
            ignore_file_path: None,
            check_maintenance: false,
            credentials: Arc::new(CredentialCache::new()),
        }
    }
}

/// Scans a project directory, or a single standalone lockfile when `path`
/// is a file.
///
/// Pipeline: detect -> (optional) ensure/validate lockfile -> gather
/// dependencies -> query both advisory sources under bounded concurrency
/// -> merge -> apply ignore rules -> assemble the result. Any stage error
/// aborts the remaining stages; the return value is either a complete
/// [`ScanResult`] or exactly one typed error.
pub async fn scan(path: &Path, opts: &ScanOptions) -> Result<ScanResult, ScanError> {
    let started = Instant::now();

    let standalone = path.is_file();
    let (provider, detection) = if standalone {
        select_provider(path, Some(path))?
    } else {
        select_provider(path, None)?
    };
    info!(provider = detection.name, variant = ?detection.variant, "ecosystem detected");

    let source = if standalone {
        GatherSource::StandaloneLockfile(path.to_path_buf())
    } else {
        if opts.refresh_lock || opts.validate_lock {
            provider
                .ensure_lockfile(
                    path,
                    &LockfileOptions {
                        force_refresh: opts.refresh_lock,
                        force_validate: opts.validate_lock && !opts.refresh_lock,
                        ..Default::default()
                    },
                )
                .await?;
        }
        GatherSource::Directory(path.to_path_buf())
    };

    let deps = provider.gather(
        &source,
        &GatherOptions {
            include_dev: opts.include_dev,
        },
    )?;
    info!(count = deps.len(), "dependencies gathered");

    if opts.check_maintenance {
        debug!("maintenance checking is not part of this scanner core");
    }

    let engine = QueryEngine::new(opts.concurrency, Arc::clone(&opts.credentials));
    let advisories = engine.query(&deps).await?;

    let ignore_config = opts
        .ignore_file_path
        .as_deref()
        .and_then(load_ignore_config);
    let (filtered, suppressed) = filter_advisories(&advisories, &deps, ignore_config.as_ref());
    if suppressed > 0 {
        info!(suppressed, "advisories suppressed by ignore rules");
    }

    Ok(ScanResult {
        detection,
        deps,
        advisories_by_package: filtered,
        suppressed_count: suppressed,
        scan_duration_ms: started.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_default_pool_width() {
        let opts = ScanOptions::default();
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);
        assert!(!opts.include_dev);
        assert!(opts.ignore_file_path.is_none());
    }

    #[tokio::test]
    async fn scan_of_undetectable_directory_fails_typed() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scan(tmp.path(), &ScanOptions::default()).await.unwrap_err();
        assert!(matches!(err, ScanError::DetectionFailed { .. }));
    }
}
