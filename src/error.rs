//! Typed errors for the scanning core.
//!
//! Every fallible core operation returns [`ScanError`]; exactly one typed
//! error surfaces per failed scan. The binary layer wraps these in `anyhow`
//! for display.

use std::path::PathBuf;

use crate::model::AdvisorySource;

/// Errors produced by detection, parsing, lockfile lifecycle management,
/// advisory queries, and orchestration.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// No provider recognized the given directory or file.
    #[error("no supported ecosystem detected at {path} (supported: {supported})")]
    DetectionFailed { path: PathBuf, supported: String },

    /// The ecosystem's manifest file was expected but not found.
    #[error("manifest not found: {0}")]
    ManifestMissing(PathBuf),

    /// The ecosystem's lockfile was expected but not found.
    #[error("lockfile not found: {0}")]
    LockfileMissing(PathBuf),

    /// A lockfile or manifest could not be parsed.
    #[error("failed to parse {path}: {message}")]
    LockfileParse { path: PathBuf, message: String },

    /// A package-manager invocation exited non-zero or could not be spawned.
    #[error("`{program}` failed: {message}")]
    PackageManager { program: String, message: String },

    /// An advisory source failed after retries were exhausted, or returned
    /// a malformed response body.
    #[error("{source} query failed: {message}")]
    AdvisorySource {
        source: AdvisorySource,
        message: String,
    },

    /// A caller-assembled OSV batch exceeded the per-request query limit.
    /// Raised before any network call is made.
    #[error("advisory batch has {len} queries, limit is {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    /// No GitHub credential could be resolved from the environment or the
    /// credential helper.
    #[error("no GitHub token available: set GITHUB_TOKEN or log in with `gh auth login`")]
    CredentialMissing,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScanError::LockfileParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn advisory(source: AdvisorySource, message: impl Into<String>) -> Self {
        ScanError::AdvisorySource {
            source,
            message: message.into(),
        }
    }
}
