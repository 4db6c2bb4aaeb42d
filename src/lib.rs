pub mod advisory;
pub mod error;
pub mod ignore;
pub mod model;
pub mod parser;
pub mod provider;
pub mod scan;

pub use advisory::CredentialCache;
pub use error::ScanError;
pub use ignore::{IgnoreConfig, IgnoreRule};
pub use model::{
    AdvisorySource, Dependency, Detection, Ecosystem, ScanResult, Severity, UnifiedAdvisory,
};
pub use provider::{supported_manifest_filenames, Provider};
pub use scan::{scan, ScanOptions};
