//! Core data types for dependencies, advisories, and scan results.
//!
//! This module contains the fundamental types used throughout depscan:
//!
//! - [`Dependency`] - A resolved or declared package reference
//! - [`Ecosystem`] - The package-manager universe a dependency lives in
//! - [`Detection`] - The outcome of ecosystem detection
//! - [`UnifiedAdvisory`] - A vulnerability advisory normalized across sources
//! - [`ScanResult`] - Complete scan results
//!
//! # Example
//!
//! ```
//! use depscan::{Dependency, Ecosystem};
//!
//! let dep = Dependency::new("lodash", "4.17.20", Ecosystem::Npm);
//! assert_eq!(dep.key(), "lodash@4.17.20");
//! ```

mod advisory;
mod dependency;

pub use advisory::*;
pub use dependency::*;
