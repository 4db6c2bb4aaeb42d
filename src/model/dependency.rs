use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    Npm,
    Go,
    PyPI,
}

impl Ecosystem {
    /// Ecosystem name as OSV.dev spells it.
    pub fn osv_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Go => "Go",
            Ecosystem::PyPI => "PyPI",
        }
    }

    /// Ecosystem name as the GitHub advisory GraphQL API spells it.
    pub fn ghsa_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "NPM",
            Ecosystem::Go => "GO",
            Ecosystem::PyPI => "PIP",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Go => "Go modules",
            Ecosystem::PyPI => "PyPI",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One resolved or declared package reference.
///
/// Unique by `(name, version)` within a single gather call; parsers keep
/// the first occurrence and preserve insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
        }
    }

    /// The `name@version` key advisories are grouped under.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Outcome of ecosystem detection for a directory or standalone file.
///
/// `confidence` is a positive/negative signal only: the registry takes the
/// first provider that reports any detection, it never ranks providers
/// against each other by confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub ecosystem: Ecosystem,
    /// Human-readable provider name, e.g. "Node.js".
    pub name: &'static str,
    /// Package-manager variant within the ecosystem (e.g. "pnpm"),
    /// when the provider distinguishes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'static str>,
    pub confidence: f32,
}

impl Detection {
    pub fn new(ecosystem: Ecosystem, name: &'static str, confidence: f32) -> Self {
        Self {
            ecosystem,
            name,
            variant: None,
            confidence,
        }
    }

    pub fn with_variant(mut self, variant: &'static str) -> Self {
        self.variant = Some(variant);
        self
    }
}
