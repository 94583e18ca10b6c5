//! Error taxonomy for catalog, resolution and deployment operations.
//!
//! Every variant is returned to the caller intact. Structured detail
//! (validation paths, response bodies) stays attached so frontends can
//! render diagnostics without re-issuing requests.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the engine.
pub type PackageResult<T> = std::result::Result<T, PackageError>;

/// What kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Package,
    Version,
    Application,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Package => write!(f, "Package"),
            NotFoundKind::Version => write!(f, "Package version"),
            NotFoundKind::Application => write!(f, "Application"),
        }
    }
}

/// A single failed schema constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer into the candidate document (empty for the root)
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "/: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error(
        "The package repository '{version}' has not been downloaded yet (expected at {})",
        path.display()
    )]
    RepositoryMissing { version: String, path: PathBuf },

    #[error("{kind} '{name}' cannot be found")]
    NotFound { kind: NotFoundKind, name: String },

    #[error("The provided configuration is invalid ({} violation(s))", .0.len())]
    SchemaValidation(Vec<SchemaViolation>),

    #[error("The package configuration schema cannot be compiled: {0}")]
    InvalidSchema(String),

    #[error("The deployment template cannot be rendered: {message}")]
    TemplateRender {
        message: String,
        /// Template output, when rendering got as far as producing text
        rendered: Option<String>,
    },

    #[error("Request {method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Orchestrator rejected {method} {url} with HTTP {status}: {body}")]
    OrchestratorRejection {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackageError {
    pub fn package_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Package,
            name: name.into(),
        }
    }

    pub fn version_not_found(name: &str, version: &str) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Version,
            name: format!("{}@{}", name, version),
        }
    }

    pub fn application_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Application,
            name: name.into(),
        }
    }

    /// Whether this is a `NotFound` of the given kind.
    pub fn is_not_found(&self, expected: NotFoundKind) -> bool {
        matches!(self, PackageError::NotFound { kind, .. } if *kind == expected)
    }

    /// Validation violations, if this is a schema validation failure.
    pub fn violations(&self) -> Option<&[SchemaViolation]> {
        match self {
            PackageError::SchemaValidation(violations) => Some(violations),
            _ => None,
        }
    }
}
