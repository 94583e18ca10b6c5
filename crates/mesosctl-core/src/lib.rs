//! mesosctl Core Library
//!
//! Package catalog and deployment resolution for Marathon on Mesos:
//! mirrors the package repository locally, searches it, resolves a
//! package's configuration, renders its deployment template and submits
//! or removes the result.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod controller;
pub mod deploy;
pub mod error;
pub mod render;
pub mod repository;
pub mod resolver;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, InstalledPackage, MesosCtlConfig};

    // Errors
    pub use crate::error::{NotFoundKind, PackageError, PackageResult, SchemaViolation};

    // Catalog
    pub use crate::catalog::{CatalogStore, Package, PackageDescriptor, PackageFiles};
    pub use crate::repository::{RepositoryLayout, RepositorySync};

    // Resolution and rendering
    pub use crate::render::{DeploymentDescriptor, TemplateRenderer};
    pub use crate::resolver::{ConfigResolver, ConfigView};

    // Deployment
    pub use crate::controller::{ClusterClient, ControllerApi};
    pub use crate::deploy::{DeploymentOrchestrator, UninstallReport};

    // Commands
    pub use crate::commands::{CommandContext, PackageCommand, RepositoryCommand};
}
