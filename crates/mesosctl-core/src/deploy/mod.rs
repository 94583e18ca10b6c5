//! Submitting and removing deployments.
//!
//! Per package the cluster moves through
//! `NotInstalled → AppCreated → AppDeleted → FrameworkTornDown → NotInstalled`.
//! Install is a single create request; uninstall is the ordered pipeline in
//! [`uninstall`].

pub mod uninstall;

use std::sync::Arc;

use tracing::info;

use crate::catalog::{CatalogStore, PackageFiles};
use crate::controller::ControllerApi;
use crate::error::PackageResult;
use crate::render::DeploymentDescriptor;

pub use uninstall::{UninstallReport, UninstallStep};

#[derive(Clone)]
pub struct DeploymentOrchestrator {
    controller: Arc<dyn ControllerApi>,
}

impl std::fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator").finish_non_exhaustive()
    }
}

impl DeploymentOrchestrator {
    pub fn new(controller: Arc<dyn ControllerApi>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &dyn ControllerApi {
        self.controller.as_ref()
    }

    /// Create the application described by `descriptor`.
    ///
    /// Exactly one request, no retry. Anything but HTTP 201 comes back as
    /// `OrchestratorRejection` with the server body attached.
    pub async fn install(&self, descriptor: &DeploymentDescriptor) -> PackageResult<()> {
        self.controller.create_app(descriptor).await?;
        info!(app = descriptor.app_id().unwrap_or("<unnamed>"), "Application created");
        Ok(())
    }

    /// Remove the application named `name` and, for framework packages,
    /// its scheduler framework.
    pub async fn uninstall(
        &self,
        catalog: &CatalogStore,
        files: &PackageFiles,
        name: &str,
    ) -> PackageResult<UninstallReport> {
        uninstall::run(self.controller.as_ref(), catalog, files, name).await
    }
}
