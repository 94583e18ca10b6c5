//! Command context providing the services every command needs.
//!
//! CommandContext owns the loaded settings, the repository mirror, the
//! catalog store and the deployment orchestrator. The catalog is loaded on
//! first use and kept for the lifetime of the context.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::catalog::{CatalogStore, PackageFiles};
use crate::config::{ConfigStore, MesosCtlConfig};
use crate::controller::{ClusterClient, ControllerApi};
use crate::deploy::DeploymentOrchestrator;
use crate::error::PackageResult;
use crate::render::TemplateRenderer;
use crate::repository::{RepositoryLayout, RepositorySync};
use crate::resolver::ConfigResolver;

pub struct CommandContext {
    store: ConfigStore,
    config: MesosCtlConfig,
    sync: RepositorySync,
    catalog: CatalogStore,
    resolver: ConfigResolver,
    renderer: TemplateRenderer,
    orchestrator: DeploymentOrchestrator,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("config_path", &self.store.config_path())
            .field("repository", &self.config.repository.version)
            .field("catalog_loaded", &self.catalog.is_loaded())
            .finish_non_exhaustive()
    }
}

impl CommandContext {
    /// Create a context with an explicit controller.
    pub fn new(
        store: ConfigStore,
        config: MesosCtlConfig,
        controller: Arc<dyn ControllerApi>,
    ) -> Self {
        let sync = RepositorySync::new(&config.storage_dir, &config.repository.archive_url);
        Self {
            store,
            config,
            sync,
            catalog: CatalogStore::new(),
            resolver: ConfigResolver::new(),
            renderer: TemplateRenderer::new(),
            orchestrator: DeploymentOrchestrator::new(controller),
        }
    }

    /// Load settings from `store` and talk to the cluster they describe.
    pub fn from_store(store: ConfigStore) -> anyhow::Result<Self> {
        let config = store.load()?;
        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", store.config_path().display()))?;
        let controller = ClusterClient::from_config(&config)?;
        debug!(
            marathon = %config.marathon_url,
            master = %config.master_url,
            agents = config.agents.len(),
            "Cluster client ready"
        );
        Ok(Self::new(store, config, Arc::new(controller)))
    }

    /// Create a context from the default settings location.
    pub fn with_defaults() -> anyhow::Result<Self> {
        Self::from_store(ConfigStore::from_default_location())
    }

    // --- Accessors ---

    pub fn config(&self) -> &MesosCtlConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        self.store.config_path()
    }

    pub fn sync(&self) -> &RepositorySync {
        &self.sync
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn orchestrator(&self) -> &DeploymentOrchestrator {
        &self.orchestrator
    }

    pub fn repository_version(&self) -> &str {
        &self.config.repository.version
    }

    pub fn layout(&self) -> RepositoryLayout {
        self.sync.layout(self.repository_version())
    }

    pub fn package_files(&self) -> PackageFiles {
        PackageFiles::new(self.layout())
    }

    // --- Catalog ---

    /// Gate on the local mirror and load the catalog if needed.
    pub async fn ensure_catalog(&mut self) -> PackageResult<RepositoryLayout> {
        let layout = self.sync.ensure_present(self.repository_version())?;
        if !self.catalog.is_loaded() {
            self.catalog.load_from_layout(&layout).await?;
        }
        Ok(layout)
    }

    /// Load the catalog from disk again, e.g. after a download.
    pub async fn reload_catalog(&mut self) -> PackageResult<RepositoryLayout> {
        let layout = self.sync.ensure_present(self.repository_version())?;
        self.catalog.reload(&layout).await?;
        Ok(layout)
    }

    pub(crate) fn unload_catalog(&mut self) {
        self.catalog = CatalogStore::new();
    }

    // --- Ledger ---

    /// Append to the installed packages ledger and persist the settings.
    pub fn record_install(&mut self, name: &str, version: &str) -> anyhow::Result<()> {
        self.config.record_install(name, version);
        self.store.save(&self.config)
    }
}
