//! Package commands: install, uninstall, describe, search.
//!
//! Every command is gated on the local repository mirror. Installing runs
//! lookup → version selection → file loading → configuration resolution →
//! rendering → submission, and only then writes the ledger.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::info;

use super::context::CommandContext;
use crate::catalog::{Package, PackageFileSet};
use crate::deploy::UninstallReport;
use crate::error::{PackageError, PackageResult};
use crate::render::DeploymentDescriptor;
use crate::resolver::ConfigSource;

/// Options for installing or rendering a package
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub name: String,
    /// Defaults to the package's current version
    pub version: Option<String>,
    /// Complete configuration replacing the schema defaults
    pub config: Option<Value>,
}

impl InstallOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// Read a configuration override document from a JSON file.
pub async fn load_options_file(path: &Path) -> anyhow::Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read options file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse options file: {}", path.display()))
}

/// A rendered, not yet submitted deployment
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub name: String,
    pub version: String,
    pub source: ConfigSource,
    pub descriptor: DeploymentDescriptor,
    pub pre_install_notes: Option<String>,
    pub post_install_notes: Option<String>,
}

/// Report from a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub app_id: Option<String>,
    pub pre_install_notes: Option<String>,
    pub post_install_notes: Option<String>,
    /// Set when the application was created but the ledger could not be saved
    pub ledger_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DescribeOptions {
    pub name: String,
    /// List every available version
    pub package_versions: bool,
    /// Render the descriptor without submitting it
    pub render: bool,
    pub version: Option<String>,
    pub config: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct DescribeReport {
    pub name: String,
    pub description: String,
    pub current_version: String,
    pub tags: Vec<String>,
    pub framework: bool,
    pub versions: Option<Vec<String>>,
    pub rendered: Option<DeploymentDescriptor>,
}

/// One search result, description flattened to a single line
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEntry {
    pub name: String,
    pub description: String,
    pub score: f64,
}

fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct PackageCommand<'a> {
    ctx: &'a mut CommandContext,
}

impl<'a> PackageCommand<'a> {
    pub fn new(ctx: &'a mut CommandContext) -> Self {
        Self { ctx }
    }

    async fn lookup(&mut self, name: &str) -> PackageResult<Package> {
        self.ctx.ensure_catalog().await?;
        Ok(self.ctx.catalog().lookup(name)?.clone())
    }

    /// Versions of `name`, oldest first
    pub async fn versions(&mut self, name: &str) -> PackageResult<Vec<String>> {
        let package = self.lookup(name).await?;
        Ok(package
            .sorted_versions()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    async fn render(
        &mut self,
        package: &Package,
        version: &str,
        config: Option<Value>,
    ) -> PackageResult<(PackageFileSet, ConfigSource, DeploymentDescriptor)> {
        let files = self.ctx.package_files().load(package, version).await?;
        let resolved = self
            .ctx
            .resolver()
            .resolve(&files.config_schema, config)
            .await?;
        let view = resolved.view.with_resource(files.resource.clone());
        let descriptor = self.ctx.renderer().render_descriptor(&files.template, &view)?;
        Ok((files, resolved.source, descriptor))
    }

    /// Resolve and render without contacting the cluster.
    pub async fn prepare_install(&mut self, options: &InstallOptions) -> PackageResult<InstallPlan> {
        let package = self.lookup(&options.name).await?;
        let version = options
            .version
            .clone()
            .unwrap_or_else(|| package.current_version.clone());
        if package.revision(&version).is_none() {
            return Err(PackageError::version_not_found(&package.name, &version));
        }

        let (files, source, descriptor) =
            self.render(&package, &version, options.config.clone()).await?;
        Ok(InstallPlan {
            name: package.name,
            version,
            source,
            descriptor,
            pre_install_notes: files.descriptor.pre_install_notes,
            post_install_notes: files.descriptor.post_install_notes,
        })
    }

    /// Submit a prepared plan and record it in the ledger.
    pub async fn apply(&mut self, plan: InstallPlan) -> PackageResult<InstallReport> {
        self.ctx.orchestrator().install(&plan.descriptor).await?;
        let ledger_error = self
            .ctx
            .record_install(&plan.name, &plan.version)
            .err()
            .map(|err| format!("{:#}", err));
        info!(package = %plan.name, version = %plan.version, "Package installed");
        Ok(InstallReport {
            name: plan.name,
            version: plan.version,
            app_id: plan.descriptor.app_id().map(str::to_string),
            pre_install_notes: plan.pre_install_notes,
            post_install_notes: plan.post_install_notes,
            ledger_error,
        })
    }

    pub async fn install(&mut self, options: &InstallOptions) -> PackageResult<InstallReport> {
        let plan = self.prepare_install(options).await?;
        self.apply(plan).await
    }

    pub async fn uninstall(&mut self, name: &str) -> PackageResult<UninstallReport> {
        self.ctx.ensure_catalog().await?;
        let files = self.ctx.package_files();
        self.ctx
            .orchestrator()
            .uninstall(self.ctx.catalog(), &files, name)
            .await
    }

    pub async fn describe(&mut self, options: &DescribeOptions) -> PackageResult<DescribeReport> {
        let package = self.lookup(&options.name).await?;

        let versions = options.package_versions.then(|| {
            package
                .sorted_versions()
                .into_iter()
                .map(str::to_string)
                .collect()
        });

        let rendered = if options.render {
            let plan = self
                .prepare_install(&InstallOptions {
                    name: package.name.clone(),
                    version: options.version.clone(),
                    config: options.config.clone(),
                })
                .await?;
            Some(plan.descriptor)
        } else {
            None
        };

        Ok(DescribeReport {
            tags: package.tags.iter().cloned().collect(),
            name: package.name,
            description: package.description,
            current_version: package.current_version,
            framework: package.framework,
            versions,
            rendered,
        })
    }

    pub async fn search(&mut self, query: &str) -> PackageResult<Vec<SearchEntry>> {
        self.ctx.ensure_catalog().await?;
        Ok(self
            .ctx
            .catalog()
            .search(query)
            .into_iter()
            .map(|hit| SearchEntry {
                name: hit.package.name.clone(),
                description: single_line(&hit.package.description),
                score: hit.score,
            })
            .collect())
    }

    /// Package names for completion
    pub async fn names(&mut self) -> PackageResult<Vec<String>> {
        self.ctx.ensure_catalog().await?;
        Ok(self
            .ctx
            .catalog()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}
