//! Repository mirror commands.

use std::path::PathBuf;

use tracing::info;

use super::context::CommandContext;
use crate::error::PackageResult;

/// Outcome of a repository command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    pub version: String,
    /// Extracted repository root
    pub path: PathBuf,
    pub present: bool,
    /// Whether an archive was fetched by this command
    pub downloaded: bool,
    pub removed: bool,
    /// Packages in the loaded catalog, zero when not loaded
    pub packages: usize,
}

pub struct RepositoryCommand<'a> {
    ctx: &'a mut CommandContext,
}

impl<'a> RepositoryCommand<'a> {
    pub fn new(ctx: &'a mut CommandContext) -> Self {
        Self { ctx }
    }

    fn report(&self) -> RepositoryReport {
        let version = self.ctx.repository_version().to_string();
        RepositoryReport {
            present: self.ctx.sync().is_present(&version),
            path: self.ctx.layout().root(),
            version,
            downloaded: false,
            removed: false,
            packages: self.ctx.catalog().packages().len(),
        }
    }

    /// Download the repository only when it is not present, then load the catalog.
    pub async fn install(&mut self) -> PackageResult<RepositoryReport> {
        let version = self.ctx.repository_version().to_string();
        let downloaded = if self.ctx.sync().is_present(&version) {
            info!(%version, "Repository already present");
            false
        } else {
            self.ctx.sync().download(&version).await?;
            true
        };
        self.ctx.reload_catalog().await?;
        Ok(RepositoryReport {
            downloaded,
            ..self.report()
        })
    }

    /// Always download, then reload the catalog.
    pub async fn update(&mut self) -> PackageResult<RepositoryReport> {
        let version = self.ctx.repository_version().to_string();
        self.ctx.sync().download(&version).await?;
        self.ctx.reload_catalog().await?;
        Ok(RepositoryReport {
            downloaded: true,
            ..self.report()
        })
    }

    pub fn check(&self) -> RepositoryReport {
        self.report()
    }

    /// Delete the extracted tree and forget the loaded catalog.
    pub fn remove(&mut self) -> PackageResult<RepositoryReport> {
        let version = self.ctx.repository_version().to_string();
        let removed = self.ctx.sync().remove(&version)?;
        self.ctx.unload_catalog();
        Ok(RepositoryReport {
            removed,
            ..self.report()
        })
    }
}
