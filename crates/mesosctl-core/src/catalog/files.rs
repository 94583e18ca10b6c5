//! Per-version package artifacts.
//!
//! Each version directory holds `config.json` (configuration schema),
//! `package.json` (descriptor), `resource.json` (resource data) and
//! `marathon.json.mustache` (deployment template).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::Package;
use crate::error::{PackageError, PackageResult};
use crate::repository::RepositoryLayout;

pub const CONFIG_SCHEMA_FILE: &str = "config.json";
pub const DESCRIPTOR_FILE: &str = "package.json";
pub const RESOURCE_FILE: &str = "resource.json";
pub const TEMPLATE_FILE: &str = "marathon.json.mustache";

/// Contents of package.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    /// Whether installing the package registers a scheduler framework
    #[serde(default)]
    pub framework: bool,

    #[serde(default)]
    pub pre_install_notes: Option<String>,

    #[serde(default)]
    pub post_install_notes: Option<String>,

    #[serde(default)]
    pub post_uninstall_notes: Option<String>,
}

/// The four artifacts of one package version
#[derive(Debug, Clone)]
pub struct PackageFileSet {
    pub config_schema: Value,
    pub descriptor: PackageDescriptor,
    pub resource: Value,
    pub template: String,
}

/// Reads package artifacts out of an extracted repository
#[derive(Debug, Clone)]
pub struct PackageFiles {
    layout: RepositoryLayout,
}

impl PackageFiles {
    pub fn new(layout: RepositoryLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RepositoryLayout {
        &self.layout
    }

    /// Directory of `package` at `version`
    pub fn version_dir(&self, package: &Package, version: &str) -> PackageResult<PathBuf> {
        let revision = package
            .revision(version)
            .ok_or_else(|| PackageError::version_not_found(&package.name, version))?;
        Ok(self.layout.package_dir(&package.name, revision))
    }

    pub async fn load(&self, package: &Package, version: &str) -> PackageResult<PackageFileSet> {
        let dir = self.version_dir(package, version)?;
        debug!(package = %package.name, version, dir = %dir.display(), "Loading package files");

        let config_schema = read_json(&dir.join(CONFIG_SCHEMA_FILE)).await?;
        let descriptor = parse_descriptor(&dir.join(DESCRIPTOR_FILE)).await?;
        let resource = read_json(&dir.join(RESOURCE_FILE)).await?;
        let template = read_text(&dir.join(TEMPLATE_FILE)).await?;

        Ok(PackageFileSet {
            config_schema,
            descriptor,
            resource,
            template,
        })
    }

    /// Only package.json, as needed by uninstall
    pub async fn load_descriptor(
        &self,
        package: &Package,
        version: &str,
    ) -> PackageResult<PackageDescriptor> {
        let dir = self.version_dir(package, version)?;
        Ok(parse_descriptor(&dir.join(DESCRIPTOR_FILE)).await?)
    }
}

async fn read_text(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read package file: {}", path.display()))
}

async fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = read_text(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse package file: {}", path.display()))
}

async fn parse_descriptor(path: &Path) -> anyhow::Result<PackageDescriptor> {
    let content = read_text(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse package descriptor: {}", path.display()))
}
