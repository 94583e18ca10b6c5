//! Settings for the active cluster
//!
//! Holds the controller endpoints, the local storage location of the
//! package repository, the agent addresses used for name resolution and
//! the ledger of packages installed through this tool.

pub mod parser;
pub mod paths;
pub mod store;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub use parser::{parse_config_toml, parse_config_toml_str, to_toml};
pub use paths::{default_config_path, default_storage_dir};
pub use store::ConfigStore;

pub const DEFAULT_REPOSITORY_VERSION: &str = "version-2.x";
pub const DEFAULT_ARCHIVE_URL: &str = "https://github.com/mesosphere/universe/archive/{version}.zip";
pub const DEFAULT_MARATHON_URL: &str = "http://leader.mesos:8080";
pub const DEFAULT_MASTER_URL: &str = "http://leader.mesos:5050";
pub const DEFAULT_DNS_TLD: &str = ".mesos";

/// Root structure of mesosctl.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MesosCtlConfig {
    /// Base directory holding the downloaded repository
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default)]
    pub repository: RepositorySettings,

    /// Marathon base URL (applications)
    #[serde(default = "default_marathon_url")]
    pub marathon_url: String,

    /// Mesos master base URL (frameworks)
    #[serde(default = "default_master_url")]
    pub master_url: String,

    /// Cluster agents, queried as DNS servers for names under `dns_tld`
    #[serde(default)]
    pub agents: Vec<String>,

    #[serde(default = "default_dns_tld")]
    pub dns_tld: String,

    /// Append-only ledger of successful installs
    #[serde(default)]
    pub installed_packages: Vec<InstalledPackage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositorySettings {
    #[serde(default = "default_repository_version")]
    pub version: String,

    /// Archive location; `{version}` is substituted
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
}

fn default_repository_version() -> String {
    DEFAULT_REPOSITORY_VERSION.to_string()
}

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}

fn default_marathon_url() -> String {
    DEFAULT_MARATHON_URL.to_string()
}

fn default_master_url() -> String {
    DEFAULT_MASTER_URL.to_string()
}

fn default_dns_tld() -> String {
    DEFAULT_DNS_TLD.to_string()
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            version: default_repository_version(),
            archive_url: default_archive_url(),
        }
    }
}

impl Default for MesosCtlConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            repository: RepositorySettings::default(),
            marathon_url: default_marathon_url(),
            master_url: default_master_url(),
            agents: Vec::new(),
            dns_tld: default_dns_tld(),
            installed_packages: Vec::new(),
        }
    }
}

impl MesosCtlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings that cannot be expressed through serde alone
    pub fn validate(&self) -> anyhow::Result<()> {
        self.marathon_base()?;
        self.master_base()?;
        self.agent_addresses()?;

        if self.repository.version.trim().is_empty() {
            anyhow::bail!("repository.version must not be empty");
        }
        if !self.repository.archive_url.contains("{version}") {
            anyhow::bail!(
                "repository.archive_url must contain a {{version}} placeholder: {}",
                self.repository.archive_url
            );
        }
        Ok(())
    }

    pub fn marathon_base(&self) -> anyhow::Result<Url> {
        Url::parse(&self.marathon_url)
            .with_context(|| format!("Invalid marathon_url: {}", self.marathon_url))
    }

    pub fn master_base(&self) -> anyhow::Result<Url> {
        Url::parse(&self.master_url)
            .with_context(|| format!("Invalid master_url: {}", self.master_url))
    }

    pub fn agent_addresses(&self) -> anyhow::Result<Vec<IpAddr>> {
        self.agents
            .iter()
            .map(|agent| {
                agent
                    .trim()
                    .parse::<IpAddr>()
                    .with_context(|| format!("Invalid agent address: {}", agent))
            })
            .collect()
    }

    /// Record a successful install in the ledger.
    ///
    /// Entries are never pruned; uninstall does not consult the ledger.
    pub fn record_install(&mut self, name: &str, version: &str) {
        self.installed_packages.push(InstalledPackage {
            name: name.to_string(),
            version: version.to_string(),
            installed_at: Utc::now(),
        });
    }

    pub fn installed_package_names(&self) -> Vec<&str> {
        self.installed_packages
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }
}
