//! Load and persist mesosctl.toml, including the installed-package ledger.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{MesosCtlConfig, parser, paths::default_config_path};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn from_default_location() -> Self {
        Self::new(default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Missing file yields the default configuration
    pub fn load(&self) -> anyhow::Result<MesosCtlConfig> {
        if !self.config_path.exists() {
            return Ok(MesosCtlConfig::new());
        }
        parser::parse_config_toml(&self.config_path)
    }

    /// Writes a sibling `.tmp` file and renames it over the settings file
    pub fn save(&self, config: &MesosCtlConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config)?;
        let dir = self.config_path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create settings directory {}", dir.display()))?;
        }

        let staging = self.config_path.with_extension("toml.tmp");
        std::fs::write(&staging, content)
            .with_context(|| format!("Cannot write {}", staging.display()))?;
        std::fs::rename(&staging, &self.config_path).with_context(|| {
            format!("Cannot replace settings file {}", self.config_path.display())
        })?;
        tracing::debug!(path = %self.config_path.display(), "settings saved");
        Ok(())
    }
}
