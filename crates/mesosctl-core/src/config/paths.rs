//! Default locations for settings and repository storage.

use std::path::PathBuf;

/// Environment variable overriding the storage base directory
pub const STORAGE_DIR_ENV: &str = "MESOSCTL_CONFIGURATION_BASE_PATH";

pub const CONFIG_FILE_NAME: &str = "mesosctl.toml";

/// `$MESOSCTL_CONFIGURATION_BASE_PATH`, else `~/.mesosctl`.
pub fn default_storage_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STORAGE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mesosctl")
}

pub fn default_config_path() -> PathBuf {
    default_storage_dir().join(CONFIG_FILE_NAME)
}
