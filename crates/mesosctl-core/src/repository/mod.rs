//! Local mirror of the package repository
//!
//! Downloads the versioned repository archive, unpacks it beneath the
//! storage directory and answers whether a given version is present.
//! Every catalog and package operation is gated on [`RepositorySync::is_present`].
//!
//! Downloads are not coordinated: two concurrent calls for the same
//! version write into the same directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::error::{PackageError, PackageResult};

/// On-disk layout of one extracted repository version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLayout {
    storage_dir: PathBuf,
    version: String,
}

impl RepositoryLayout {
    pub fn new(storage_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Directory the archive is extracted into
    pub fn extract_dir(&self) -> PathBuf {
        self.storage_dir.join("repository")
    }

    /// `<storage>/repository/universe-<version>`
    pub fn root(&self) -> PathBuf {
        self.extract_dir().join(format!("universe-{}", self.version))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root().join("repo").join("meta").join("index.json")
    }

    /// Packages are bucketed by the upper-cased first letter of their name.
    pub fn package_dir(&self, name: &str, revision: &str) -> PathBuf {
        let bucket: String = name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default();
        self.root()
            .join("repo")
            .join("packages")
            .join(bucket)
            .join(name)
            .join(revision)
    }
}

/// Fetches and unpacks repository archives.
#[derive(Debug, Clone)]
pub struct RepositorySync {
    storage_dir: PathBuf,
    archive_url: String,
    client: reqwest::Client,
}

impl RepositorySync {
    /// `archive_url` carries a `{version}` placeholder.
    pub fn new(storage_dir: impl Into<PathBuf>, archive_url: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            archive_url: archive_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn layout(&self, version: &str) -> RepositoryLayout {
        RepositoryLayout::new(&self.storage_dir, version)
    }

    pub fn archive_url(&self, version: &str) -> String {
        self.archive_url.replace("{version}", version)
    }

    /// Existence check of the extracted repository root
    pub fn is_present(&self, version: &str) -> bool {
        self.layout(version).root().is_dir()
    }

    /// Fail with `RepositoryMissing` unless the version is extracted.
    pub fn ensure_present(&self, version: &str) -> PackageResult<RepositoryLayout> {
        let layout = self.layout(version);
        if !layout.root().is_dir() {
            return Err(PackageError::RepositoryMissing {
                version: version.to_string(),
                path: layout.root(),
            });
        }
        Ok(layout)
    }

    /// Download the archive for `version` and extract it.
    ///
    /// Existing files are overwritten in place; files removed upstream are
    /// left behind. Use [`RepositorySync::remove`] first for a clean mirror.
    pub async fn download(&self, version: &str) -> PackageResult<RepositoryLayout> {
        let url = self.archive_url(version);
        info!(%url, "Downloading package repository");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| PackageError::Transport {
                method: "GET".to_string(),
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to download repository archive: HTTP {} from {}",
                response.status(),
                url
            )
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| PackageError::Transport {
                method: "GET".to_string(),
                url: url.clone(),
                source,
            })?;

        let layout = self.layout(version);
        extract_archive(&bytes, &layout.extract_dir())?;
        debug!(root = %layout.root().display(), "Repository extracted");

        if !layout.root().is_dir() {
            return Err(anyhow::anyhow!(
                "Repository archive from {} did not contain universe-{}/",
                url,
                version
            )
            .into());
        }

        Ok(layout)
    }

    /// Delete the extracted tree for `version`. Returns whether anything was removed.
    pub fn remove(&self, version: &str) -> PackageResult<bool> {
        let root = self.layout(version).root();
        if !root.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&root)
            .with_context(|| format!("Failed to remove repository: {}", root.display()))?;
        Ok(true)
    }
}

/// Extract a zip archive into `dest`
pub(crate) fn extract_archive(data: &[u8], dest: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    let cursor = std::io::Cursor::new(data);
    let mut archive =
        zip::ZipArchive::new(cursor).context("Failed to read repository archive as zip")?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        // Entries escaping the destination are skipped
        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read zip entry: {}", file.name()))?;

        let mut outfile = std::fs::File::create(&outpath)
            .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
        outfile
            .write_all(&buffer)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;
    }

    Ok(())
}
