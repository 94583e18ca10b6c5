//! Package catalog loaded from the local repository mirror
//!
//! [`CatalogStore`] owns every [`Package`] parsed from the repository's
//! `index.json` together with the search index built over them. Nothing
//! refreshes it behind the caller's back: after a repository download the
//! caller must `reload` explicitly.

pub mod files;
pub mod index;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{PackageError, PackageResult};
use crate::repository::RepositoryLayout;

pub use files::{PackageDescriptor, PackageFileSet, PackageFiles};
pub use index::{Field, IndexDocument, SearchIndex};

/// A package entry from the repository index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub current_version: String,

    /// Version string -> revision directory name
    #[serde(default, deserialize_with = "deserialize_revisions")]
    pub versions: BTreeMap<String, String>,

    /// Index-level hint; the version's package.json is authoritative
    #[serde(default)]
    pub framework: bool,
}

impl Package {
    /// Revision directory for `version`
    pub fn revision(&self, version: &str) -> Option<&str> {
        self.versions.get(version).map(String::as_str)
    }

    pub fn current_revision(&self) -> Option<&str> {
        self.revision(&self.current_version)
    }

    /// Versions ordered by semver where every key parses, lexically otherwise
    pub fn sorted_versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.versions.keys().map(String::as_str).collect();
        let parsed: Option<Vec<semver::Version>> = versions
            .iter()
            .map(|v| semver::Version::parse(v).ok())
            .collect();
        if let Some(mut parsed) = parsed {
            parsed.sort();
            let order: Vec<String> = parsed.iter().map(ToString::to_string).collect();
            versions.sort_by_key(|v| order.iter().position(|o| o == v));
        }
        versions
    }
}

/// Revision references appear as strings or bare integers depending on the index producer.
fn deserialize_revisions<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(version, revision)| match revision {
            serde_json::Value::String(s) => Ok((version, s)),
            serde_json::Value::Number(n) => Ok((version, n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "invalid revision for version {}: {}",
                version, other
            ))),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CatalogDump {
    #[serde(default)]
    packages: Vec<Package>,
}

#[derive(Debug)]
struct LoadedCatalog {
    /// Sorted by name; positions double as search document ids
    packages: Vec<Package>,
    by_name: HashMap<String, usize>,
    index: SearchIndex,
}

/// A search result borrowed from the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<'a> {
    pub package: &'a Package,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct CatalogStore {
    loaded: Option<LoadedCatalog>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Parse a catalog dump (the repository's index.json) and build the index.
    ///
    /// Replaces whatever was loaded before; on error the previous catalog is kept.
    pub fn load(&mut self, dump: &str) -> PackageResult<()> {
        let parsed: CatalogDump =
            serde_json::from_str(dump).context("Failed to parse package index")?;

        let mut packages: Vec<Package> = Vec::with_capacity(parsed.packages.len());
        let mut seen = BTreeSet::new();
        for package in parsed.packages {
            if !seen.insert(package.name.clone()) {
                warn!(name = %package.name, "Duplicate package in index; keeping first entry");
                continue;
            }
            packages.push(package);
        }
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        let by_name = packages
            .iter()
            .enumerate()
            .map(|(i, package)| (package.name.clone(), i))
            .collect();

        let tag_lists: Vec<Vec<&str>> = packages
            .iter()
            .map(|package| package.tags.iter().map(String::as_str).collect())
            .collect();
        let index = SearchIndex::build(packages.iter().zip(&tag_lists).map(|(package, tags)| {
            IndexDocument {
                name: &package.name,
                description: &package.description,
                tags: tags.as_slice(),
            }
        }));

        info!(
            packages = packages.len(),
            terms = index.term_count(),
            "Package catalog loaded"
        );

        self.loaded = Some(LoadedCatalog {
            packages,
            by_name,
            index,
        });
        Ok(())
    }

    /// Read `index.json` from an extracted repository and load it.
    pub async fn load_from_layout(&mut self, layout: &RepositoryLayout) -> PackageResult<()> {
        let path = layout.index_path();
        let dump = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read package index: {}", path.display()))?;
        self.load(&dump)
    }

    /// Drop the current catalog and load it again from disk.
    pub async fn reload(&mut self, layout: &RepositoryLayout) -> PackageResult<()> {
        self.loaded = None;
        self.load_from_layout(layout).await
    }

    pub fn lookup(&self, name: &str) -> PackageResult<&Package> {
        self.loaded
            .as_ref()
            .and_then(|catalog| {
                catalog
                    .by_name
                    .get(name)
                    .map(|&i| &catalog.packages[i])
            })
            .ok_or_else(|| PackageError::package_not_found(name))
    }

    /// Relevance-ordered matches; an empty result is not an error.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        let Some(catalog) = self.loaded.as_ref() else {
            return Vec::new();
        };
        catalog
            .index
            .search(query)
            .into_iter()
            .map(|(doc, score)| SearchHit {
                package: &catalog.packages[doc],
                score,
            })
            .collect()
    }

    /// Package names in sorted order, e.g. for completion
    pub fn names(&self) -> Vec<&str> {
        self.packages().iter().map(|p| p.name.as_str()).collect()
    }

    pub fn packages(&self) -> &[Package] {
        self.loaded
            .as_ref()
            .map(|catalog| catalog.packages.as_slice())
            .unwrap_or(&[])
    }
}
