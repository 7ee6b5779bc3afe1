//! Catalog documents and the Catalog Resolver.
//!
//! A catalog is a named YAML document mapping item names to
//! [`CatalogItem`]s. Catalogs are fetched in configured order; resolution
//! is "first-hit": the first catalog containing a usable entry for a name
//! wins.

use crate::error::GorillaError;
use crate::hash::hashes_equal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallerType {
    Msi,
    Exe,
    Ps1,
    Nupkg,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallerSpec {
    #[serde(rename = "type", default)]
    pub installer_type: Option<InstallerType>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub product_code: Option<String>,
}

impl InstallerSpec {
    pub fn is_usable(&self) -> bool {
        self.installer_type.is_some() && !self.location.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCheck {
    pub path: String,
    /// SHA-256 hex digest, populated on `check.file[]` entries.
    #[serde(default)]
    pub hash: Option<String>,
    /// MD5 hex digest, populated on top-level `installs[]` entries.
    #[serde(default)]
    pub md5checksum: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryCheck {
    pub name: String,
    pub version: String,
}

/// The install-check block: exactly one of `script`, `file`, `registry`,
/// or the item's own top-level `installs[]` is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub file: Vec<FileCheck>,
    #[serde(default)]
    pub registry: Option<RegistryCheck>,
}

/// One package as described by a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub supported_architectures: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub installer: InstallerSpec,
    #[serde(default)]
    pub uninstaller: InstallerSpec,
    #[serde(default)]
    pub check: Check,
    #[serde(default)]
    pub installs: Vec<FileCheck>,
    #[serde(default)]
    pub preinstall_script: Option<String>,
    #[serde(default)]
    pub postinstall_script: Option<String>,
}

impl CatalogItem {
    pub fn is_installable(&self) -> bool {
        self.installer.is_usable()
    }

    pub fn is_uninstallable(&self) -> bool {
        self.uninstaller.is_usable()
    }
}

/// Orders two version strings: semver when both parse, lexicographic
/// fallback otherwise. Lenient parsing pads missing components (`"1.2"`
/// -> `"1.2.0"`) before handing off to `semver`.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (lenient_semver(a), lenient_semver(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

fn lenient_semver(v: &str) -> Option<semver::Version> {
    let parts: Vec<&str> = v.split('.').collect();
    let padded = match parts.len() {
        0 => return None,
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => parts[..3].join("."),
    };
    semver::Version::parse(&padded).ok()
}

/// A catalog document: an ordered mapping from item name to `CatalogItem`.
pub type CatalogDoc = BTreeMap<String, CatalogItem>;

pub fn parse_catalog(content: &str) -> Result<CatalogDoc, GorillaError> {
    let items: Vec<CatalogItem> =
        serde_yaml::from_str(content).map_err(|e| GorillaError::Parse {
            path: "<catalog>".to_string(),
            source: e,
        })?;
    Ok(items.into_iter().map(|item| (item.name.clone(), item)).collect())
}

/// Catalogs in configured order, each already parsed into a name -> item
/// map, keyed by 1-based position.
#[derive(Debug, Default)]
pub struct CatalogMap {
    by_index: BTreeMap<usize, CatalogDoc>,
}

impl CatalogMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, doc: CatalogDoc) {
        self.by_index.insert(index, doc);
    }

    /// Scans catalogs in ascending index order and returns the first entry
    /// whose name matches and which is installable or uninstallable.
    pub fn first_item(&self, name: &str) -> Result<&CatalogItem, GorillaError> {
        for doc in self.by_index.values() {
            if let Some(item) = doc.get(name) {
                if item.is_installable() || item.is_uninstallable() {
                    return Ok(item);
                }
            }
        }
        Err(GorillaError::NotFound(name.to_string()))
    }
}

/// Verifies a downloaded payload's hash against the catalog-declared hash,
/// case-insensitively.
pub fn verify_installer_hash(item: &CatalogItem, actual: &str) -> Result<(), GorillaError> {
    if hashes_equal(&item.installer.hash, actual) {
        Ok(())
    } else {
        Err(GorillaError::Integrity {
            name: item.name.clone(),
            version: item.version.clone(),
            expected: item.installer.hash.clone(),
            actual: actual.to_string(),
        })
    }
}
