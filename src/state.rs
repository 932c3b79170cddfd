//! `homestead.lock`: the packages the user asked for
//!
//! ```toml
//! version = 1
//! updated_at = "2026-01-12T09:30:00Z"
//!
//! [packages]
//! brew = ["git", "ripgrep"]
//! npm = ["@angular/cli"]
//!
//! [metadata."npm:@angular/cli"]
//! full_name = "@angular/cli"
//! scope = "@angular"
//! ```
//!
//! The lock is the desired-state source for package resources. Package
//! lists are kept sorted and deduplicated so diffs stay readable.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::Item;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Lock format version written by this build
pub const LOCK_VERSION: u32 = 1;

// ============================================================================
// Lock Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub version: u32,

    /// Last time the lock was saved
    pub updated_at: DateTime<Utc>,

    /// Manager name → package names
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<String>>,

    /// `manager:name` → extractor output recorded at install time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Lock {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            updated_at: Utc::now(),
            packages: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Lock Implementation
// ============================================================================

impl Lock {
    /// Load the lock from disk, or return an empty lock if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Lock file does not exist, using empty lock");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read lock file: {}", path.display()))?;

        let mut lock: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse lock file: {}", path.display()))?;

        if lock.version > LOCK_VERSION {
            bail!(
                "Lock file {} has version {}, this build understands up to {}",
                path.display(),
                lock.version,
                LOCK_VERSION
            );
        }

        lock.tidy();
        log::debug!("Loaded lock from {}", path.display());
        Ok(lock)
    }

    /// Save the lock to disk
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create lock directory: {}", dir.display())
            })?;
        }

        self.version = LOCK_VERSION;
        self.updated_at = Utc::now();
        self.tidy();

        let content = toml::to_string_pretty(&self).context("Failed to serialize lock to TOML")?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write lock file: {}", path.display()))?;

        log::debug!("Saved lock to {}", path.display());
        Ok(())
    }

    /// Sort and dedupe package lists, drop empty managers and orphaned metadata.
    fn tidy(&mut self) {
        for names in self.packages.values_mut() {
            names.sort();
            names.dedup();
        }
        self.packages.retain(|_, names| !names.is_empty());

        let packages = &self.packages;
        self.metadata.retain(|key, values| {
            !values.is_empty()
                && key.split_once(':').is_some_and(|(manager, name)| {
                    packages
                        .get(manager)
                        .is_some_and(|names| names.iter().any(|n| n == name))
                })
        });
    }

    // ========================================================================
    // Package Helpers
    // ========================================================================

    /// Record a package. Returns false if it was already locked.
    pub fn add_package(
        &mut self,
        manager: &str,
        name: &str,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        let key = format!("{manager}:{name}");
        if metadata.is_empty() {
            self.metadata.remove(&key);
        } else {
            self.metadata.insert(key, metadata);
        }

        let names = self.packages.entry(manager.to_string()).or_default();
        if names.iter().any(|n| n == name) {
            return false;
        }
        names.push(name.to_string());
        names.sort();
        true
    }

    /// Forget a package. Returns false if it wasn't locked.
    pub fn remove_package(&mut self, manager: &str, name: &str) -> bool {
        self.metadata.remove(&format!("{manager}:{name}"));
        let Some(names) = self.packages.get_mut(manager) else {
            return false;
        };
        let before = names.len();
        names.retain(|n| n != name);
        let removed = names.len() < before;
        if names.is_empty() {
            self.packages.remove(manager);
        }
        removed
    }

    pub fn has_package(&self, manager: &str, name: &str) -> bool {
        self.packages
            .get(manager)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    /// Locked names for one manager, sorted
    pub fn packages_for(&self, manager: &str) -> &[String] {
        self.packages
            .get(manager)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Managers with at least one locked package, sorted
    pub fn managers(&self) -> Vec<String> {
        self.packages
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(manager, _)| manager.clone())
            .collect()
    }

    /// Every locked package as `manager:name`, sorted
    pub fn all_packages(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .packages
            .iter()
            .flat_map(|(manager, names)| names.iter().map(move |n| format!("{manager}:{n}")))
            .collect();
        all.sort();
        all
    }

    pub fn metadata_for(&self, manager: &str, name: &str) -> Option<&BTreeMap<String, String>> {
        self.metadata.get(&format!("{manager}:{name}"))
    }

    /// Desired items for one manager, with their recorded metadata
    pub fn packages_for_manager(&self, manager: &str) -> Vec<Item> {
        self.packages_for(manager)
            .iter()
            .map(|name| {
                let mut item = Item::new(manager, name);
                if let Some(metadata) = self.metadata_for(manager, name) {
                    item.metadata = metadata.clone();
                }
                item
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
