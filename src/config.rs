//! `homestead.toml` loading and validation
//!
//! ```toml
//! default_manager = "brew"
//! operation_timeout = 300
//! package_timeout = 180
//! ignore_patterns = [".DS_Store", ".git", "*.swp", "*.tmp"]
//!
//! [managers.npm.install]
//! idempotent_errors = ["already installed", "up to date"]
//!
//! [managers.mise]
//! binary = "mise"
//! list = { command = ["mise", "ls", "--global", "--json"], parse = "json-map", json_field = "tools" }
//! ```
//!
//! `[managers.<name>]` overrides merge field by field onto the built-in
//! spec of the same name; unknown names define new generic managers.

use anyhow::{Context, Result, bail};
use pkgkit::parse::JsonPath;
use pkgkit::parse::transform::{NameRewriter, validate_extractor};
use pkgkit::{ManagerSpec, ParseStrategy, default_managers, merge_manager_config};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::resource::dotfile::IgnoreSet;

const DEFAULT_OPERATION_TIMEOUT: u64 = 300;
const DEFAULT_PACKAGE_TIMEOUT: u64 = 180;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manager used for package specs without a `manager:` prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_manager: Option<String>,

    /// Seconds a whole command (apply, upgrade) may run
    pub operation_timeout: u64,

    /// Seconds a single package operation may run
    pub package_timeout: u64,

    /// File names skipped when walking dotfile sources (`*`, `?` and `[...]` globs)
    pub ignore_patterns: Vec<String>,

    /// Per-manager overrides and user-defined managers
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub managers: BTreeMap<String, ManagerSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_manager: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            package_timeout: DEFAULT_PACKAGE_TIMEOUT,
            ignore_patterns: default_ignore_patterns(),
            managers: BTreeMap::new(),
        }
    }
}

fn default_ignore_patterns() -> Vec<String> {
    [".DS_Store", ".git", "*.swp", "*.tmp"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Config {
    /// Load the config file, or return defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Built-in manager specs with the user's overrides merged on top
    pub fn resolved_managers(&self) -> BTreeMap<String, ManagerSpec> {
        let mut specs = default_managers();
        for (name, over) in &self.managers {
            let merged = match specs.get(name) {
                Some(base) => merge_manager_config(base, over),
                None => over.clone(),
            };
            specs.insert(name.clone(), merged);
        }
        specs
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout)
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("default_manager {name:?} is not a known manager (known: {known})")]
    UnknownDefaultManager { name: String, known: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("invalid ignore pattern {pattern:?}: {message}")]
    IgnorePattern { pattern: String, message: String },

    #[error("manager {manager:?}: {message}")]
    Manager { manager: String, message: String },

    #[error("invalid package name {name:?}: {reason}")]
    PackageName { name: String, reason: &'static str },
}

impl ConfigError {
    fn manager(manager: &str, message: impl Into<String>) -> Self {
        Self::Manager {
            manager: manager.to_string(),
            message: message.into(),
        }
    }
}

/// Checks a loaded [`Config`] against the set of manager names the registry
/// is seeded with.
///
/// Parse strategy and normalize values outside their enums are rejected
/// while deserializing; this validator covers the cross-field rules.
pub struct ConfigValidator {
    valid_managers: BTreeSet<String>,
}

impl ConfigValidator {
    pub fn new(valid_managers: BTreeSet<String>) -> Self {
        Self { valid_managers }
    }

    /// Every problem found, in a stable order
    pub fn validate(&self, config: &Config) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Some(name) = &config.default_manager {
            if !self.valid_managers.contains(name) {
                errors.push(ConfigError::UnknownDefaultManager {
                    name: name.clone(),
                    known: self
                        .valid_managers
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        if config.operation_timeout == 0 {
            errors.push(ConfigError::ZeroTimeout {
                field: "operation_timeout",
            });
        }
        if config.package_timeout == 0 {
            errors.push(ConfigError::ZeroTimeout {
                field: "package_timeout",
            });
        }

        for pattern in &config.ignore_patterns {
            if let Err(e) = IgnoreSet::new(std::slice::from_ref(pattern)) {
                errors.push(ConfigError::IgnorePattern {
                    pattern: pattern.clone(),
                    message: format!("{e:#}"),
                });
            }
        }

        let builtin = default_managers();
        let resolved = config.resolved_managers();
        for name in config.managers.keys() {
            if let Some(spec) = resolved.get(name) {
                validate_manager(name, spec, !builtin.contains_key(name), &mut errors);
            }
        }

        errors
    }

    /// Fail with every problem listed
    pub fn check(&self, config: &Config) -> Result<()> {
        let errors = self.validate(config);
        if errors.is_empty() {
            return Ok(());
        }
        let list: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        bail!(
            "Invalid configuration ({} problem(s)):\n{}",
            errors.len(),
            list.join("\n")
        )
    }
}

fn validate_manager(name: &str, spec: &ManagerSpec, user_defined: bool, errors: &mut Vec<ConfigError>) {
    if user_defined && spec.binary.trim().is_empty() {
        errors.push(ConfigError::manager(name, "binary is required for a new manager"));
    }

    let list = &spec.list;
    match list.strategy() {
        ParseStrategy::Lines => {}
        ParseStrategy::Json | ParseStrategy::JsonMap => {
            if list.json_field.is_empty() {
                errors.push(ConfigError::manager(
                    name,
                    format!("parse strategy {} needs json_field", list.strategy()),
                ));
            }
        }
        ParseStrategy::JsonPath => {
            if list.keys_from.is_empty() && list.values_from.is_empty() {
                errors.push(ConfigError::manager(
                    name,
                    "parse strategy jsonpath needs keys_from or values_from",
                ));
            }
            for (field, expr) in [("keys_from", &list.keys_from), ("values_from", &list.values_from)] {
                if expr.is_empty() {
                    continue;
                }
                if let Err(e) = JsonPath::parse(expr) {
                    errors.push(ConfigError::manager(name, format!("{field}: {e}")));
                }
            }
        }
    }

    if let Some(transform) = &spec.name_transform {
        if let Err(e) = NameRewriter::new(transform) {
            errors.push(ConfigError::manager(name, format!("name_transform: {e}")));
        }
    }

    for (key, extractor) in &spec.metadata_extractors {
        if let Err(e) = validate_extractor(key, extractor) {
            errors.push(ConfigError::manager(name, e.to_string()));
        }
    }

    if !spec.upgrade_target.is_empty()
        && spec.upgrade_target != "name"
        && !spec.metadata_extractors.contains_key(&spec.upgrade_target)
    {
        errors.push(ConfigError::manager(
            name,
            format!(
                "upgrade_target {:?} names no metadata extractor",
                spec.upgrade_target
            ),
        ));
    }
}

/// Package names must be non-empty, whitespace-free, and must not start or
/// end with a hyphen.
pub fn validate_package_name(name: &str) -> std::result::Result<(), ConfigError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else if name.starts_with('-') || name.ends_with('-') {
        Some("name starts or ends with a hyphen")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ConfigError::PackageName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================
