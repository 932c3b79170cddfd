//! Package manager abstraction.
//!
//! The [`PackageManager`] trait is the one capability set every adapter
//! satisfies, whether it is driven purely by a [`ManagerSpec`]
//! ([`generic::GenericManager`]) or hand-written for a manager whose output
//! needs bespoke parsing ([`brew::BrewManager`], [`npm::NpmManager`]).

pub mod brew;
pub mod generic;
pub mod npm;

use crate::error::Result;
use crate::exec::Context;
use crate::parse::extract_metadata;
use crate::spec::ManagerSpec;
use crate::types::{HealthCheck, PackageInfo};
use std::collections::BTreeMap;

/// Category reported on every manager health check.
pub const HEALTH_CATEGORY: &str = "package-managers";

/// Capability set of one external package manager.
///
/// Availability is reported as `Ok(false)`, never as an error; only a done
/// [`Context`] turns an availability probe into `Err`.
pub trait PackageManager: Send + Sync {
    /// Registry name (`brew`, `npm`, ...).
    fn name(&self) -> &str;

    /// The merged specification backing this adapter.
    fn spec(&self) -> &ManagerSpec;

    /// Whether the binary resolves and its verification probe succeeds.
    fn is_available(&self, ctx: &Context) -> Result<bool>;

    /// Installed package names, normalized and de-duplicated.
    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>>;

    /// `name` rewritten and normalized the way [`list_installed`] reports
    /// names, so lock entries and live names compare equal.
    ///
    /// [`list_installed`]: PackageManager::list_installed
    fn normalize_name(&self, name: &str) -> String;

    /// Check if a single package is installed.
    fn is_installed(&self, ctx: &Context, name: &str) -> Result<bool> {
        let wanted = self.normalize_name(name);
        Ok(self.list_installed(ctx)?.iter().any(|n| *n == wanted))
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()>;

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()>;

    /// Upgrade `names`; an empty slice means every package.
    fn upgrade(&self, ctx: &Context, names: &[String]) -> Result<()>;

    fn upgrade_all(&self, ctx: &Context) -> Result<()>;

    /// Best-effort package details.
    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo>;

    fn supports_search(&self) -> bool {
        self.spec().supports_search()
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>>;

    /// Diagnose the manager installation.
    fn health(&self, ctx: &Context) -> Result<HealthCheck>;

    /// Metadata derived from a package name by the configured extractors.
    fn metadata_for(&self, name: &str) -> BTreeMap<String, String> {
        extract_metadata(name, &self.spec().metadata_extractors)
    }

    /// The argument handed to upgrade for `name`.
    ///
    /// When `upgrade_target` names a metadata key, its recorded value wins
    /// over the bare name.
    fn upgrade_target(&self, name: &str, metadata: &BTreeMap<String, String>) -> String {
        let key = self.spec().upgrade_target.as_str();
        if key.is_empty() || key == "name" {
            return name.to_string();
        }
        metadata
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_managers;
    use crate::exec::testing::ScriptedExecutor;
    use crate::spec::Normalize;
    use generic::GenericManager;
    use std::sync::Arc;

    #[test]
    fn test_upgrade_target_prefers_metadata() {
        let npm = GenericManager::new(
            "npm",
            default_managers()["npm"].clone(),
            Arc::new(ScriptedExecutor::new()),
        )
        .unwrap();

        let mut meta = BTreeMap::new();
        assert_eq!(npm.upgrade_target("cli", &meta), "cli");
        meta.insert("full_name".to_string(), "@angular/cli".to_string());
        assert_eq!(npm.upgrade_target("cli", &meta), "@angular/cli");
    }

    #[test]
    fn test_metadata_for_uses_extractors() {
        let npm = GenericManager::new(
            "npm",
            default_managers()["npm"].clone(),
            Arc::new(ScriptedExecutor::new()),
        )
        .unwrap();
        let meta = npm.metadata_for("@types/node");
        assert_eq!(meta["scope"], "@types");
    }

    #[test]
    fn test_is_installed_compares_normalized_names() {
        let mut spec = default_managers()["pipx"].clone();
        spec.list.normalize = Some(Normalize::Lower);
        let exec = ScriptedExecutor::new().on("pipx list --short", 0, "Django 5.0
");
        let pipx = GenericManager::new("pipx", spec, Arc::new(exec)).unwrap();

        assert_eq!(pipx.normalize_name("Django"), "django");
        assert!(pipx.is_installed(&Context::background(), "Django").unwrap());
    }
}
