//! Homebrew adapter.
//!
//! Mutations go through the declarative templates; listing, info and search
//! parse Homebrew's own JSON and headings.

use crate::backend::PackageManager;
use crate::backend::generic::{GenericManager, command_failed};
use crate::error::{Error, Result};
use crate::exec::{Context, Executor};
use crate::spec::ManagerSpec;
use crate::types::{HealthCheck, HealthStatus, PackageInfo};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct BrewManager {
    inner: GenericManager,
}

impl BrewManager {
    pub fn new(spec: ManagerSpec, exec: Arc<dyn Executor>) -> Result<Self> {
        Ok(Self {
            inner: GenericManager::new("brew", spec, exec)?,
        })
    }

    fn brew(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.inner.spec().binary.as_str())
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    /// Installed formula names plus aliases and cask tokens.
    fn installed_from_json(&self, ctx: &Context) -> Result<BTreeSet<String>> {
        let output = self
            .inner
            .run_checked(ctx, &self.brew(&["info", "--installed", "--json=v2"]))?;
        let json: Value = serde_json::from_slice(&output.stdout)?;

        let mut names = BTreeSet::new();
        for formula in json["formulae"].as_array().into_iter().flatten() {
            if let Some(name) = formula["name"].as_str() {
                names.insert(name.to_string());
            }
            let aliases = formula["aliases"].as_array().into_iter().flatten();
            names.extend(aliases.filter_map(Value::as_str).map(str::to_string));
        }
        for cask in json["casks"].as_array().into_iter().flatten() {
            if let Some(token) = cask["token"].as_str() {
                names.insert(token.to_string());
            }
        }
        Ok(names)
    }

    fn prefix_bin(&self, ctx: &Context) -> Result<Option<PathBuf>> {
        let output = self.inner.run_argv(ctx, &self.brew(&["--prefix"]))?;
        if !output.success() {
            return Ok(None);
        }
        let prefix = output.stdout_str().trim().to_string();
        Ok((!prefix.is_empty()).then(|| Path::new(&prefix).join("bin")))
    }
}

/// Parse one `brew info --json=v2 <name>` document.
fn parse_info(name: &str, json: &Value) -> Option<PackageInfo> {
    let mut info = PackageInfo::new(name, "brew");
    let text = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    if let Some(formula) = json["formulae"].as_array().and_then(|a| a.first()) {
        info.version = text(&formula["versions"]["stable"]);
        info.description = text(&formula["desc"]);
        info.homepage = text(&formula["homepage"]);
        info.dependencies = formula["dependencies"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        info.installed = formula["installed"]
            .as_array()
            .is_some_and(|a| !a.is_empty());
        return Some(info);
    }

    if let Some(cask) = json["casks"].as_array().and_then(|a| a.first()) {
        info.version = text(&cask["version"]);
        info.description = text(&cask["desc"]);
        info.homepage = text(&cask["homepage"]);
        info.installed = cask["installed"].as_str().is_some();
        return Some(info);
    }

    None
}

impl PackageManager for BrewManager {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn spec(&self) -> &ManagerSpec {
        self.inner.spec()
    }

    fn is_available(&self, ctx: &Context) -> Result<bool> {
        self.inner.is_available(ctx)
    }

    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>> {
        let plain = self.inner.list_installed(ctx)?;
        match self.installed_from_json(ctx) {
            Ok(mut names) => {
                names.extend(plain);
                Ok(names.into_iter().collect())
            }
            Err(e) if e.is_context() => Err(e),
            Err(e) => {
                log::debug!("brew: alias enrichment unavailable: {e}");
                Ok(plain)
            }
        }
    }

    fn normalize_name(&self, name: &str) -> String {
        self.inner.normalize_name(name)
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        self.inner.install(ctx, name)
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        self.inner.uninstall(ctx, name)
    }

    fn upgrade(&self, ctx: &Context, names: &[String]) -> Result<()> {
        self.inner.upgrade(ctx, names)
    }

    fn upgrade_all(&self, ctx: &Context) -> Result<()> {
        self.inner.upgrade_all(ctx)
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let template = &self.inner.spec().info;
        if template.is_empty() {
            return self.inner.info(ctx, name);
        }
        let argv = template.render(name);
        let output = self.inner.run_argv(ctx, &argv)?;
        if !output.success() {
            let text = output.combined();
            if text.contains("No available formula") || text.contains("No cask") {
                return Err(Error::NotFound(format!("brew:{name}")));
            }
            return Err(command_failed(&argv, &output));
        }
        let json: Value = serde_json::from_slice(&output.stdout)?;
        parse_info(name, &json).ok_or_else(|| Error::NotFound(format!("brew:{name}")))
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        let names = self.inner.search(ctx, query)?;
        // The lines parser already dropped blank lines; headings remain
        Ok(names
            .into_iter()
            .filter(|n| !n.starts_with("==>"))
            .collect())
    }

    fn health(&self, ctx: &Context) -> Result<HealthCheck> {
        let check = self.inner.health(ctx)?;
        if check.status != HealthStatus::Pass {
            return Ok(check);
        }

        let Some(bin) = self.prefix_bin(ctx)? else {
            return Ok(check);
        };
        let on_path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).any(|dir| dir == bin))
            .unwrap_or(false);
        let check = check.detail(format!("prefix bin: {}", bin.display()));
        if on_path {
            return Ok(check);
        }

        let mut check = check
            .issue(format!("{} is not on PATH", bin.display()))
            .suggestion(format!("Add {} to PATH in your shell profile", bin.display()));
        check.status = HealthStatus::Warn;
        check.message = "brew is available but its bin directory is not on PATH".to_string();
        Ok(check)
    }
}
