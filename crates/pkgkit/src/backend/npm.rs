//! npm adapter.

use crate::backend::PackageManager;
use crate::backend::generic::{GenericManager, command_failed};
use crate::error::{Error, Result};
use crate::exec::{Context, Executor};
use crate::spec::ManagerSpec;
use crate::types::{HealthCheck, PackageInfo};
use serde_json::Value;
use std::sync::Arc;

pub struct NpmManager {
    inner: GenericManager,
}

impl NpmManager {
    pub fn new(spec: ManagerSpec, exec: Arc<dyn Executor>) -> Result<Self> {
        Ok(Self {
            inner: GenericManager::new("npm", spec, exec)?,
        })
    }
}

/// Parse `npm view <name> --json`.
///
/// npm prints a single object for one version, an array when a range
/// matched several; the last entry is the newest.
fn parse_view(name: &str, json: &Value) -> PackageInfo {
    let mut info = PackageInfo::new(name, "npm");
    let doc = match json {
        Value::Array(items) => match items.last() {
            Some(last) => last,
            None => return info,
        },
        other => other,
    };
    let text = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    info.version = text(&doc["version"]);
    info.description = text(&doc["description"]);
    info.homepage = text(&doc["homepage"]);
    info.dependencies = doc["dependencies"]
        .as_object()
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default();
    info
}

impl PackageManager for NpmManager {
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
        let argv = &self.inner.spec().list.command;
        if argv.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.inner.run_argv(ctx, argv)?;
        match output.code {
            Some(0) => {}
            // Peer-dependency problems exit 1 with a complete listing
            Some(1) => log::debug!("npm list exited 1; using its output anyway"),
            _ => return Err(command_failed(argv, &output)),
        }
        self.inner.parse_list(&output.stdout)
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
            if output.combined().contains("E404") {
                return Err(Error::NotFound(format!("npm:{name}")));
            }
            return Err(command_failed(&argv, &output));
        }

        let json: Value = serde_json::from_slice(&output.stdout)?;
        let mut info = parse_view(name, &json);
        info.installed = match self.is_installed(ctx, name) {
            Ok(installed) => installed,
            Err(e) if e.is_context() => return Err(e),
            Err(e) => {
                log::debug!("npm: could not determine install state: {e}");
                false
            }
        };
        Ok(info)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        self.inner.search(ctx, query)
    }

    fn health(&self, ctx: &Context) -> Result<HealthCheck> {
        self.inner.health(ctx)
    }
}
