//! Package resource: one per manager, desired items from the lock

use anyhow::{Context, Result, bail};
use declarative::{Item, OperationStatus, Resource, ResourceKind};
use pkgkit::{Context as ExecContext, PackageManager};
use std::sync::Arc;
use std::time::Duration;

pub struct PackageResource {
    manager: Arc<dyn PackageManager>,
    desired: Vec<Item>,
    ctx: ExecContext,
    package_timeout: Duration,
}

impl PackageResource {
    /// `ctx` bounds the whole run; every install also gets `package_timeout`.
    pub fn new(
        manager: Arc<dyn PackageManager>,
        desired: Vec<Item>,
        ctx: ExecContext,
        package_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            desired,
            ctx,
            package_timeout,
        }
    }
}

impl Resource for PackageResource {
    fn id(&self) -> String {
        self.manager.name().to_string()
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Package
    }

    fn description(&self) -> String {
        let description = &self.manager.spec().description;
        if description.is_empty() {
            format!("{} packages", self.manager.name())
        } else {
            description.clone()
        }
    }

    /// Locked names, normalized so they line up with the live listing
    fn desired(&self) -> Result<Vec<Item>> {
        Ok(self
            .desired
            .iter()
            .map(|item| Item {
                name: self.manager.normalize_name(&item.name),
                ..item.clone()
            })
            .collect())
    }

    fn actual(&self) -> Result<Vec<Item>> {
        let name = self.manager.name();
        let available = self
            .manager
            .is_available(&self.ctx)
            .with_context(|| format!("Failed to check whether {name} is available"))?;
        if !available {
            bail!("{name} is not available on this system");
        }

        let installed = self
            .manager
            .list_installed(&self.ctx)
            .with_context(|| format!("Failed to list {name} packages"))?;
        Ok(installed
            .into_iter()
            .map(|pkg| {
                let mut item = Item::new(name, &pkg);
                item.metadata = self.manager.metadata_for(&pkg);
                item
            })
            .collect())
    }

    fn apply(&self, item: &Item) -> Result<OperationStatus> {
        let ctx = self.ctx.with_timeout(self.package_timeout);
        self.manager
            .install(&ctx, &item.name)
            .with_context(|| format!("Failed to install {}", item.key()))?;
        Ok(OperationStatus::Installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::is_context_error;
    use pkgkit::exec::testing::ScriptedExecutor;
    use pkgkit::{ContextError, Normalize, Registry, default_managers};

    fn resource(exec: ScriptedExecutor, manager: &str, desired: &[&str]) -> PackageResource {
        let registry = Registry::new(&default_managers(), Arc::new(exec)).unwrap();
        PackageResource::new(
            registry.get_manager(manager).unwrap(),
            desired.iter().map(|n| Item::new(manager, *n)).collect(),
            ExecContext::background(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_reconcile_against_live_list() {
        let exec = ScriptedExecutor::new()
            .with_binary("pipx")
            .on("pipx --version", 0, "1.4.3\n")
            .on("pipx list --short", 0, "black 24.1.0\nhttpie 3.2.2\n");
        let result = resource(exec, "pipx", &["black", "ruff"]).reconcile().unwrap();

        assert_eq!(result.resource, "pipx");
        assert_eq!(result.managed[0].name, "black");
        assert_eq!(result.missing[0].name, "ruff");
        assert_eq!(result.untracked[0].name, "httpie");
    }

    #[test]
    fn test_locked_names_follow_manager_normalization() {
        let mut managers = default_managers();
        if let Some(pipx) = managers.get_mut("pipx") {
            pipx.list.normalize = Some(Normalize::Lower);
        }
        let exec = ScriptedExecutor::new()
            .with_binary("pipx")
            .on("pipx --version", 0, "1.4.3\n")
            .on("pipx list --short", 0, "Django 5.0\n");
        let registry = Registry::new(&managers, Arc::new(exec)).unwrap();
        let resource = PackageResource::new(
            registry.get_manager("pipx").unwrap(),
            vec![Item::new("pipx", "Django")],
            ExecContext::background(),
            Duration::from_secs(30),
        );

        let result = resource.reconcile().unwrap();
        let managed: Vec<&str> = result.managed.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(managed, vec!["django"]);
        assert!(result.missing.is_empty());
        assert!(result.untracked.is_empty());
    }

    #[test]
    fn test_unavailable_manager_is_an_error() {
        let err = resource(ScriptedExecutor::new(), "gem", &["rails"])
            .actual()
            .unwrap_err();
        assert!(err.to_string().contains("gem is not available"));
        assert!(!is_context_error(&err));
    }

    #[test]
    fn test_actual_items_carry_metadata() {
        let exec = ScriptedExecutor::new()
            .with_binary("npm")
            .on("npm --version", 0, "10.2.4\n")
            .on(
                "npm list -g --depth=0 --json",
                0,
                r#"{"dependencies":{"@angular/cli":{"version":"17.0.0"}}}"#,
            );
        let actual = resource(exec, "npm", &[]).actual().unwrap();
        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].metadata["scope"], "@angular");
    }

    #[test]
    fn test_apply_installs() {
        let exec = ScriptedExecutor::new()
            .with_binary("uv")
            .on("uv tool install ruff", 0, "Installed 1 executable: ruff\n");
        let status = resource(exec, "uv", &["ruff"])
            .apply(&Item::new("uv", "ruff"))
            .unwrap();
        assert_eq!(status, OperationStatus::Installed);
    }

    #[test]
    fn test_apply_context_error_is_classified() {
        let exec = ScriptedExecutor::new()
            .with_binary("uv")
            .on_context("uv tool install ruff", ContextError::DeadlineExceeded);
        let err = resource(exec, "uv", &["ruff"])
            .apply(&Item::new("uv", "ruff"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to install uv:ruff"));
        assert!(is_context_error(&err));
    }
}
