//! Command implementations
//!
//! Every command loads an [`Environment`] (config, lock, registry) and works
//! through the `pkgkit` and `declarative` crates; only this layer prints.

pub mod apply;
pub mod doctor;
pub mod info;
pub mod install;
pub mod managers;
pub mod search;
pub mod status;
pub mod uninstall;
pub mod upgrade;

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use declarative::{ApplyReport, BoxedResource, OperationResult, ResourceKind, Scope};
use pkgkit::{
    Context as ExecContext, Executor, PackageManager, PackageSpec, Registry, SystemExecutor,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ConfigValidator, validate_package_name};
use crate::paths;
use crate::resource::dotfile::{DotfileResource, IgnoreSet};
use crate::resource::{is_context_error, package_resources};
use crate::state::Lock;
use crate::ui;

// ============================================================================
// Environment
// ============================================================================

/// Everything a command needs: validated config, lock, and registry
pub struct Environment {
    pub config_dir: PathBuf,
    pub home: PathBuf,
    pub config: Config,
    pub lock: Lock,
    pub registry: Registry,
}

impl Environment {
    /// Load from the resolved config directory, running real commands
    pub fn load() -> Result<Self> {
        Self::load_from(
            paths::config_dir()?,
            paths::home_dir()?,
            Arc::new(SystemExecutor),
        )
    }

    /// Load from `config_dir`, validating the config before any command runs
    pub fn load_from(config_dir: PathBuf, home: PathBuf, exec: Arc<dyn Executor>) -> Result<Self> {
        let config = Config::load(&paths::config_path(&config_dir))?;
        let specs = config.resolved_managers();
        ConfigValidator::new(specs.keys().cloned().collect()).check(&config)?;
        let registry =
            Registry::new(&specs, exec).context("Failed to set up package managers")?;
        let lock = Lock::load(&paths::lock_path(&config_dir))?;

        Ok(Self {
            config_dir,
            home,
            config,
            lock,
            registry,
        })
    }

    pub fn save_lock(&mut self) -> Result<()> {
        self.lock.save(&paths::lock_path(&self.config_dir))
    }

    /// Context bounding a whole command
    pub fn operation_context(&self) -> ExecContext {
        ExecContext::background().with_timeout(self.config.operation_timeout())
    }

    /// Context for one package operation inside `parent`
    pub fn package_context(&self, parent: &ExecContext) -> ExecContext {
        parent.with_timeout(self.config.package_timeout())
    }

    pub fn dotfile_resource(&self) -> Result<DotfileResource> {
        let ignore = IgnoreSet::new(&self.config.ignore_patterns)?;
        Ok(DotfileResource::new(
            paths::dotfiles_dir(&self.config_dir),
            self.home.clone(),
            ignore,
        ))
    }

    /// Package resources (sorted by manager) followed by dotfiles
    pub fn resources(&self, ctx: &ExecContext, scope: Scope) -> Result<Vec<BoxedResource>> {
        let mut resources = Vec::new();
        if scope.includes(ResourceKind::Package) {
            resources.extend(package_resources(
                &self.registry,
                &self.lock,
                ctx,
                self.config.package_timeout(),
            )?);
        }
        if scope.includes(ResourceKind::Dotfile) {
            resources.push(Box::new(self.dotfile_resource()?) as BoxedResource);
        }
        Ok(resources)
    }

    /// Parse `[manager:]name` and resolve its manager
    pub fn resolve_spec(&self, input: &str) -> Result<(PackageSpec, String)> {
        let spec = PackageSpec::parse(input)?;
        validate_package_name(&spec.name)?;
        let manager = spec.require_manager(
            self.config.default_manager.as_deref(),
            &self.registry.valid_names(),
        )?;
        Ok((spec, manager))
    }

    /// Resolve every input up front so a typo fails before anything runs
    pub fn resolve_specs(&self, inputs: &[String]) -> Result<Vec<(PackageSpec, String)>> {
        inputs.iter().map(|input| self.resolve_spec(input)).collect()
    }
}

// ============================================================================
// Package batches
// ============================================================================

/// Availability probes, run at most once per manager per command
#[derive(Default)]
pub struct Availability {
    probed: BTreeMap<String, bool>,
}

impl Availability {
    /// Fail when `manager` can't run on this system
    pub fn require(&mut self, manager: &dyn PackageManager, ctx: &ExecContext) -> Result<()> {
        let available = match self.probed.get(manager.name()) {
            Some(&available) => available,
            None => {
                let available = manager.is_available(ctx)?;
                self.probed.insert(manager.name().to_string(), available);
                available
            }
        };
        if available {
            return Ok(());
        }
        let hint = &manager.spec().install_hint;
        if hint.is_empty() {
            bail!("{} is not available on this system", manager.name());
        }
        bail!("{} is not available on this system ({hint})", manager.name())
    }
}

/// Results of a command working through packages one at a time
///
/// A failure is recorded and the batch moves on, except a cancelled or
/// timed-out context, which stops it.
pub struct Batch {
    report: ApplyReport,
    quiet: bool,
}

impl Batch {
    pub fn new(quiet: bool) -> Self {
        Self {
            report: ApplyReport::default(),
            quiet,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.report.aborted.is_some()
    }

    pub fn push(&mut self, result: OperationResult) {
        if !self.quiet || result.is_failure() {
            ui::operation(&result);
        }
        self.report.results.push(result);
    }

    pub fn fail(&mut self, manager: &str, name: &str, err: &anyhow::Error) {
        log::debug!("{manager}:{name} failed: {err:#}");
        if is_context_error(err) {
            self.report.aborted = Some(format!("{err:#}"));
        }
        self.push(OperationResult::failed(manager, name, format!("{err:#}")));
    }

    pub fn into_report(self) -> ApplyReport {
        self.report
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Print a results summary; fail if any result failed or the run was cut short.
pub fn finish(report: &ApplyReport) -> Result<()> {
    print_summary(report);
    conclude(report)
}

pub fn print_summary(report: &ApplyReport) {
    let summary = report.summary();
    if summary.total() == 0 {
        return;
    }

    let mut parts = Vec::new();
    for (n, label) in [
        (summary.installed, "installed"),
        (summary.updated, "updated"),
        (summary.removed, "removed"),
        (summary.upgraded, "upgraded"),
        (summary.planned, "planned"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ] {
        if n > 0 {
            parts.push(format!("{n} {label}"));
        }
    }

    println!();
    if summary.is_success() {
        ui::success(&parts.join(", "));
    } else {
        ui::warn(&parts.join(", "));
    }
}

/// Enumerate failures and turn them into the command's error
pub fn conclude(report: &ApplyReport) -> Result<()> {
    if let Some(reason) = &report.aborted {
        ui::error(&format!("Stopped early: {reason}"));
    }
    match report.error() {
        Some(err) => {
            ui::section("Failures");
            for failure in &err.failures {
                println!("  {} {}:{}", "✗".red(), failure.manager, failure.name);
                for line in failure.message.lines() {
                    ui::dim(&format!("    {line}"));
                }
            }
            Err(err.into())
        }
        None if report.aborted.is_some() => bail!("Run stopped before completing"),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;
    use declarative::OperationStatus;
    use pkgkit::exec::testing::ScriptedExecutor;

    #[test]
    fn test_invalid_config_fails_before_commands() {
        let fixture = Fixture::new("default_manager = \"apt\"\n");
        let exec = Arc::new(ScriptedExecutor::new());
        let result = Environment::load_from(fixture.config_dir(), fixture.home(), exec.clone());
        let err = match result {
            Ok(_) => panic!("expected a validation error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_resolve_spec_uses_default_manager() {
        let fixture = Fixture::new("default_manager = \"brew\"\n");
        let env = fixture.env(Arc::new(ScriptedExecutor::new()));

        let (spec, manager) = env.resolve_spec("ripgrep").unwrap();
        assert_eq!((spec.name.as_str(), manager.as_str()), ("ripgrep", "brew"));

        let (_, manager) = env.resolve_spec("npm:@angular/cli").unwrap();
        assert_eq!(manager, "npm");

        assert!(env.resolve_spec("apt:curl").is_err());
        assert!(env.resolve_spec("brew:-bad").is_err());
    }

    #[test]
    fn test_resolve_spec_without_default_manager() {
        let fixture = Fixture::new("");
        let env = fixture.env(Arc::new(ScriptedExecutor::new()));
        assert!(env.resolve_specs(&["brew:git".into(), "git".into()]).is_err());
    }

    #[test]
    fn test_resources_follow_scope() {
        let fixture = Fixture::new("");
        let mut env = fixture.env(Arc::new(ScriptedExecutor::new()));
        env.lock.add_package("brew", "git", Default::default());
        let ctx = ExecContext::background();

        let ids = |scope| -> Vec<String> {
            env.resources(&ctx, scope)
                .unwrap()
                .iter()
                .map(|r| r.id())
                .collect()
        };
        assert_eq!(ids(Scope::All), vec!["brew", "dotfiles"]);
        assert_eq!(ids(Scope::PackagesOnly), vec!["brew"]);
        assert_eq!(ids(Scope::DotfilesOnly), vec!["dotfiles"]);
    }

    #[test]
    fn test_availability_probes_once() {
        let fixture = Fixture::new("");
        let exec = Arc::new(
            ScriptedExecutor::new()
                .with_binary("pipx")
                .on("pipx --version", 0, "1.4.3\n"),
        );
        let env = fixture.env(exec.clone());
        let ctx = ExecContext::background();
        let mut availability = Availability::default();

        let pipx = env.registry.get_manager("pipx").unwrap();
        availability.require(pipx.as_ref(), &ctx).unwrap();
        availability.require(pipx.as_ref(), &ctx).unwrap();
        assert_eq!(exec.call_count("pipx --version"), 1);

        let gem = env.registry.get_manager("gem").unwrap();
        let err = availability.require(gem.as_ref(), &ctx).unwrap_err();
        assert!(err.to_string().starts_with("gem is not available on this system"));
    }

    #[test]
    fn test_batch_stops_on_context_error() {
        let mut batch = Batch::new(true);
        batch.fail("brew", "git", &anyhow::anyhow!("exit status 1"));
        assert!(!batch.is_aborted());

        let err = anyhow::Error::new(pkgkit::Error::Context(pkgkit::ContextError::DeadlineExceeded))
            .context("Failed to install brew:jq");
        batch.fail("brew", "jq", &err);
        assert!(batch.is_aborted());
        assert_eq!(batch.into_report().results.len(), 2);
    }

    #[test]
    fn test_finish_reports_failures() {
        let results = vec![
            OperationResult::new("brew", "git", OperationStatus::Installed),
            OperationResult::failed("brew", "nope", "No available formula"),
        ];
        let report = ApplyReport {
            results,
            ..ApplyReport::default()
        };
        let err = finish(&report).unwrap_err();
        assert!(err.to_string().contains("1 operation(s) failed"));
        assert!(err.to_string().contains("brew:nope"));

        assert!(finish(&ApplyReport::default()).is_ok());
        let aborted = ApplyReport {
            aborted: Some("deadline exceeded".into()),
            ..ApplyReport::default()
        };
        assert!(finish(&aborted).is_err());
    }
}
