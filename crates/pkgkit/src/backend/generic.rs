//! Adapter driven entirely by a [`ManagerSpec`].

use crate::backend::{HEALTH_CATEGORY, PackageManager};
use crate::error::{Error, Result};
use crate::exec::{CommandOutput, Context, Executor, render_command};
use crate::parse::{ListParser, parse_lines};
use crate::spec::{CommandSpec, ManagerSpec};
use crate::types::{HealthCheck, HealthStatus, PackageInfo};
use std::sync::Arc;

/// Package manager built from data alone.
///
/// Construction compiles the list parser, so a malformed specification is
/// rejected before any process runs.
pub struct GenericManager {
    name: String,
    spec: ManagerSpec,
    parser: ListParser,
    exec: Arc<dyn Executor>,
}

impl GenericManager {
    pub fn new(name: impl Into<String>, spec: ManagerSpec, exec: Arc<dyn Executor>) -> Result<Self> {
        let parser = ListParser::new(&spec.list, spec.name_transform.as_ref())?;
        Ok(Self {
            name: name.into(),
            spec,
            parser,
            exec,
        })
    }

    /// Run a fully rendered argv.
    pub(crate) fn run_argv(&self, ctx: &Context, argv: &[String]) -> Result<CommandOutput> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::InvalidConfig(format!(
                "{}: empty command",
                self.name
            )));
        };
        self.exec.run(ctx, program, args)
    }

    /// Run `argv` and fail on a non-zero exit.
    pub(crate) fn run_checked(&self, ctx: &Context, argv: &[String]) -> Result<CommandOutput> {
        let output = self.run_argv(ctx, argv)?;
        if output.success() {
            Ok(output)
        } else {
            Err(command_failed(argv, &output))
        }
    }

    /// Parse raw list output with the configured strategy.
    pub(crate) fn parse_list(&self, raw: &[u8]) -> Result<Vec<String>> {
        self.parser.parse(raw)
    }

    /// Run a mutating template, converting idempotent failures into success.
    fn run_mutation(
        &self,
        ctx: &Context,
        capability: &str,
        template: &CommandSpec,
        package: Option<&str>,
    ) -> Result<()> {
        if template.is_empty() {
            return Err(Error::unsupported(&self.name, capability));
        }
        let argv = match package {
            Some(pkg) => template.render(pkg),
            None => template.command.clone(),
        };

        let output = self.run_argv(ctx, &argv)?;
        if output.success() {
            return Ok(());
        }

        let combined = output.combined();
        if template.is_idempotent(&combined) {
            log::info!(
                "{}: {capability} {} already satisfied",
                self.name,
                package.unwrap_or("(all)")
            );
            return Ok(());
        }
        Err(command_failed(&argv, &output))
    }
}

pub(crate) fn command_failed(argv: &[String], output: &CommandOutput) -> Error {
    let (program, args) = argv.split_first().map_or(("", &[][..]), |(p, a)| (p.as_str(), a));
    Error::CommandFailed {
        command: render_command(program, args),
        code: output.code,
        output: output.combined().trim().to_string(),
    }
}

impl PackageManager for GenericManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec(&self) -> &ManagerSpec {
        &self.spec
    }

    fn is_available(&self, ctx: &Context) -> Result<bool> {
        if self.spec.binary.is_empty() || self.exec.look_path(&self.spec.binary).is_none() {
            log::debug!("{}: {:?} not found on PATH", self.name, self.spec.binary);
            return Ok(false);
        }

        match self.run_argv(ctx, &self.spec.available_command()) {
            Ok(output) if output.success() => Ok(true),
            Ok(output) => {
                log::debug!(
                    "{}: verification probe exited with {:?}",
                    self.name,
                    output.code
                );
                Ok(false)
            }
            Err(e) if e.is_context() => Err(e),
            Err(e) => {
                log::debug!("{}: verification probe failed: {e}", self.name);
                Ok(false)
            }
        }
    }

    fn list_installed(&self, ctx: &Context) -> Result<Vec<String>> {
        if self.spec.list.command.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.run_checked(ctx, &self.spec.list.command)?;
        self.parse_list(&output.stdout)
    }

    fn normalize_name(&self, name: &str) -> String {
        self.parser.normalize_name(name)
    }

    fn install(&self, ctx: &Context, name: &str) -> Result<()> {
        self.run_mutation(ctx, "install", &self.spec.install, Some(name))
    }

    fn uninstall(&self, ctx: &Context, name: &str) -> Result<()> {
        self.run_mutation(ctx, "uninstall", &self.spec.uninstall, Some(name))
    }

    fn upgrade(&self, ctx: &Context, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return self.upgrade_all(ctx);
        }
        for name in names {
            self.run_mutation(ctx, "upgrade", &self.spec.upgrade, Some(name))?;
        }
        Ok(())
    }

    fn upgrade_all(&self, ctx: &Context) -> Result<()> {
        self.run_mutation(ctx, "upgrade_all", &self.spec.upgrade_all, None)
    }

    fn info(&self, ctx: &Context, name: &str) -> Result<PackageInfo> {
        let mut info = PackageInfo::new(name, &self.name);
        info.installed = match self.is_installed(ctx, name) {
            Ok(installed) => installed,
            Err(e) if e.is_context() => return Err(e),
            Err(e) => {
                log::debug!("{}: could not determine install state: {e}", self.name);
                false
            }
        };

        if self.spec.info.is_empty() {
            return Ok(info);
        }

        let output = self.run_argv(ctx, &self.spec.info.render(name))?;
        if !output.success() {
            if info.installed {
                return Ok(info);
            }
            return Err(Error::NotFound(format!("{}:{name}", self.name)));
        }
        info.description = output
            .stdout_str()
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);
        Ok(info)
    }

    fn search(&self, ctx: &Context, query: &str) -> Result<Vec<String>> {
        if !self.supports_search() {
            return Err(Error::unsupported(&self.name, "search"));
        }
        let argv = self.spec.search.render(query);
        let output = self.run_argv(ctx, &argv)?;
        if !output.success() {
            // Most tools exit non-zero when nothing matched
            if output.stdout.iter().all(u8::is_ascii_whitespace) {
                return Ok(Vec::new());
            }
            return Err(command_failed(&argv, &output));
        }
        Ok(parse_lines(&output.stdout_str()))
    }

    fn health(&self, ctx: &Context) -> Result<HealthCheck> {
        let title = format!("{} manager", self.name);
        let located = self.exec.look_path(&self.spec.binary);

        if self.is_available(ctx)? {
            let mut check = HealthCheck::new(
                title,
                HEALTH_CATEGORY,
                HealthStatus::Pass,
                format!("{} is available", self.name),
            );
            if let Some(path) = located {
                check = check.detail(format!("binary: {}", path.display()));
            }
            if !self.spec.description.is_empty() {
                check = check.detail(self.spec.description.clone());
            }
            return Ok(check);
        }

        let (message, issue) = match located {
            Some(path) => (
                format!("{} is installed but not functional", self.name),
                format!(
                    "{} failed its verification probe",
                    path.display()
                ),
            ),
            None => (
                format!("{} is not available", self.name),
                format!("{} not found on PATH", self.spec.binary),
            ),
        };
        let mut check = HealthCheck::new(title, HEALTH_CATEGORY, HealthStatus::Warn, message)
            .issue(issue)
            .suggestion(self.spec.install_hint.clone());
        if !self.spec.help_url.is_empty() {
            check = check.suggestion(format!("See {}", self.spec.help_url));
        }
        Ok(check)
    }
}
