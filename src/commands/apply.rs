use anyhow::Result;
use declarative::{
    ApplyOptions, ApplyReport, Item, OperationResult, Orchestrator, ProgressCallback,
    ReconciliationResult, Scope,
};

use super::{Environment, finish};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::resource::ContextAbort;
use crate::ui;

/// Prints each resource and item as the run reaches it
struct ApplyProgress {
    quiet: bool,
}

impl ProgressCallback for ApplyProgress {
    fn on_resource_start(&mut self, resource: &str, pending: usize) {
        if self.quiet {
            return;
        }
        if pending == 0 {
            ui::section(resource);
            ui::dim("up to date");
        } else {
            ui::section(&format!("{resource} ({})", ui::count(pending, "change")));
        }
    }

    fn on_item_start(&mut self, resource: &str, item: &Item) {
        log::debug!("{resource}: applying {}", item.name);
    }

    fn on_item_complete(&mut self, _resource: &str, result: &OperationResult) {
        if !self.quiet || result.is_failure() {
            ui::operation(result);
        }
    }

    fn on_resource_complete(&mut self, resource: &str, reconciliation: &ReconciliationResult) {
        log::debug!(
            "{resource}: {} managed, {} missing, {} untracked",
            reconciliation.managed_count(),
            reconciliation.missing_count(),
            reconciliation.untracked_count()
        );
    }
}

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let env = Environment::load()?;
    let report = execute(ctx, &env, args)?;
    finish(&report)
}

pub fn execute(ctx: &Context, env: &Environment, args: &ApplyArgs) -> Result<ApplyReport> {
    let options = ApplyOptions {
        dry_run: args.dry_run,
        scope: Scope::from_flags(args.scope.packages, args.scope.dotfiles),
    };

    if !ctx.quiet {
        if options.dry_run {
            ui::header("Apply (dry run)");
        } else {
            ui::header("Apply");
        }
    }

    let exec_ctx = env.operation_context();
    let resources = env.resources(&exec_ctx, options.scope)?;
    let orchestrator = Orchestrator::new(options).with_classifier(ContextAbort);
    let mut progress = ApplyProgress { quiet: ctx.quiet };
    let report = orchestrator.run(&resources, &mut progress);

    if report.results.is_empty() && report.aborted.is_none() && !ctx.quiet {
        println!();
        ui::success("Everything is in its desired state");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use crate::cli::ScopeArgs;
    use declarative::OperationStatus;
    use pkgkit::ContextError;
    use pkgkit::exec::testing::ScriptedExecutor;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Arc;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    fn uv_exec() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .with_binary("uv")
            .on("uv --version", 0, "uv 0.5.0\n")
            .on("uv tool list", 0, "black v24.1.0\n")
    }

    #[test]
    fn test_apply_installs_missing_and_continues_past_failures() {
        let fixture = Fixture::new("");
        let exec = Arc::new(
            uv_exec()
                .on("uv tool install httpie", 0, "Installed\n")
                .on_stderr("uv tool install nope", 2, "error: not found in registry\n")
                .on("uv tool install ruff", 0, "Installed\n"),
        );
        let mut env = fixture.env(exec.clone());
        for name in ["black", "httpie", "nope", "ruff"] {
            env.lock.add_package("uv", name, BTreeMap::new());
        }

        let args = ApplyArgs {
            scope: ScopeArgs {
                packages: true,
                dotfiles: false,
            },
            dry_run: false,
        };
        let report = execute(&ctx(), &env, &args).unwrap();

        let statuses: Vec<(String, OperationStatus)> = report
            .results
            .iter()
            .map(|r| (r.name.clone(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("httpie".to_string(), OperationStatus::Installed),
                ("nope".to_string(), OperationStatus::Failed),
                ("ruff".to_string(), OperationStatus::Installed),
            ]
        );
        let err = report.error().unwrap();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].name, "nope");
        assert!(finish(&report).is_err());
    }

    #[test]
    fn test_unavailable_manager_fails_each_locked_package() {
        let fixture = Fixture::new("");
        let mut env = fixture.env(Arc::new(ScriptedExecutor::new()));
        env.lock.add_package("gem", "rails", BTreeMap::new());
        env.lock.add_package("gem", "rake", BTreeMap::new());

        let args = ApplyArgs {
            scope: ScopeArgs {
                packages: true,
                dotfiles: false,
            },
            dry_run: false,
        };
        let report = execute(&ctx(), &env, &args).unwrap();

        let err = report.error().unwrap();
        let names: Vec<&str> = err.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["rails", "rake"]);
        assert!(err.failures.iter().all(|f| f.message.contains("gem is not available")));
    }

    #[test]
    fn test_dry_run_runs_no_mutations() {
        let fixture = Fixture::new("");
        let dotfiles = fixture.config_dir().join("dotfiles");
        fs::create_dir_all(&dotfiles).unwrap();
        fs::write(dotfiles.join("gitconfig"), "[user]\n").unwrap();

        let exec = Arc::new(uv_exec());
        let mut env = fixture.env(exec.clone());
        env.lock.add_package("uv", "ruff", BTreeMap::new());

        let args = ApplyArgs {
            dry_run: true,
            ..ApplyArgs::default()
        };
        let report = execute(&ctx(), &env, &args).unwrap();

        let keys: Vec<String> = report.results.iter().map(OperationResult::key).collect();
        assert_eq!(keys, vec!["uv:ruff", "dotfiles:.gitconfig"]);
        assert!(report.results.iter().all(|r| r.status == OperationStatus::WouldInstall));
        assert!(exec.calls().iter().all(|c| !c.contains("install")));
        assert!(!fixture.home().join(".gitconfig").exists());
    }

    #[test]
    fn test_dotfiles_only_skips_packages() {
        let fixture = Fixture::new("");
        let dotfiles = fixture.config_dir().join("dotfiles");
        fs::create_dir_all(&dotfiles).unwrap();
        fs::write(dotfiles.join("zshrc"), "bindkey -v\n").unwrap();

        let exec = Arc::new(ScriptedExecutor::new());
        let mut env = fixture.env(exec.clone());
        env.lock.add_package("apt", "curl", BTreeMap::new());

        let args = ApplyArgs {
            scope: ScopeArgs {
                packages: false,
                dotfiles: true,
            },
            dry_run: false,
        };
        let report = execute(&ctx(), &env, &args).unwrap();
        assert!(report.is_success());
        assert_eq!(report.results.len(), 1);
        assert_eq!(
            fs::read_to_string(fixture.home().join(".zshrc")).unwrap(),
            "bindkey -v\n"
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_timeout_aborts_remaining_items() {
        let fixture = Fixture::new("");
        let exec = Arc::new(
            uv_exec()
                .on_context("uv tool install httpie", ContextError::DeadlineExceeded)
                .on("uv tool install ruff", 0, "Installed\n"),
        );
        let mut env = fixture.env(exec.clone());
        env.lock.add_package("uv", "httpie", BTreeMap::new());
        env.lock.add_package("uv", "ruff", BTreeMap::new());

        let args = ApplyArgs {
            scope: ScopeArgs {
                packages: true,
                dotfiles: false,
            },
            dry_run: false,
        };
        let report = execute(&ctx(), &env, &args).unwrap();
        assert!(report.aborted.is_some());
        assert_eq!(report.results.len(), 1);
        assert_eq!(exec.call_count("uv tool install ruff"), 0);
    }
}
