use anyhow::Result;
use colored::Colorize;
use declarative::Resource;
use pkgkit::{
    Context as ExecContext, Executor, HealthCheck, HealthStatus, PackageManager, Registry,
    SystemExecutor,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Context;
use crate::config::{Config, ConfigValidator};
use crate::paths;
use crate::resource::dotfile::{DotfileResource, IgnoreSet};
use crate::state::Lock;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(_ctx: &Context) -> Result<()> {
    ui::header("Homestead Health Check");

    let issues = diagnose(
        paths::config_dir(),
        paths::home_dir(),
        Arc::new(SystemExecutor),
    );

    println!();
    if issues.is_empty() {
        ui::success("All systems healthy!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

/// Run every check, printing as it goes. Broken config or lock files are
/// reported, never fatal.
fn diagnose(
    config_dir: Result<PathBuf>,
    home: Result<PathBuf>,
    exec: Arc<dyn Executor>,
) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();

    // Check 1: Config file, its validation, and the lock
    let (config, lock) = check_configuration(config_dir.as_deref().ok(), &mut issues);
    if let Err(e) = &config_dir {
        issues.push(Issue {
            category: "Configuration",
            summary: "Could not determine config directory".into(),
            detail: Some(format!("{e:#}")),
            fix: Some(format!(
                "Ensure $HOME is set or set {}",
                paths::ENV_CONFIG_DIR
            )),
            fix_cmd: None,
        });
    }

    // Check 2: Dotfiles
    if let (Ok(config_dir), Ok(home)) = (&config_dir, &home) {
        check_dotfiles(config_dir, home, &config, &mut issues);
    }

    // Check 3: Package managers
    check_managers(&config, &lock, exec, &mut issues);

    issues
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }

    let fix_cmds: Vec<&str> = issues.iter().filter_map(|i| i.fix_cmd.as_deref()).collect();
    if !fix_cmds.is_empty() {
        ui::section("Quick Fixes");
        println!(
            "  {}",
            "Run these commands to resolve the issues above:".dimmed()
        );
        println!();
        for cmd in &fix_cmds {
            println!("    {}", cmd.bold());
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Returns the config and lock to diagnose the rest with, falling back to
/// defaults when either can't be loaded.
fn check_configuration(config_dir: Option<&Path>, issues: &mut Vec<Issue>) -> (Config, Lock) {
    ui::section("Configuration");

    let Some(config_dir) = config_dir else {
        ui::error("Could not determine config directory");
        return (Config::default(), Lock::default());
    };
    println!(
        "  {} config directory - {}",
        "✓".green(),
        config_dir.display().to_string().dimmed()
    );

    let config_path = paths::config_path(config_dir);
    let config = if !config_path.exists() {
        println!(
            "  {} {} {}",
            "○".dimmed(),
            paths::CONFIG_FILE,
            "(not configured, using defaults)".dimmed()
        );
        Config::default()
    } else {
        match Config::load(&config_path) {
            Ok(config) => {
                check_config_rules(&config, &config_path, issues);
                config
            }
            Err(e) => {
                let root_cause = format!("{:#}", e.root_cause());
                println!(
                    "  {} {} {}",
                    "✗".red(),
                    paths::CONFIG_FILE,
                    format!("(parse error: {root_cause})").red()
                );
                issues.push(Issue {
                    category: "Configuration",
                    summary: format!("{} has invalid format", paths::CONFIG_FILE),
                    detail: Some(format!("{e:#}")),
                    fix: Some(format!(
                        "Edit {} and fix the syntax error",
                        config_path.display()
                    )),
                    fix_cmd: Some(format!("$EDITOR {}", config_path.display())),
                });
                Config::default()
            }
        }
    };

    let lock_path = paths::lock_path(config_dir);
    let lock = match Lock::load(&lock_path) {
        Ok(lock) if lock_path.exists() => {
            let count = lock.all_packages().len();
            println!(
                "  {} {} - {}",
                "✓".green(),
                paths::LOCK_FILE,
                format!("{} locked", ui::count(count, "package")).dimmed()
            );
            lock
        }
        Ok(lock) => {
            println!(
                "  {} {} {}",
                "○".dimmed(),
                paths::LOCK_FILE,
                "(nothing locked yet)".dimmed()
            );
            lock
        }
        Err(e) => {
            println!(
                "  {} {} {}",
                "✗".red(),
                paths::LOCK_FILE,
                format!("(parse error: {:#})", e.root_cause()).red()
            );
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{} could not be read", paths::LOCK_FILE),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Fix or remove {}", lock_path.display())),
                fix_cmd: None,
            });
            Lock::default()
        }
    };

    (config, lock)
}

fn check_config_rules(config: &Config, config_path: &Path, issues: &mut Vec<Issue>) {
    let specs = config.resolved_managers();
    let errors = ConfigValidator::new(specs.keys().cloned().collect()).validate(config);
    if errors.is_empty() {
        println!(
            "  {} {} - {}",
            "✓".green(),
            paths::CONFIG_FILE,
            "valid".dimmed()
        );
        return;
    }

    println!(
        "  {} {} {}",
        "⚠".yellow(),
        paths::CONFIG_FILE,
        format!("({})", ui::count(errors.len(), "validation error")).yellow()
    );
    for error in errors {
        issues.push(Issue {
            category: "Configuration",
            summary: error.to_string(),
            detail: None,
            fix: Some(format!("Edit {} and fix the issue", config_path.display())),
            fix_cmd: Some(format!("$EDITOR {}", config_path.display())),
        });
    }
}

// ============================================================================
// Dotfiles
// ============================================================================

fn check_dotfiles(config_dir: &Path, home: &Path, config: &Config, issues: &mut Vec<Issue>) {
    ui::section("Dotfiles");

    let source = paths::dotfiles_dir(config_dir);
    if !source.is_dir() {
        println!(
            "  {} {} {}",
            "○".dimmed(),
            source.display(),
            "(no dotfiles directory)".dimmed()
        );
        return;
    }

    // Invalid patterns are already reported with the config
    let ignore = IgnoreSet::new(&config.ignore_patterns).unwrap_or_default();
    let resource = DotfileResource::new(source.clone(), home.to_path_buf(), ignore);
    let reconciliation = match resource.reconcile() {
        Ok(r) => r,
        Err(e) => {
            println!("  {} {}", "✗".red(), "could not read dotfiles".red());
            issues.push(Issue {
                category: "Dotfiles",
                summary: "Dotfiles could not be reconciled".into(),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Check permissions on {}", source.display())),
                fix_cmd: None,
            });
            return;
        }
    };

    println!(
        "  {} {} - {}",
        "✓".green(),
        source.display(),
        format!("{} deployed", ui::count(reconciliation.managed_count(), "file")).dimmed()
    );

    let pending: Vec<&str> = reconciliation
        .missing
        .iter()
        .chain(&reconciliation.drifted)
        .map(|item| item.name.as_str())
        .collect();
    if pending.is_empty() {
        return;
    }

    for item in &reconciliation.missing {
        println!("  {} {} {}", "✗".yellow(), item.name, "(missing)".yellow());
    }
    for item in &reconciliation.drifted {
        println!("  {} {} {}", "~".yellow(), item.name, "(drifted)".yellow());
    }
    issues.push(Issue {
        category: "Dotfiles",
        summary: format!("{} not in their desired state", ui::count(pending.len(), "dotfile")),
        detail: Some(pending.join(", ")),
        fix: Some("Deploy them".into()),
        fix_cmd: Some("homestead apply --dotfiles".into()),
    });
}

// ============================================================================
// Package Managers
// ============================================================================

fn check_managers(config: &Config, lock: &Lock, exec: Arc<dyn Executor>, issues: &mut Vec<Issue>) {
    ui::section("Package Managers");

    let registry = match Registry::new(&config.resolved_managers(), exec.clone()) {
        Ok(registry) => registry,
        Err(e) => {
            issues.push(Issue {
                category: "Package Managers",
                summary: "Configured managers could not be set up".into(),
                detail: Some(e.to_string()),
                fix: Some("Fix the [managers] section of the config".into()),
                fix_cmd: None,
            });
            match Registry::with_defaults(exec) {
                Ok(registry) => registry,
                Err(e) => {
                    ui::error(&format!("Built-in managers failed to load: {e}"));
                    return;
                }
            }
        }
    };

    for name in lock.managers() {
        if !registry.has_manager(&name) {
            println!("  {} {} {}", "✗".red(), name, "(unknown manager in lock)".red());
            issues.push(Issue {
                category: "Package Managers",
                summary: format!("Lock file references unknown manager '{name}'"),
                detail: Some(ui::count(lock.packages_for(&name).len(), "locked package")),
                fix: Some(format!(
                    "Define [managers.{name}] in {} or uninstall its packages",
                    paths::CONFIG_FILE
                )),
                fix_cmd: None,
            });
        }
    }

    let ctx = ExecContext::background().with_timeout(config.operation_timeout());
    let managers: Vec<Arc<dyn PackageManager>> = registry
        .all_manager_names()
        .iter()
        .filter_map(|name| registry.get_manager(name).ok())
        .collect();

    // Probed in parallel, reported in name order
    let checks: Vec<(String, pkgkit::Result<HealthCheck>)> = managers
        .par_iter()
        .map(|manager| (manager.name().to_string(), manager.health(&ctx)))
        .collect();

    for (name, check) in checks {
        let locked = lock.packages_for(&name).len();
        report_manager(&name, locked, check, issues);
    }
}

fn report_manager(
    name: &str,
    locked: usize,
    check: pkgkit::Result<HealthCheck>,
    issues: &mut Vec<Issue>,
) {
    let check = match check {
        Ok(check) => check,
        Err(e) => {
            println!("  {} {} - {}", "✗".red(), name, e.to_string().red());
            issues.push(Issue {
                category: "Package Managers",
                summary: format!("{name} health check failed"),
                detail: Some(e.to_string()),
                fix: None,
                fix_cmd: None,
            });
            return;
        }
    };

    let in_use = if locked > 0 {
        format!(" ({} locked)", ui::count(locked, "package"))
    } else {
        String::new()
    };
    match check.status {
        HealthStatus::Pass => {
            println!(
                "  {} {} - {}{}",
                "✓".green(),
                name,
                check.message.dimmed(),
                in_use.dimmed()
            );
        }
        HealthStatus::Info => {
            println!("  {} {} - {}{}", "ℹ".blue(), name, check.message, in_use.dimmed());
        }
        // A missing manager nothing depends on is not a problem
        HealthStatus::Warn if locked == 0 => {
            println!(
                "  {} {} {}",
                "○".dimmed(),
                name,
                format!("({})", check.message).dimmed()
            );
        }
        HealthStatus::Warn | HealthStatus::Fail => {
            let icon = if check.status == HealthStatus::Fail {
                "✗".red()
            } else {
                "⚠".yellow()
            };
            println!("  {} {} - {}{}", icon, name, check.message, in_use.yellow());
            let mut detail = check.issues.clone();
            detail.extend(check.details.iter().cloned());
            issues.push(Issue {
                category: "Package Managers",
                summary: format!("{}{in_use}", check.message),
                detail: (!detail.is_empty()).then(|| detail.join("\n")),
                fix: (!check.suggestions.is_empty()).then(|| check.suggestions.join("; ")),
                fix_cmd: None,
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;
    use pkgkit::exec::testing::ScriptedExecutor;
    use std::collections::BTreeMap;
    use std::fs;

    fn diagnose_fixture(fixture: &Fixture, exec: ScriptedExecutor) -> Vec<Issue> {
        diagnose(Ok(fixture.config_dir()), Ok(fixture.home()), Arc::new(exec))
    }

    fn lock_with(fixture: &Fixture, packages: &[(&str, &str)]) {
        let mut lock = Lock::default();
        for (manager, name) in packages {
            lock.add_package(manager, name, BTreeMap::new());
        }
        lock.save(&paths::lock_path(&fixture.config_dir())).unwrap();
    }

    #[test]
    fn test_healthy_setup_has_no_issues() {
        let fixture = Fixture::new("");
        lock_with(&fixture, &[("pipx", "black")]);
        let exec = ScriptedExecutor::new()
            .with_binary("pipx")
            .on("pipx --version", 0, "1.4.3\n");

        let issues = diagnose_fixture(&fixture, exec);
        let summaries: Vec<&str> = issues.iter().map(|i| i.summary.as_str()).collect();
        assert!(issues.is_empty(), "unexpected issues: {summaries:?}");
    }

    #[test]
    fn test_unparseable_config_is_reported() {
        let fixture = Fixture::new("default_manager = [\n");
        let issues = diagnose_fixture(&fixture, ScriptedExecutor::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, "Configuration");
        assert!(issues[0].summary.contains("invalid format"));
    }

    #[test]
    fn test_validation_errors_are_listed() {
        let fixture = Fixture::new("default_manager = \"apt\"\npackage_timeout = 0\n");
        let issues = diagnose_fixture(&fixture, ScriptedExecutor::new());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.fix_cmd.is_some()));
    }

    #[test]
    fn test_unavailable_manager_matters_only_when_locked() {
        let fixture = Fixture::new("");
        lock_with(&fixture, &[("gem", "rails"), ("snap", "hello")]);

        let issues = diagnose_fixture(&fixture, ScriptedExecutor::new());
        let summaries: Vec<&str> = issues.iter().map(|i| i.summary.as_str()).collect();
        assert_eq!(issues.len(), 2, "{summaries:?}");
        assert!(summaries[0].contains("unknown manager 'snap'"));
        assert!(summaries[1].starts_with("gem is not available"));
        assert_eq!(issues[1].category, "Package Managers");
    }

    #[test]
    fn test_undeployed_dotfiles_are_reported() {
        let fixture = Fixture::new("");
        let source = fixture.config_dir().join("dotfiles");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("zshrc"), "export EDITOR=nvim\n").unwrap();
        fs::write(source.join("vimrc"), "set nu\n").unwrap();
        fs::write(fixture.home().join(".vimrc"), "set nu\n").unwrap();

        let issues = diagnose_fixture(&fixture, ScriptedExecutor::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, "Dotfiles");
        assert_eq!(issues[0].detail.as_deref(), Some(".zshrc"));
        assert_eq!(issues[0].fix_cmd.as_deref(), Some("homestead apply --dotfiles"));
    }
}
