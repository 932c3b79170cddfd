use anyhow::{Context as _, Result, bail};
use declarative::{ApplyReport, OperationResult, OperationStatus};
use std::collections::BTreeMap;

use super::{Availability, Batch, Environment, finish};
use crate::Context;
use crate::cli::UpgradeArgs;
use crate::ui;

/// Result name used when a manager upgrades everything at once
const ALL_PACKAGES: &str = "*";

pub fn run(ctx: &Context, args: &UpgradeArgs) -> Result<()> {
    let env = Environment::load()?;
    let report = execute(ctx, &env, args)?;
    finish(&report)
}

/// Package names to upgrade, grouped by manager.
///
/// - no arguments: every locked package
/// - `manager:`: that manager's locked packages
/// - `[manager:]name`: that package, locked or not
fn targets(env: &Environment, inputs: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut targets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut add = |manager: &str, name: &str| {
        let names = targets.entry(manager.to_string()).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    if inputs.is_empty() {
        for manager in env.lock.managers() {
            for name in env.lock.packages_for(&manager) {
                add(&manager, name);
            }
        }
        return Ok(targets);
    }

    for input in inputs {
        if let Some(manager) = input.strip_suffix(':').filter(|m| !m.contains(':')) {
            if !env.registry.has_manager(manager) {
                bail!(
                    "Unknown manager '{manager}' (known: {})",
                    env.registry.all_manager_names().join(", ")
                );
            }
            let locked = env.lock.packages_for(manager);
            if locked.is_empty() {
                log::info!("{manager} has no locked packages");
            }
            for name in locked {
                add(manager, name);
            }
            continue;
        }
        let (spec, manager) = env.resolve_spec(input)?;
        add(&manager, &spec.name);
    }
    Ok(targets)
}

pub fn execute(ctx: &Context, env: &Environment, args: &UpgradeArgs) -> Result<ApplyReport> {
    let targets = targets(env, &args.packages)?;
    if !ctx.quiet {
        ui::header(if args.dry_run {
            "Upgrade (dry run)"
        } else {
            "Upgrade"
        });
    }
    if targets.is_empty() {
        if !ctx.quiet {
            ui::info("No locked packages to upgrade");
        }
        return Ok(ApplyReport::default());
    }

    let op_ctx = env.operation_context();
    let mut availability = Availability::default();
    let mut batch = Batch::new(ctx.quiet);

    for (manager_name, names) in &targets {
        if batch.is_aborted() {
            break;
        }
        let manager = env.registry.get_manager(manager_name)?;

        if args.all {
            if args.dry_run {
                batch.push(OperationResult::new(
                    manager_name,
                    ALL_PACKAGES,
                    OperationStatus::WouldUpgrade,
                ));
                continue;
            }
            let pkg_ctx = env.package_context(&op_ctx);
            let upgraded = availability
                .require(manager.as_ref(), &pkg_ctx)
                .and_then(|()| {
                    manager
                        .upgrade(&pkg_ctx, &[])
                        .with_context(|| format!("Failed to upgrade all {manager_name} packages"))
                });
            match upgraded {
                Ok(()) => batch.push(OperationResult::new(
                    manager_name,
                    ALL_PACKAGES,
                    OperationStatus::Upgraded,
                )),
                Err(e) => batch.fail(manager_name, ALL_PACKAGES, &e),
            }
            continue;
        }

        for name in names {
            if batch.is_aborted() {
                break;
            }
            let metadata = env
                .lock
                .metadata_for(manager_name, name)
                .cloned()
                .unwrap_or_else(|| manager.metadata_for(name));
            if args.dry_run {
                batch.push(
                    OperationResult::new(manager_name, name, OperationStatus::WouldUpgrade)
                        .with_metadata(metadata),
                );
                continue;
            }

            let target = manager.upgrade_target(name, &metadata);
            log::debug!("{manager_name}: upgrading {name} as {target}");
            let pkg_ctx = env.package_context(&op_ctx);
            let upgraded = availability
                .require(manager.as_ref(), &pkg_ctx)
                .and_then(|()| {
                    manager
                        .upgrade(&pkg_ctx, &[target])
                        .with_context(|| format!("Failed to upgrade {manager_name}:{name}"))
                });
            match upgraded {
                Ok(()) => batch.push(
                    OperationResult::new(manager_name, name, OperationStatus::Upgraded)
                        .with_metadata(metadata),
                ),
                Err(e) => batch.fail(manager_name, name, &e),
            }
        }
    }

    Ok(batch.into_report())
}
