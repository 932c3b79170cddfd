use anyhow::{Context as _, Result};
use declarative::{ApplyReport, OperationResult, OperationStatus};

use super::{Availability, Batch, Environment, finish};
use crate::Context;
use crate::cli::UninstallArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &UninstallArgs) -> Result<()> {
    let mut env = Environment::load()?;
    let report = execute(ctx, &mut env, args)?;
    finish(&report)
}

/// Uninstall each package and drop it from the lock.
///
/// Packages that were never locked are still uninstalled.
pub fn execute(
    ctx: &Context,
    env: &mut Environment,
    args: &UninstallArgs,
) -> Result<ApplyReport> {
    let specs = env.resolve_specs(&args.packages)?;
    if !ctx.quiet {
        ui::header(if args.dry_run {
            "Uninstall (dry run)"
        } else {
            "Uninstall"
        });
    }

    let op_ctx = env.operation_context();
    let mut availability = Availability::default();
    let mut batch = Batch::new(ctx.quiet);
    let mut lock_changed = false;

    for (spec, manager_name) in specs {
        if batch.is_aborted() {
            break;
        }
        let manager = env.registry.get_manager(&manager_name)?;
        let name = spec.name;

        if args.dry_run {
            batch.push(OperationResult::new(
                &manager_name,
                &name,
                OperationStatus::WouldRemove,
            ));
            continue;
        }

        let pkg_ctx = env.package_context(&op_ctx);
        let removed = availability
            .require(manager.as_ref(), &pkg_ctx)
            .and_then(|()| {
                manager
                    .uninstall(&pkg_ctx, &name)
                    .with_context(|| format!("Failed to uninstall {manager_name}:{name}"))
            });
        match removed {
            Ok(()) => {
                log::info!("uninstalled {manager_name}:{name}");
                if env.lock.remove_package(&manager_name, &name) {
                    lock_changed = true;
                } else {
                    log::debug!("{manager_name}:{name} was not locked");
                }
                batch.push(OperationResult::new(
                    &manager_name,
                    &name,
                    OperationStatus::Removed,
                ));
            }
            Err(e) => batch.fail(&manager_name, &name, &e),
        }
    }

    if lock_changed {
        env.save_lock()?;
    }
    Ok(batch.into_report())
}
