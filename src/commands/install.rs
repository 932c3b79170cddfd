use anyhow::{Context as _, Result};
use declarative::{ApplyReport, OperationResult, OperationStatus};

use super::{Availability, Batch, Environment, finish};
use crate::Context;
use crate::cli::InstallArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &InstallArgs) -> Result<()> {
    let mut env = Environment::load()?;
    let report = execute(ctx, &mut env, args)?;
    finish(&report)
}

/// Install each package and lock the ones that succeed.
///
/// Every spec is resolved before anything runs. The lock is saved once at
/// the end, and only when it changed.
pub fn execute(ctx: &Context, env: &mut Environment, args: &InstallArgs) -> Result<ApplyReport> {
    let specs = env.resolve_specs(&args.packages)?;
    if !ctx.quiet {
        ui::header(if args.dry_run {
            "Install (dry run)"
        } else {
            "Install"
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

        if env.lock.has_package(&manager_name, &name) {
            batch.push(
                OperationResult::new(&manager_name, &name, OperationStatus::Skipped)
                    .already_managed(),
            );
            continue;
        }

        let metadata = manager.metadata_for(&name);
        if args.dry_run {
            batch.push(
                OperationResult::new(&manager_name, &name, OperationStatus::WouldInstall)
                    .with_metadata(metadata),
            );
            continue;
        }

        let pkg_ctx = env.package_context(&op_ctx);
        let installed = availability
            .require(manager.as_ref(), &pkg_ctx)
            .and_then(|()| {
                manager
                    .install(&pkg_ctx, &name)
                    .with_context(|| format!("Failed to install {manager_name}:{name}"))
            });
        match installed {
            Ok(()) => {
                log::info!("installed {manager_name}:{name}");
                env.lock.add_package(&manager_name, &name, metadata.clone());
                lock_changed = true;
                batch.push(
                    OperationResult::new(&manager_name, &name, OperationStatus::Installed)
                        .with_metadata(metadata),
                );
            }
            Err(e) => batch.fail(&manager_name, &name, &e),
        }
    }

    if lock_changed {
        env.save_lock()?;
    }
    Ok(batch.into_report())
}
