use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{
    ApplyOptions, ItemState, Orchestrator, ReconciliationResult, Scope, Summary,
};
use serde::Serialize;

use super::Environment;
use crate::Context;
use crate::cli::StatusArgs;
use crate::ui;

/// A resource that could not be reconciled
#[derive(Debug, Serialize)]
struct Unreachable {
    resource: String,
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct StatusReport {
    results: Vec<ReconciliationResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unreachable: Vec<Unreachable>,
    summary: Summary,
}

pub fn run(ctx: &Context, args: &StatusArgs) -> Result<()> {
    let env = Environment::load()?;
    execute(ctx, &env, args)
}

pub fn execute(ctx: &Context, env: &Environment, args: &StatusArgs) -> Result<()> {
    let scope = Scope::from_flags(args.scope.packages, args.scope.dotfiles);
    let report = collect(env, scope)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{json}");
        return Ok(());
    }

    ui::header("Homestead Status");

    if report.results.is_empty() && report.unreachable.is_empty() {
        println!();
        ui::info("Nothing is managed yet. Add packages with `homestead install <manager:name>`.");
        return Ok(());
    }

    for result in &report.results {
        print_result(result, args, ctx.verbose > 0);
    }
    for entry in &report.unreachable {
        ui::section(&entry.resource);
        println!("  {} {}", "✗".red(), entry.error);
    }

    let summary = &report.summary;
    ui::header("Summary");
    ui::kv("Managed", &summary.managed.to_string());
    ui::kv("Missing", &summary.missing.to_string());
    ui::kv("Untracked", &summary.untracked.to_string());
    if summary.drifted > 0 {
        ui::kv("Drifted", &summary.drifted.to_string());
    }
    if !report.unreachable.is_empty() {
        ui::kv("Unreachable", &report.unreachable.len().to_string());
    }

    println!();
    if summary.missing == 0 && summary.drifted == 0 && report.unreachable.is_empty() {
        ui::success("Everything is in its desired state");
    } else if summary.missing > 0 || summary.drifted > 0 {
        ui::info("Run `homestead apply` to converge");
    }

    Ok(())
}

/// Reconcile every in-scope resource, recording the ones that fail instead of
/// stopping.
fn collect(env: &Environment, scope: Scope) -> Result<StatusReport> {
    let exec_ctx = env.operation_context();
    let resources = env.resources(&exec_ctx, scope)?;

    let planner = Orchestrator::new(ApplyOptions {
        dry_run: true,
        scope,
    });

    let mut report = StatusReport::default();
    for (resource, outcome) in planner.plan(&resources) {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(e) => {
                log::debug!("reconciling {resource} failed: {e:#}");
                report.unreachable.push(Unreachable {
                    resource,
                    error: format!("{e:#}"),
                });
            }
        }
    }
    report.summary = Summary::from_results(&report.results);
    Ok(report)
}

fn print_result(result: &ReconciliationResult, args: &StatusArgs, show_metadata: bool) {
    let title = format!(
        "{} {}",
        result.resource,
        format!(
            "({} managed, {} missing, {} untracked)",
            result.managed_count(),
            result.missing_count(),
            result.untracked_count()
        )
        .dimmed()
    );
    ui::section(&title);

    let mut shown = 0;
    for (state, item) in result.items() {
        let visible = match state {
            ItemState::Missing => !args.untracked,
            ItemState::Untracked => !args.missing,
            ItemState::Managed | ItemState::Drifted => !args.missing && !args.untracked,
        };
        if !visible {
            continue;
        }
        shown += 1;
        let line = match state {
            ItemState::Managed => format!("{} {}", "✓".green(), item.name),
            ItemState::Drifted => format!("{} {} {}", "~".yellow(), item.name, "(drifted)".yellow()),
            ItemState::Missing => format!("{} {} {}", "✗".red(), item.name, "(missing)".red()),
            ItemState::Untracked => {
                format!("{} {} {}", "?".dimmed(), item.name, "(untracked)".dimmed())
            }
        };
        println!("  {line}");
        if show_metadata {
            for (key, value) in &item.metadata {
                ui::dim(&format!("    {key}: {value}"));
            }
        }
    }
    if shown == 0 {
        ui::dim("nothing to show");
    }
}
