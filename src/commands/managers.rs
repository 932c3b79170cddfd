use anyhow::Result;
use colored::Colorize;
use pkgkit::PackageManager;
use rayon::prelude::*;
use std::sync::Arc;

use super::Environment;
use crate::Context;
use crate::ui;

/// One row of the managers table
#[derive(Debug)]
struct Row {
    name: String,
    available: bool,
    description: String,
    locked: usize,
}

pub fn run(ctx: &Context) -> Result<()> {
    let env = Environment::load()?;
    let rows = execute(ctx, &env)?;

    ui::header("Package Managers");
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        let icon = if row.available {
            "✓".green()
        } else {
            "✗".dimmed()
        };
        let locked = if row.locked > 0 {
            format!(" ({} locked)", row.locked).cyan().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {:<width$}  {}{}",
            icon,
            row.name,
            row.description.dimmed(),
            locked
        );
    }

    let available = rows.iter().filter(|r| r.available).count();
    println!();
    ui::info(&format!("{available} of {} available", rows.len()));
    Ok(())
}

/// Probe every known manager in parallel; rows stay in name order.
fn execute(_ctx: &Context, env: &Environment) -> Result<Vec<Row>> {
    let op_ctx = env.operation_context();
    let managers: Vec<Arc<dyn PackageManager>> = env
        .registry
        .all_manager_names()
        .iter()
        .map(|name| env.registry.get_manager(name))
        .collect::<pkgkit::Result<_>>()?;

    let probes: Vec<pkgkit::Result<bool>> = managers
        .par_iter()
        .map(|manager| manager.is_available(&op_ctx))
        .collect();

    managers
        .iter()
        .zip(probes)
        .map(|(manager, available)| {
            Ok(Row {
                name: manager.name().to_string(),
                available: available?,
                description: manager.spec().description.clone(),
                locked: env.lock.packages_for(manager.name()).len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use pkgkit::exec::testing::ScriptedExecutor;
    use std::collections::BTreeMap;

    #[test]
    fn test_rows_in_name_order_with_availability() {
        let fixture = Fixture::new(
            "[managers.mise]\nbinary = \"mise\"\ndescription = \"mise tools\"\n\
             list = { command = [\"mise\", \"ls\"], parse = \"lines\" }\n",
        );
        let exec = ScriptedExecutor::new()
            .with_binary("uv")
            .on("uv --version", 0, "uv 0.5.0\n");
        let mut env = fixture.env(Arc::new(exec));
        env.lock.add_package("uv", "ruff", BTreeMap::new());

        let ctx = Context {
            verbose: 0,
            quiet: true,
        };
        let rows = execute(&ctx, &env).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["brew", "cargo", "conda", "gem", "mise", "npm", "pipx", "pnpm", "uv"]
        );

        let uv = rows.iter().find(|r| r.name == "uv").unwrap();
        assert!(uv.available);
        assert_eq!(uv.locked, 1);
        let mise = rows.iter().find(|r| r.name == "mise").unwrap();
        assert!(!mise.available);
        assert_eq!(mise.description, "mise tools");
    }
}
