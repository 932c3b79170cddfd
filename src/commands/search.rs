use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use pkgkit::{Context as ExecContext, PackageManager};
use rayon::prelude::*;
use std::sync::Arc;

use super::Environment;
use crate::Context;
use crate::cli::SearchArgs;
use crate::ui;

/// What one manager returned for a query
#[derive(Debug)]
enum Hits {
    Found(Vec<String>),
    Unsupported,
    Unavailable,
    Failed(String),
}

pub fn run(ctx: &Context, args: &SearchArgs) -> Result<()> {
    let env = Environment::load()?;
    let hits = execute(ctx, &env, args)?;

    ui::header(&format!("Search: {}", args.query));
    let mut total = 0;
    for (manager, hits) in &hits {
        ui::section(manager);
        match hits {
            Hits::Found(names) if names.is_empty() => ui::dim("no matches"),
            Hits::Found(names) => {
                total += names.len();
                for name in names {
                    println!("  {name}");
                }
            }
            Hits::Unsupported => ui::dim("search not supported"),
            Hits::Unavailable => ui::dim("not available on this system"),
            Hits::Failed(err) => println!("  {} {}", "✗".red(), err),
        }
    }

    println!();
    ui::info(&format!("Found {}", ui::count(total, "result")));
    Ok(())
}

/// Search one manager, or every manager that can search, in name order.
fn execute(_ctx: &Context, env: &Environment, args: &SearchArgs) -> Result<Vec<(String, Hits)>> {
    let op_ctx = env.operation_context();

    if let Some(name) = &args.manager {
        let manager = env.registry.get_manager(name)?;
        if !manager.supports_search() {
            bail!("{name} does not support search");
        }
        let names = manager
            .search(&op_ctx, &args.query)
            .with_context(|| format!("{name} search failed"))?;
        return Ok(vec![(name.clone(), Hits::Found(names))]);
    }

    let managers: Vec<Arc<dyn PackageManager>> = env
        .registry
        .all_manager_names()
        .iter()
        .map(|name| env.registry.get_manager(name))
        .collect::<pkgkit::Result<_>>()?;

    let hits: Vec<(String, Hits)> = managers
        .par_iter()
        .map(|manager| {
            let hits = search_one(manager.as_ref(), &op_ctx, &args.query);
            (manager.name().to_string(), hits)
        })
        .collect();

    op_ctx.check().context("Search stopped")?;
    Ok(hits)
}

fn search_one(manager: &dyn PackageManager, ctx: &ExecContext, query: &str) -> Hits {
    if !manager.supports_search() {
        return Hits::Unsupported;
    }
    match manager.is_available(ctx) {
        Ok(true) => {}
        Ok(false) => return Hits::Unavailable,
        Err(e) => return Hits::Failed(e.to_string()),
    }
    match manager.search(ctx, query) {
        Ok(names) => Hits::Found(names),
        Err(e) => {
            log::debug!("{} search failed: {e}", manager.name());
            Hits::Failed(e.to_string())
        }
    }
}
