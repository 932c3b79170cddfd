use anyhow::{Context as _, Result};
use colored::Colorize;
use pkgkit::PackageInfo;

use super::Environment;
use crate::Context;
use crate::cli::InfoArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &InfoArgs) -> Result<()> {
    let env = Environment::load()?;
    let (info, locked) = execute(ctx, &env, args)?;
    print_info(&info, locked);
    Ok(())
}

/// Look up a package; the bool reports whether it is locked.
pub fn execute(_ctx: &Context, env: &Environment, args: &InfoArgs) -> Result<(PackageInfo, bool)> {
    let (spec, manager_name) = env.resolve_spec(&args.package)?;
    let manager = env.registry.get_manager(&manager_name)?;
    let info = manager
        .info(&env.operation_context(), &spec.name)
        .with_context(|| format!("Failed to get info for {manager_name}:{}", spec.name))?;
    let locked = env.lock.has_package(&manager_name, &spec.name);
    Ok((info, locked))
}

fn print_info(info: &PackageInfo, locked: bool) {
    ui::header(&info.name);
    ui::kv("Manager", &info.manager);
    if let Some(version) = &info.version {
        ui::kv("Version", version);
    }
    if let Some(description) = &info.description {
        ui::kv("Description", description);
    }
    if let Some(homepage) = &info.homepage {
        ui::kv("Homepage", homepage);
    }
    if !info.dependencies.is_empty() {
        ui::kv("Dependencies", &info.dependencies.join(", "));
    }

    let yes_no = |b: bool| if b { "yes".green() } else { "no".dimmed() };
    ui::kv("Installed", &yes_no(info.installed).to_string());
    ui::kv("Locked", &yes_no(locked).to_string());
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use pkgkit::exec::testing::ScriptedExecutor;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_info_from_brew_json() {
        let fixture = Fixture::new("");
        let exec = ScriptedExecutor::new().on(
            "brew info --json=v2 jq",
            0,
            r#"{"formulae": [{
                "name": "jq",
                "desc": "Lightweight and flexible command-line JSON processor",
                "homepage": "https://jqlang.github.io/jq/",
                "versions": {"stable": "1.7.1"},
                "dependencies": ["oniguruma"],
                "installed": [{"version": "1.7.1"}]
            }], "casks": []}"#,
        );
        let mut env = fixture.env(Arc::new(exec));
        env.lock.add_package("brew", "jq", BTreeMap::new());

        let args = InfoArgs {
            package: "brew:jq".into(),
        };
        let (info, locked) = execute(&ctx(), &env, &args).unwrap();
        assert_eq!(info.version.as_deref(), Some("1.7.1"));
        assert_eq!(info.dependencies, vec!["oniguruma"]);
        assert!(info.installed);
        assert!(locked);
    }

    #[test]
    fn test_info_without_template_is_best_effort() {
        let fixture = Fixture::new("");
        let exec = ScriptedExecutor::new().on("pipx list --short", 0, "black 24.1.0\n");
        let env = fixture.env(Arc::new(exec));

        let args = InfoArgs {
            package: "pipx:black".into(),
        };
        let (info, locked) = execute(&ctx(), &env, &args).unwrap();
        assert_eq!(info.name, "black");
        assert!(info.installed);
        assert!(info.description.is_none());
        assert!(!locked);
    }

    #[test]
    fn test_info_unknown_package() {
        let fixture = Fixture::new("");
        let exec = ScriptedExecutor::new().on_stderr(
            "brew info --json=v2 nosuchpkg",
            1,
            "Error: No available formula with the name \"nosuchpkg\".",
        );
        let env = fixture.env(Arc::new(exec));

        let args = InfoArgs {
            package: "brew:nosuchpkg".into(),
        };
        let err = execute(&ctx(), &env, &args).unwrap_err();
        assert!(format!("{err:#}").contains("brew:nosuchpkg"));
    }
}
