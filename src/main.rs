mod cli;
mod commands;
mod config;
mod paths;
mod resource;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Status(args) => commands::status::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Install(args) => commands::install::run(&ctx, &args),
        Command::Uninstall(args) => commands::uninstall::run(&ctx, &args),
        Command::Upgrade(args) => commands::upgrade::run(&ctx, &args),
        Command::Info(args) => commands::info::run(&ctx, &args),
        Command::Search(args) => commands::search::run(&ctx, &args),
        Command::Doctor => commands::doctor::run(&ctx),
        Command::Managers => commands::managers::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "homestead", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install_with_default_manager_specs() {
        let cli = Cli::try_parse_from(["homestead", "-vv", "install", "ripgrep", "npm:@angular/cli"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Install(args) => {
                assert_eq!(args.packages, vec!["ripgrep", "npm:@angular/cli"]);
                assert!(!args.dry_run);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_scope_flags_conflict() {
        assert!(Cli::try_parse_from(["homestead", "apply", "--packages", "--dotfiles"]).is_err());
        assert!(Cli::try_parse_from(["homestead", "status", "--missing", "--untracked"]).is_err());
        assert!(Cli::try_parse_from(["homestead", "install"]).is_err());
    }
}
